pub mod correct;
pub mod prepare;
pub mod refine;

use crate::utils::progress::CliProgressHandler;

fn progress_handler(quiet: bool) -> CliProgressHandler {
    if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use backmend::core::backbone::angles::AngleTable;
    use backmend::core::backbone::nerf::build_backbone;
    use backmend::core::io::pdb::PdbFile;
    use backmend::core::io::traits::MolecularFile;
    use backmend::core::models::atom::{Atom, ResidueKey};
    use backmend::core::models::structure::Structure;
    use std::f64::consts::PI;
    use std::fs;
    use std::path::{Path, PathBuf};

    pub const RECORD: &str = r#"{
        "missing_residues_id": {"A": [3, 4]},
        "index_mapping": {"A": {"1": 0, "2": 1, "3": 2, "4": 3, "5": 4, "6": 5}}
    }"#;
    pub const STATS: &str = r#"{"masked_means": [-1.2, 1.5, 3.1, 1.93, 2.03, 2.12]}"#;

    pub fn extended_table(twist: f64) -> AngleTable {
        let rows = (0..6)
            .map(|i| {
                let t = if (2..4).contains(&i) { twist } else { 0.0 };
                [
                    -2.1 + t,
                    2.3 - t,
                    PI,
                    111f64.to_radians(),
                    116.2f64.to_radians(),
                    121.7f64.to_radians(),
                ]
            })
            .collect();
        AngleTable::new(rows)
    }

    pub fn structure(table: &AngleTable) -> Structure {
        let coords = build_backbone(table).unwrap();
        let atoms = coords
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let key = ResidueKey::new('A', (idx / 3) as isize + 1, None);
                Atom::new(idx + 1, ["N", "CA", "C"][idx % 3], "GLY", key, *p)
            })
            .collect();
        Structure::new(atoms)
    }

    /// Writes `input.pdb`, `input.pdb.missing` and `stats.json` into `dir`.
    pub fn write_inputs(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let pdb = dir.join("input.pdb");
        PdbFile::write_structure(&structure(&extended_table(0.0)), &pdb).unwrap();
        let record = dir.join("input.pdb.missing");
        fs::write(&record, RECORD).unwrap();
        let stats = dir.join("stats.json");
        fs::write(&stats, STATS).unwrap();
        (pdb, record, stats)
    }
}
