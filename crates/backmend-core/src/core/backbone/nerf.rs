use super::angles::{AngleTable, ANGLE_NAMES, CA_C_N, C_N_CA, OMEGA, PHI, PSI, TAU};
use crate::core::utils::geometry::place_dihedral;
use nalgebra::Point3;
use thiserror::Error;

pub const N_CA_BOND_LENGTH: f64 = 1.46;
pub const CA_C_BOND_LENGTH: f64 = 1.54;
pub const C_N_BOND_LENGTH: f64 = 1.34;

#[derive(Debug, Error, PartialEq)]
pub enum NerfError {
    #[error("Cannot build a backbone from an empty angle table")]
    Empty,
    #[error("Angle '{angle}' of residue {residue} is undefined")]
    UndefinedAngle { residue: usize, angle: &'static str },
}

fn required(table: &AngleTable, residue: usize, channel: usize) -> Result<f64, NerfError> {
    let value = table.rows()[residue][channel];
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NerfError::UndefinedAngle {
            residue,
            angle: ANGLE_NAMES[channel],
        })
    }
}

/// Rebuilds N/CA/C coordinates from an angle table.
///
/// The first residue is laid out in the xy-plane with N at the origin; each
/// following residue is placed from `psi`, `omega` and `phi` with the bond
/// angles of the table and fixed bond lengths. The output uses the
/// three-atoms-per-residue layout of
/// [`Backbone::coords`](crate::core::models::structure::Backbone::coords).
pub fn build_backbone(table: &AngleTable) -> Result<Vec<Point3<f64>>, NerfError> {
    if table.is_empty() {
        return Err(NerfError::Empty);
    }

    let tau0 = required(table, 0, TAU)?;
    let n0 = Point3::origin();
    let ca0 = Point3::new(N_CA_BOND_LENGTH, 0.0, 0.0);
    let c0 = ca0
        + nalgebra::Vector3::new(-tau0.cos(), tau0.sin(), 0.0) * CA_C_BOND_LENGTH;

    let mut coords = Vec::with_capacity(table.len() * 3);
    coords.extend([n0, ca0, c0]);

    for i in 0..table.len() - 1 {
        let psi = required(table, i, PSI)?;
        let omega = required(table, i, OMEGA)?;
        let ca_c_n = required(table, i, CA_C_N)?;
        let c_n_ca = required(table, i, C_N_CA)?;
        let phi_next = required(table, i + 1, PHI)?;
        let tau_next = required(table, i + 1, TAU)?;

        let len = coords.len();
        let n_next = place_dihedral(
            &coords[len - 3],
            &coords[len - 2],
            &coords[len - 1],
            C_N_BOND_LENGTH,
            ca_c_n,
            psi,
        );
        coords.push(n_next);

        let len = coords.len();
        let ca_next = place_dihedral(
            &coords[len - 3],
            &coords[len - 2],
            &coords[len - 1],
            N_CA_BOND_LENGTH,
            c_n_ca,
            omega,
        );
        coords.push(ca_next);

        let len = coords.len();
        let c_next = place_dihedral(
            &coords[len - 3],
            &coords[len - 2],
            &coords[len - 1],
            CA_C_BOND_LENGTH,
            tau_next,
            phi_next,
        );
        coords.push(c_next);
    }

    Ok(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backbone::angles::canonical_angles;
    use crate::core::models::atom::{Atom, ResidueKey};
    use crate::core::models::structure::Structure;

    fn helix_table(n: usize) -> AngleTable {
        let row = [
            -57f64.to_radians(),
            -47f64.to_radians(),
            180f64.to_radians(),
            111f64.to_radians(),
            116f64.to_radians(),
            122f64.to_radians(),
        ];
        AngleTable::new(vec![row; n])
    }

    #[test]
    fn rebuilt_backbone_has_the_requested_geometry() {
        let coords = build_backbone(&helix_table(6)).unwrap();
        assert_eq!(coords.len(), 18);

        for i in 0..6 {
            assert!(((coords[3 * i + 1] - coords[3 * i]).norm() - N_CA_BOND_LENGTH).abs() < 1e-9);
            assert!(((coords[3 * i + 2] - coords[3 * i + 1]).norm() - CA_C_BOND_LENGTH).abs() < 1e-9);
        }
        for i in 0..5 {
            assert!(((coords[3 * i + 3] - coords[3 * i + 2]).norm() - C_N_BOND_LENGTH).abs() < 1e-9);
        }
    }

    #[test]
    fn angles_survive_a_build_and_measure_cycle() {
        let table = helix_table(5);
        let coords = build_backbone(&table).unwrap();

        let atoms: Vec<_> = coords
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let key = ResidueKey::new('A', (idx / 3) as isize + 1, None);
                Atom::new(idx + 1, ["N", "CA", "C"][idx % 3], "ALA", key, *p)
            })
            .collect();
        let measured = canonical_angles(&Structure::new(atoms).backbone().unwrap()).unwrap();

        for i in 1..4 {
            for j in 0..6 {
                let expected = table.rows()[i][j];
                let got = measured.rows()[i][j];
                let diff = (expected - got).rem_euclid(2.0 * std::f64::consts::PI);
                let diff = diff.min(2.0 * std::f64::consts::PI - diff);
                assert!(diff < 1e-6, "residue {i} channel {j}: {expected} vs {got}");
            }
        }
    }

    #[test]
    fn undefined_interior_angle_is_reported() {
        let mut rows = helix_table(3).rows().to_vec();
        rows[1][PSI] = f64::NAN;
        let err = build_backbone(&AngleTable::new(rows)).unwrap_err();
        assert_eq!(
            err,
            NerfError::UndefinedAngle {
                residue: 1,
                angle: "psi"
            }
        );
    }

    #[test]
    fn terminal_nans_are_tolerated() {
        let mut rows = helix_table(3).rows().to_vec();
        rows[0][PHI] = f64::NAN;
        rows[2][PSI] = f64::NAN;
        rows[2][OMEGA] = f64::NAN;
        assert_eq!(build_backbone(&AngleTable::new(rows)).unwrap().len(), 9);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert_eq!(build_backbone(&AngleTable::default()), Err(NerfError::Empty));
    }
}
