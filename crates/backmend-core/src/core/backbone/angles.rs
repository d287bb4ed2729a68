use crate::core::models::structure::Backbone;
use crate::core::utils::geometry::{bond_angle, dihedral_angle};
use ndarray::Array2;

/// Number of angle channels per residue.
pub const NUM_ANGLES: usize = 6;

/// Column names of an [`AngleTable`], in channel order.
///
/// `phi`, `psi` and `omega` are backbone dihedrals; `tau` is the N-CA-C bond
/// angle; `CA:C:1N` and `C:1N:1CA` are the bond angles across the peptide
/// bond to the next residue.
pub const ANGLE_NAMES: [&str; NUM_ANGLES] = ["phi", "psi", "omega", "tau", "CA:C:1N", "C:1N:1CA"];

pub const PHI: usize = 0;
pub const PSI: usize = 1;
pub const OMEGA: usize = 2;
pub const TAU: usize = 3;
pub const CA_C_N: usize = 4;
pub const C_N_CA: usize = 5;

/// One row of six angles (radians) per residue. Undefined entries, such as
/// `phi` of the first residue, are NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleTable {
    rows: Vec<[f64; NUM_ANGLES]>,
}

impl AngleTable {
    pub fn new(rows: Vec<[f64; NUM_ANGLES]>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[[f64; NUM_ANGLES]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The table as a `(residues, 6)` array.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows.len(), NUM_ANGLES));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                out[[i, j]] = *value;
            }
        }
        out
    }

    /// Builds a table from the first `rows` rows of a `(n, 6)` array.
    pub fn from_array(values: &Array2<f64>, rows: usize) -> Self {
        let rows = rows.min(values.nrows());
        let table = (0..rows)
            .map(|i| std::array::from_fn(|j| values[[i, j]]))
            .collect();
        Self { rows: table }
    }
}

/// Computes the six canonical angles for every residue of a backbone.
///
/// Angles that reach into a neighbouring residue are NaN at chain ends and
/// across chain boundaries. Returns `None` when the backbone has no residue,
/// which callers treat as "no usable angles".
pub fn canonical_angles(backbone: &Backbone) -> Option<AngleTable> {
    if backbone.is_empty() {
        return None;
    }

    let n = backbone.len();
    let same_chain = |i: usize, j: usize| backbone.residues[i].chain_id == backbone.residues[j].chain_id;

    let rows = (0..n)
        .map(|i| {
            let [n_i, ca_i, c_i] = backbone.residue_atoms(i);
            let mut row = [f64::NAN; NUM_ANGLES];

            row[TAU] = bond_angle(&n_i, &ca_i, &c_i);

            if i > 0 && same_chain(i - 1, i) {
                let c_prev = backbone.coords[3 * (i - 1) + 2];
                row[PHI] = dihedral_angle(&c_prev, &n_i, &ca_i, &c_i);
            }

            if i + 1 < n && same_chain(i, i + 1) {
                let [n_next, ca_next, _] = backbone.residue_atoms(i + 1);
                row[PSI] = dihedral_angle(&n_i, &ca_i, &c_i, &n_next);
                row[OMEGA] = dihedral_angle(&ca_i, &c_i, &n_next, &ca_next);
                row[CA_C_N] = bond_angle(&ca_i, &c_i, &n_next);
                row[C_N_CA] = bond_angle(&c_i, &n_next, &ca_next);
            }
            row
        })
        .collect();

    Some(AngleTable { rows })
}
