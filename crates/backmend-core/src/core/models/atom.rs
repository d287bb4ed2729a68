use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;

/// Names of the three backbone atoms tracked per residue, in chain order.
pub const BACKBONE_ATOM_NAMES: [&str; 3] = ["N", "CA", "C"];

/// Classifies an atom by its position in the protein backbone.
///
/// Only the N, CA and C atoms take part in angle features and refinement;
/// every other atom (carbonyl oxygen, side chains, ligands) is carried through
/// the pipeline untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BackboneRole {
    /// Amide nitrogen.
    N,
    /// Alpha carbon.
    CA,
    /// Carbonyl carbon.
    C,
    /// Not one of the three backbone atoms.
    #[default]
    Other,
}

impl BackboneRole {
    /// Offset of this atom inside the `[N, CA, C]` triple of its residue.
    pub fn offset(self) -> Option<usize> {
        match self {
            BackboneRole::N => Some(0),
            BackboneRole::CA => Some(1),
            BackboneRole::C => Some(2),
            BackboneRole::Other => None,
        }
    }
}

impl FromStr for BackboneRole {
    type Err = ();

    /// Classifies an atom name. Names are compared after trimming, so the
    /// padded names found in fixed-column files are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "N" => Ok(BackboneRole::N),
            "CA" => Ok(BackboneRole::CA),
            "C" => Ok(BackboneRole::C),
            "" => Err(()),
            _ => Ok(BackboneRole::Other),
        }
    }
}

/// Identifies a residue by chain, sequence number and insertion code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub chain_id: char,
    pub number: isize,
    pub insertion_code: Option<char>,
}

impl ResidueKey {
    pub fn new(chain_id: char, number: isize, insertion_code: Option<char>) -> Self {
        Self {
            chain_id,
            number,
            insertion_code,
        }
    }

    /// The residue identifier as written in missing-residue records
    /// (`"52"` or `"52A"`), without the chain.
    pub fn label(&self) -> String {
        match self.insertion_code {
            Some(code) => format!("{}{}", self.number, code),
            None => self.number.to_string(),
        }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.label())
    }
}

/// A single atom record of a [`Structure`](super::structure::Structure).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file.
    pub serial: usize,
    /// Atom name (e.g. "CA", "N", "OXT").
    pub name: String,
    /// Three-letter residue name.
    pub res_name: String,
    /// Residue the atom belongs to.
    pub residue: ResidueKey,
    /// Cartesian position in Angstroms.
    pub position: Point3<f64>,
    pub occupancy: f64,
    pub b_factor: f64,
    /// Element symbol, possibly empty when the source omitted it.
    pub element: String,
    /// `true` for HETATM records.
    pub hetero: bool,
}

impl Atom {
    /// Creates an `ATOM` record with unit occupancy and a zero B-factor.
    pub fn new(
        serial: usize,
        name: &str,
        res_name: &str,
        residue: ResidueKey,
        position: Point3<f64>,
    ) -> Self {
        Self {
            serial,
            name: name.to_string(),
            res_name: res_name.to_string(),
            residue,
            position,
            occupancy: 1.0,
            b_factor: 0.0,
            element: name.chars().next().map(String::from).unwrap_or_default(),
            hetero: false,
        }
    }

    #[inline]
    pub fn backbone_role(&self) -> BackboneRole {
        self.name.parse().unwrap_or_default()
    }

    #[inline]
    pub fn is_backbone(&self) -> bool {
        !self.hetero && self.backbone_role() != BackboneRole::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResidueKey {
        ResidueKey::new('A', 7, None)
    }

    #[test]
    fn new_atom_has_expected_default_fields() {
        let atom = Atom::new(1, "CA", "GLY", key(), Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.res_name, "GLY");
        assert_eq!(atom.residue, key());
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.occupancy, 1.0);
        assert_eq!(atom.b_factor, 0.0);
        assert_eq!(atom.element, "C");
        assert!(!atom.hetero);
    }

    #[test]
    fn backbone_roles_are_classified_from_names() {
        assert_eq!(BackboneRole::from_str("N"), Ok(BackboneRole::N));
        assert_eq!(BackboneRole::from_str(" CA "), Ok(BackboneRole::CA));
        assert_eq!(BackboneRole::from_str("C"), Ok(BackboneRole::C));
        assert_eq!(BackboneRole::from_str("O"), Ok(BackboneRole::Other));
        assert_eq!(BackboneRole::from_str("CB"), Ok(BackboneRole::Other));
        assert_eq!(BackboneRole::from_str(""), Err(()));
    }

    #[test]
    fn backbone_offsets_follow_chain_order() {
        assert_eq!(BackboneRole::N.offset(), Some(0));
        assert_eq!(BackboneRole::CA.offset(), Some(1));
        assert_eq!(BackboneRole::C.offset(), Some(2));
        assert_eq!(BackboneRole::Other.offset(), None);
    }

    #[test]
    fn hetero_atoms_are_never_backbone() {
        let mut atom = Atom::new(1, "CA", "CA", key(), Point3::origin());
        assert!(atom.is_backbone());
        atom.hetero = true;
        assert!(!atom.is_backbone());
    }

    #[test]
    fn residue_key_labels_include_insertion_codes() {
        assert_eq!(key().label(), "7");
        assert_eq!(ResidueKey::new('B', 52, Some('A')).label(), "52A");
        assert_eq!(ResidueKey::new('B', -3, None).to_string(), "B:-3");
    }
}
