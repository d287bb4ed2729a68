use super::potentials::{clash_wall, flat_bottom_harmonic, harmonic, one_three_distance};
use super::term::RestraintTerm;
use crate::core::backbone::nerf::{CA_C_BOND_LENGTH, C_N_BOND_LENGTH, N_CA_BOND_LENGTH};
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

/// An energy over a flattened N/CA/C backbone (three points per residue).
///
/// Implementations must be pure: the same coordinates always give the same
/// energy and gradient, so candidates can be evaluated concurrently.
pub trait ConstraintEnergy: Send + Sync {
    /// Returns the energy of `coords` and adds `dE/dx` into `gradient`.
    ///
    /// `chain_breaks` lists the (sorted) residue indices that start a new
    /// chain; no peptide bond is assumed across them. `gradient` has the same
    /// length as `coords`.
    fn evaluate(
        &self,
        coords: &[Point3<f64>],
        chain_breaks: &[usize],
        gradient: &mut [Vector3<f64>],
    ) -> RestraintTerm;

    fn energy(&self, coords: &[Point3<f64>], chain_breaks: &[usize]) -> RestraintTerm {
        let mut scratch = vec![Vector3::zeros(); coords.len()];
        self.evaluate(coords, chain_breaks, &mut scratch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RestraintParams {
    pub bond_force_constant: f64,
    pub angle_force_constant: f64,
    /// Half-width (Å) of the flat region of the 1-3 distance restraints.
    pub angle_tolerance: f64,
    pub clash_force_constant: f64,
    /// Non-bonded atoms closer than this (Å) are penalized.
    pub clash_distance: f64,
    /// Ideal N-CA-C angle in degrees.
    pub n_ca_c_angle: f64,
    pub ca_c_n_angle: f64,
    pub c_n_ca_angle: f64,
}

impl Default for RestraintParams {
    fn default() -> Self {
        Self {
            bond_force_constant: 100.0,
            angle_force_constant: 50.0,
            angle_tolerance: 0.05,
            clash_force_constant: 10.0,
            clash_distance: 3.0,
            n_ca_c_angle: 111.0,
            ca_c_n_angle: 116.2,
            c_n_ca_angle: 121.7,
        }
    }
}

/// Harmonic backbone bonds, flat-bottom 1-3 distances for the three backbone
/// bond angles, and a clash wall between atoms at least four positions apart
/// in the flattened chain.
#[derive(Debug, Clone)]
pub struct BackboneRestraints {
    params: RestraintParams,
    n_ca_c_dist: f64,
    ca_c_n_dist: f64,
    c_n_ca_dist: f64,
}

const MIN_CLASH_SEPARATION: usize = 4;

impl BackboneRestraints {
    pub fn new(params: RestraintParams) -> Self {
        Self {
            n_ca_c_dist: one_three_distance(
                N_CA_BOND_LENGTH,
                CA_C_BOND_LENGTH,
                params.n_ca_c_angle.to_radians(),
            ),
            ca_c_n_dist: one_three_distance(
                CA_C_BOND_LENGTH,
                C_N_BOND_LENGTH,
                params.ca_c_n_angle.to_radians(),
            ),
            c_n_ca_dist: one_three_distance(
                C_N_BOND_LENGTH,
                N_CA_BOND_LENGTH,
                params.c_n_ca_angle.to_radians(),
            ),
            params,
        }
    }

    pub fn params(&self) -> &RestraintParams {
        &self.params
    }
}

impl Default for BackboneRestraints {
    fn default() -> Self {
        Self::new(RestraintParams::default())
    }
}

#[inline]
fn accumulate<F>(
    coords: &[Point3<f64>],
    gradient: &mut [Vector3<f64>],
    a: usize,
    b: usize,
    potential: F,
) -> f64
where
    F: Fn(f64) -> (f64, f64),
{
    let diff = coords[a] - coords[b];
    let dist = diff.norm();
    let (energy, slope) = potential(dist);
    if slope != 0.0 && dist > 1e-9 {
        let force = diff * (slope / dist);
        gradient[a] += force;
        gradient[b] -= force;
    }
    energy
}

impl ConstraintEnergy for BackboneRestraints {
    fn evaluate(
        &self,
        coords: &[Point3<f64>],
        chain_breaks: &[usize],
        gradient: &mut [Vector3<f64>],
    ) -> RestraintTerm {
        debug_assert_eq!(coords.len(), gradient.len());
        let p = &self.params;
        let residues = coords.len() / 3;
        let linked = |i: usize| i + 1 < residues && chain_breaks.binary_search(&(i + 1)).is_err();

        let bond = |ideal: f64| move |d: f64| harmonic(d, ideal, p.bond_force_constant);
        let angle =
            |ideal: f64| move |d: f64| flat_bottom_harmonic(d, ideal, p.angle_tolerance, p.angle_force_constant);

        let mut term = RestraintTerm::default();
        for i in 0..residues {
            let (n, ca, c) = (3 * i, 3 * i + 1, 3 * i + 2);
            term.bond += accumulate(coords, gradient, n, ca, bond(N_CA_BOND_LENGTH));
            term.bond += accumulate(coords, gradient, ca, c, bond(CA_C_BOND_LENGTH));
            term.angle += accumulate(coords, gradient, n, c, angle(self.n_ca_c_dist));

            if linked(i) {
                let (n_next, ca_next) = (c + 1, c + 2);
                term.bond += accumulate(coords, gradient, c, n_next, bond(C_N_BOND_LENGTH));
                term.angle += accumulate(coords, gradient, ca, n_next, angle(self.ca_c_n_dist));
                term.angle += accumulate(coords, gradient, c, ca_next, angle(self.c_n_ca_dist));
            }
        }

        let cutoff_sq = p.clash_distance * p.clash_distance;
        for a in 0..coords.len() {
            for b in (a + MIN_CLASH_SEPARATION)..coords.len() {
                if (coords[a] - coords[b]).norm_squared() >= cutoff_sq {
                    continue;
                }
                term.clash += accumulate(coords, gradient, a, b, |d| {
                    clash_wall(d, p.clash_distance, p.clash_force_constant)
                });
            }
        }

        term
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backbone::angles::AngleTable;
    use crate::core::backbone::nerf::build_backbone;

    fn ideal_chain(n: usize) -> Vec<Point3<f64>> {
        let params = RestraintParams::default();
        let row = [
            -120f64.to_radians(),
            130f64.to_radians(),
            180f64.to_radians(),
            params.n_ca_c_angle.to_radians(),
            params.ca_c_n_angle.to_radians(),
            params.c_n_ca_angle.to_radians(),
        ];
        build_backbone(&AngleTable::new(vec![row; n])).unwrap()
    }

    #[test]
    fn ideal_extended_chain_has_no_bond_or_angle_energy() {
        let energy = BackboneRestraints::default().energy(&ideal_chain(6), &[]);
        assert!(energy.bond.abs() < 1e-9);
        assert!(energy.angle.abs() < 1e-9);
    }

    #[test]
    fn stretched_bond_is_penalized_harmonically() {
        let mut coords = ideal_chain(1);
        coords[2] = coords[1] + (coords[2] - coords[1]) * 1.1;
        let restraints = BackboneRestraints::default();
        let energy = restraints.energy(&coords, &[]);

        let stretch = CA_C_BOND_LENGTH * 0.1;
        let expected = restraints.params().bond_force_constant * stretch * stretch;
        assert!((energy.bond - expected).abs() < 1e-9);
        assert_eq!(energy.clash, 0.0);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let restraints = BackboneRestraints::new(RestraintParams::default());
        let mut coords = ideal_chain(5);
        for (i, p) in coords.iter_mut().enumerate() {
            let t = i as f64;
            *p += Vector3::new(0.2 * t.sin(), 0.15 * (1.3 * t).cos(), 0.1 * (0.7 * t).sin());
        }
        // Push two distant atoms into contact so the clash term is active.
        coords[13] = coords[1] + Vector3::new(1.2, 1.1, 0.9);

        let mut gradient = vec![Vector3::zeros(); coords.len()];
        let term = restraints.evaluate(&coords, &[], &mut gradient);
        assert!(term.clash > 0.0);

        let h = 1e-6;
        for atom in 0..coords.len() {
            for axis in 0..3 {
                let mut plus = coords.clone();
                plus[atom][axis] += h;
                let mut minus = coords.clone();
                minus[atom][axis] -= h;
                let numeric = (restraints.energy(&plus, &[]).total()
                    - restraints.energy(&minus, &[]).total())
                    / (2.0 * h);
                assert!(
                    (numeric - gradient[atom][axis]).abs() < 1e-4 * (1.0 + numeric.abs()),
                    "atom {atom} axis {axis}: analytic {} numeric {numeric}",
                    gradient[atom][axis]
                );
            }
        }
    }

    #[test]
    fn chain_break_removes_the_peptide_link() {
        let mut coords = ideal_chain(2);
        for p in &mut coords[3..] {
            *p += Vector3::new(20.0, 0.0, 0.0);
        }
        let restraints = BackboneRestraints::default();
        let linked = restraints.energy(&coords, &[]);
        let broken = restraints.energy(&coords, &[1]);

        assert!(linked.bond > 1000.0);
        assert!(broken.bond.abs() < 1e-9);
        assert!(broken.angle.abs() < 1e-9);
    }

    #[test]
    fn overlapping_atoms_are_penalized_by_the_clash_term() {
        let mut coords = ideal_chain(3);
        coords[8] = coords[0] + Vector3::new(0.5, 0.0, 0.0);
        let energy = BackboneRestraints::default().energy(&coords, &[]);
        assert!(energy.clash > 0.0);
    }

    #[test]
    fn params_deserialize_with_defaults_for_missing_keys() {
        let params: RestraintParams =
            serde_json::from_str(r#"{"clash-distance": 2.5}"#).unwrap();
        assert_eq!(params.clash_distance, 2.5);
        assert_eq!(params.bond_force_constant, 100.0);
        assert!(serde_json::from_str::<RestraintParams>(r#"{"unknown": 1}"#).is_err());
    }
}
