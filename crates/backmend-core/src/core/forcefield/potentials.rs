//! Scalar distance potentials. Every function returns `(energy, dE/dd)`.

#[inline]
pub fn harmonic(dist: f64, ideal_dist: f64, force_constant: f64) -> (f64, f64) {
    let delta = dist - ideal_dist;
    (
        force_constant * delta * delta,
        2.0 * force_constant * delta,
    )
}

/// Harmonic potential that is zero within `tolerance` of `ideal_dist`.
#[inline]
pub fn flat_bottom_harmonic(
    dist: f64,
    ideal_dist: f64,
    tolerance: f64,
    force_constant: f64,
) -> (f64, f64) {
    if tolerance <= 1e-9 {
        return harmonic(dist, ideal_dist, force_constant);
    }

    if dist > ideal_dist + tolerance {
        harmonic(dist, ideal_dist + tolerance, force_constant)
    } else if dist < ideal_dist - tolerance {
        harmonic(dist, ideal_dist - tolerance, force_constant)
    } else {
        (0.0, 0.0)
    }
}

/// One-sided quadratic wall: zero beyond `min_dist`, harmonic inside it.
#[inline]
pub fn clash_wall(dist: f64, min_dist: f64, force_constant: f64) -> (f64, f64) {
    if dist >= min_dist {
        (0.0, 0.0)
    } else {
        harmonic(dist, min_dist, force_constant)
    }
}

/// Distance between the outer atoms of a bond angle with the given legs.
#[inline]
pub fn one_three_distance(leg_a: f64, leg_b: f64, angle: f64) -> f64 {
    (leg_a * leg_a + leg_b * leg_b - 2.0 * leg_a * leg_b * angle.cos()).sqrt()
}
