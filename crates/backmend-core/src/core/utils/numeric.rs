use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Wraps `value` into `[range_min, range_max)` with a floored modulo.
///
/// The interval is half-open: `range_min` is kept as is and `range_max` maps
/// to `range_min`, so with `(-PI, PI)` an input of `PI` yields `-PI` and `PI`
/// itself is never produced. `range_min` must not be positive and must be
/// smaller than `range_max`. NaN stays NaN.
#[inline]
pub fn modulo_with_wrapped_range(value: f64, range_min: f64, range_max: f64) -> f64 {
    debug_assert!(range_min <= 0.0 && range_min < range_max);
    let span = range_max - range_min;
    (value - range_min).rem_euclid(span) + range_min
}

/// Applies [`modulo_with_wrapped_range`] to every element of a 2D array,
/// as a shift followed by a per-column [`broadcast_mod`].
pub fn wrap_array(values: &mut Array2<f64>, range_min: f64, range_max: f64) {
    debug_assert!(range_min <= 0.0 && range_min < range_max);
    let span = Array1::from_elem(values.ncols(), range_max - range_min);
    values.mapv_inplace(|v| v - range_min);
    *values = broadcast_mod(values, span.view());
    values.mapv_inplace(|v| v + range_min);
}

/// Floored modulo of every row of `values` by the per-column `modulus`.
///
/// Mirrors broadcasting a row vector of moduli over a `(rows, columns)`
/// table.
///
/// # Panics
///
/// Panics if `modulus` does not have one entry per column.
pub fn broadcast_mod(values: &Array2<f64>, modulus: ArrayView1<'_, f64>) -> Array2<f64> {
    assert_eq!(values.ncols(), modulus.len(), "one modulus per column");
    let mut out = values.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        row.zip_mut_with(&modulus, |v, &m| *v = v.rem_euclid(m));
    }
    out
}

/// Splits `num` into groups of at most `divisor`, remainder last.
///
/// `num_to_groups(18, 16) == [16, 2]`, `num_to_groups(33, 8) == [8, 8, 8, 8, 1]`.
pub fn num_to_groups(num: usize, divisor: usize) -> Vec<usize> {
    if divisor == 0 {
        return Vec::new();
    }
    let mut groups = vec![divisor; num / divisor];
    let remainder = num % divisor;
    if remainder > 0 {
        groups.push(remainder);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn wrapping_maps_values_into_the_half_open_range() {
        assert!((modulo_with_wrapped_range(3.0 * PI / 2.0, -PI, PI) - -PI / 2.0).abs() < TOLERANCE);
        assert!((modulo_with_wrapped_range(-3.0 * PI / 2.0, -PI, PI) - PI / 2.0).abs() < TOLERANCE);
        assert!((modulo_with_wrapped_range(0.25, -PI, PI) - 0.25).abs() < TOLERANCE);
        assert!((modulo_with_wrapped_range(PI, -PI, PI) - -PI).abs() < TOLERANCE);
    }

    #[test]
    fn wrapping_is_idempotent() {
        let mut values = array![[7.5, -13.0, 0.1], [PI, -PI, 2.0 * PI + 0.3]];
        wrap_array(&mut values, -PI, PI);
        let once = values.clone();
        wrap_array(&mut values, -PI, PI);

        for (a, b) in once.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1e-9);
            assert!(*a >= -PI && *a < PI);
        }
    }

    #[test]
    fn wrapping_keeps_nan() {
        assert!(modulo_with_wrapped_range(f64::NAN, -PI, PI).is_nan());
        let mut values = array![[f64::NAN, 4.0]];
        wrap_array(&mut values, -PI, PI);
        assert!(values[[0, 0]].is_nan());
    }

    #[test]
    fn array_wrapping_matches_scalar_wrapping() {
        let raw = array![[PI, -PI, 7.5], [-13.0, 0.0, 2.0 * PI + 0.3]];
        let mut values = raw.clone();
        wrap_array(&mut values, -PI, PI);
        for (wrapped, original) in values.iter().zip(raw.iter()) {
            assert!((wrapped - modulo_with_wrapped_range(*original, -PI, PI)).abs() < 1e-12);
        }
        assert_eq!(values[[0, 0]], -PI);
        assert_eq!(values[[0, 1]], -PI);
    }

    #[test]
    fn broadcast_mod_uses_one_modulus_per_column() {
        let values = Array1::range(0.0, 24.0, 1.0).into_shape_with_order((6, 4)).unwrap();
        let moduli = array![5.0, 7.0, 9.0, 11.0];
        let out = broadcast_mod(&values, moduli.view());

        assert_eq!(out.row(0), array![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(out.row(1), array![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(out.row(2), array![3.0, 2.0, 1.0, 0.0]);
        assert_eq!(out.row(5), array![0.0, 0.0, 4.0, 1.0]);
    }

    #[test]
    fn num_to_groups_splits_with_remainder_last() {
        assert_eq!(num_to_groups(18, 16), vec![16, 2]);
        assert_eq!(num_to_groups(33, 8), vec![8, 8, 8, 8, 1]);
        assert_eq!(num_to_groups(32, 16), vec![16, 16]);
        assert_eq!(num_to_groups(0, 16), Vec::<usize>::new());
        assert_eq!(num_to_groups(5, 0), Vec::<usize>::new());
    }
}
