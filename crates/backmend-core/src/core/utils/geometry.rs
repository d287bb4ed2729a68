use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

/// Angle at `b` formed by `a-b-c`, in radians. NaN when a bond is degenerate.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let denom = ba.norm() * bc.norm();
    if denom < 1e-12 {
        return f64::NAN;
    }
    (ba.dot(&bc) / denom).clamp(-1.0, 1.0).acos()
}

/// Dihedral angle between planes `abc` and `bcd`, in radians within
/// `[-pi, pi]`. NaN when three of the points are collinear.
pub fn dihedral_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b0 = a - b;
    let axis = c - b;
    let b2 = d - c;

    let axis_norm = axis.norm();
    if axis_norm < 1e-12 {
        return f64::NAN;
    }
    let axis = axis / axis_norm;

    // Project the outer bonds onto the plane perpendicular to the axis.
    let v = b0 - axis * b0.dot(&axis);
    let w = b2 - axis * b2.dot(&axis);
    if v.norm() < 1e-12 || w.norm() < 1e-12 {
        return f64::NAN;
    }

    let x = v.dot(&w);
    let y = axis.cross(&v).dot(&w);
    y.atan2(x)
}

/// Places a fourth atom from three references and internal coordinates
/// (natural extension reference frame).
///
/// The new point `d` satisfies `|cd| = bond_length`, `angle(b, c, d) =
/// bond_angle` and `dihedral(a, b, c, d) = torsion`.
pub fn place_dihedral(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    bond_length: f64,
    bond_angle: f64,
    torsion: f64,
) -> Point3<f64> {
    let bc = (c - b).normalize();
    let ab = b - a;
    let n = ab.cross(&bc).normalize();
    let m = n.cross(&bc);

    let d2 = Vector3::new(
        -bond_length * bond_angle.cos(),
        bond_length * bond_angle.sin() * torsion.cos(),
        bond_length * bond_angle.sin() * torsion.sin(),
    );
    let frame = Matrix3::from_columns(&[bc, m, n]);
    c + frame * d2
}

/// Least-squares rigid transform mapping `from_points` onto `to_points`
/// (Kabsch). Returns `None` for empty or mismatched inputs.
pub fn superposition(
    from_points: &[Point3<f64>],
    to_points: &[Point3<f64>],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    if from_points.is_empty() || from_points.len() != to_points.len() {
        return None;
    }
    let count = from_points.len() as f64;
    let from_centroid = Point3::from(from_points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / count);
    let to_centroid = Point3::from(to_points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / count);

    let h = from_points
        .iter()
        .zip(to_points)
        .fold(Matrix3::zeros(), |acc, (f, t)| {
            acc + (t - to_centroid) * (f - from_centroid).transpose()
        });

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    let d = (u * v_t).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation = Rotation3::from_matrix_unchecked(u * correction * v_t);
    let translation = to_centroid.coords - rotation * from_centroid.coords;
    Some((rotation, translation))
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}
