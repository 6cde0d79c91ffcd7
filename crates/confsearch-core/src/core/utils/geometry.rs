use nalgebra::{Point3, Rotation3, Unit, Vector3};

pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    Rotation3::rotation_between(from, to)
}

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Dihedral angle `p0-p1-p2-p3` in degrees, in `(-180, 180]`.
pub fn dihedral_deg(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> f64 {
    let b0 = p0 - p1;
    let b1 = (p2 - p1).normalize();
    let b2 = p3 - p2;

    let v = b0 - b1 * b0.dot(&b1);
    let w = b2 - b1 * b2.dot(&b1);

    let x = v.dot(&w);
    let y = b1.cross(&v).dot(&w);
    y.atan2(x).to_degrees()
}

/// Bond angle `a-b-c` in degrees, measured at `b`.
pub fn angle_deg(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    ba.angle(&bc).to_degrees()
}

/// Smallest difference between two angles in degrees, in `[0, 180]`.
pub fn circular_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Signed angle in degrees that rotates `from` onto `to` about `axis`.
///
/// Both vectors are expected to be perpendicular to `axis`.
pub fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let axis = axis.normalize();
    let y = axis.dot(&from.cross(to));
    let x = from.dot(to);
    y.atan2(x).to_degrees()
}

/// Places a new atom `d` from internal coordinates relative to `a`, `b`, `c`.
///
/// `bond_length` is `|c-d|`, `angle` is `b-c-d` and `dihedral` is `a-b-c-d`,
/// both in degrees.
pub fn place_atom(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    bond_length: f64,
    angle: f64,
    dihedral: f64,
) -> Point3<f64> {
    let bc = (c - b).normalize();
    let n = (b - a).cross(&bc).normalize();
    let m = n.cross(&bc);

    let theta = angle.to_radians();
    let phi = dihedral.to_radians();

    let d = bc * (-bond_length * theta.cos())
        + m * (bond_length * theta.sin() * phi.cos())
        + n * (bond_length * theta.sin() * phi.sin());
    c + d
}
