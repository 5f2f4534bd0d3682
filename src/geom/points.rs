//! Point-array helpers used when placing controls and drawing icons.

use super::core::{Point3, Transform, Vec3};

/// Rotates every point about the origin by an XYZ Euler rotation (radians),
/// then translates it by `pos_offset`.
#[must_use]
pub fn apply_offset(points: &[Point3], pos_offset: Option<Vec3>, rot_offset: Option<Vec3>) -> Vec<Point3> {
    let rotation = rot_offset.map(Transform::from_euler_xyz);
    let offset = pos_offset.unwrap_or(Vec3::ZERO);
    points
        .iter()
        .map(|&p| {
            let rotated = rotation.map_or(p, |r| r.apply_point(p));
            rotated.add_vec(offset)
        })
        .collect()
}

/// Identity rotation and scale, translated to `position`.
#[must_use]
pub fn default_matrix_from_position(position: Point3) -> Transform {
    Transform::translate(position.to_vec3())
}

/// Arithmetic mean of the points, `None` for an empty slice.
#[must_use]
pub fn average_position(points: &[Point3]) -> Option<Point3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::ZERO, |acc, p| acc.add(p.to_vec3()));
    Some(Point3::from(sum.div_scalar(points.len() as f64)))
}
