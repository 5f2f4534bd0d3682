use std::f64::consts::FRAC_PI_2;

use crate::geom::{Point3, Tolerance, Vec3, apply_offset, average_position, default_matrix_from_position};

#[test]
fn offset_rotates_before_translating() {
    let points = [Point3::new(1.0, 0.0, 0.0)];
    let moved = apply_offset(&points, Some(Vec3::new(0.0, 0.0, 5.0)), Some(Vec3::new(0.0, 0.0, FRAC_PI_2)));
    assert!(Tolerance::DEFAULT.approx_eq_point3(moved[0], Point3::new(0.0, 1.0, 5.0)));
}

#[test]
fn offset_without_arguments_is_identity() {
    let points = [Point3::new(1.0, 2.0, 3.0), Point3::new(-1.0, 0.0, 0.5)];
    assert_eq!(apply_offset(&points, None, None), points.to_vec());
}

#[test]
fn default_matrix_only_translates() {
    let m = default_matrix_from_position(Point3::new(1.0, -2.0, 3.0));
    assert_eq!(m.x_axis(), Vec3::X);
    assert_eq!(m.y_axis(), Vec3::Y);
    assert_eq!(m.z_axis(), Vec3::Z);
    assert_eq!(m.translation(), Vec3::new(1.0, -2.0, 3.0));
}

#[test]
fn average_of_roots() {
    let roots = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0), Point3::new(1.0, 3.0, 0.0)];
    assert_eq!(average_position(&roots), Some(Point3::new(1.0, 1.0, 0.0)));
    assert_eq!(average_position(&[]), None);
}
