mod core;
mod curve;
mod points;

pub use core::{Decomposed, Point3, Tolerance, Transform, Vec3};
pub use curve::{
    ARC_LENGTH_SAMPLES, ArcLengthTable, ArcSample, Curve3, CurveError, NurbsCurve3, Polyline3, curve_arc_length,
    sample_even_arc_length,
};
pub use points::{apply_offset, average_position, default_matrix_from_position};

#[cfg(test)]
mod tests;
