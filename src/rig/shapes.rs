//! Control icons and control creation.

use std::f64::consts::TAU;

use crate::geom::{Point3, Transform, Vec3, apply_offset};
use crate::scene::SceneGraph;
use crate::scene::node::{ControlShape, NodeData, NodeId, NodeKind, NodeSpec};

use super::error::RigError;

const CIRCLE_SEGMENTS: usize = 16;

/// Icon drawn for a control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Icon {
    /// Box with the given extents along local X, Y and Z.
    Cube { width: f64, height: f64, depth: f64 },
    /// Three orthogonal circles.
    Sphere { radius: f64 },
    /// Three axis lines crossing at the origin.
    Null { size: f64 },
}

impl Icon {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cube { .. } => "cube",
            Self::Sphere { .. } => "sphere",
            Self::Null { .. } => "null",
        }
    }

    /// Curve segments of the icon around the origin.
    #[must_use]
    pub fn curves(self) -> Vec<Vec<Point3>> {
        match self {
            Self::Cube { width, height, depth } => vec![cube_outline(width / 2.0, height / 2.0, depth / 2.0)],
            Self::Sphere { radius } => (0..3).map(|axis| circle(radius, axis)).collect(),
            Self::Null { size } => {
                let h = size / 2.0;
                [Vec3::X, Vec3::Y, Vec3::Z]
                    .into_iter()
                    .map(|axis| {
                        vec![
                            Point3::from(axis.mul_scalar(-h)),
                            Point3::from(axis.mul_scalar(h)),
                        ]
                    })
                    .collect()
            }
        }
    }

    /// Control shape with every curve moved by `offset`.
    #[must_use]
    pub fn shape(self, offset: Option<Vec3>, color: [f64; 3]) -> ControlShape {
        ControlShape {
            icon: self.name().to_owned(),
            curves: self
                .curves()
                .iter()
                .map(|curve| apply_offset(curve, offset, None))
                .collect(),
            color,
        }
    }
}

/// One continuous polyline over all twelve edges of a box.
fn cube_outline(x: f64, y: f64, z: f64) -> Vec<Point3> {
    [
        (-1, 1, 1),
        (1, 1, 1),
        (1, 1, -1),
        (-1, 1, -1),
        (-1, 1, 1),
        (-1, -1, 1),
        (1, -1, 1),
        (1, 1, 1),
        (1, -1, 1),
        (1, -1, -1),
        (1, 1, -1),
        (1, -1, -1),
        (-1, -1, -1),
        (-1, 1, -1),
        (-1, -1, -1),
        (-1, -1, 1),
    ]
    .into_iter()
    .map(|(sx, sy, sz)| Point3::new(f64::from(sx) * x, f64::from(sy) * y, f64::from(sz) * z))
    .collect()
}

/// Closed circle around `axis` (0 = X, 1 = Y, 2 = Z).
fn circle(radius: f64, axis: usize) -> Vec<Point3> {
    let flat: Vec<Point3> = (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            Point3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        })
        .collect();
    let rotation = match axis {
        0 => Some(Vec3::new(0.0, TAU / 4.0, 0.0)),
        1 => Some(Vec3::new(TAU / 4.0, 0.0, 0.0)),
        _ => None,
    };
    apply_offset(&flat, None, rotation)
}

/// Creates a control transform at `matrix` carrying `shape`.
pub fn create_control(
    scene: &mut dyn SceneGraph,
    name: &str,
    parent: Option<NodeId>,
    matrix: Transform,
    shape: ControlShape,
) -> Result<NodeId, RigError> {
    log::debug!("control {name} ({})", shape.icon);
    Ok(scene.create_node(
        NodeSpec::new(name, NodeKind::Transform)
            .parent(parent)
            .matrix(matrix)
            .data(NodeData::Control(shape)),
    )?)
}
