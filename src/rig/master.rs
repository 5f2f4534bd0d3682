//! Master control: attribute schema, placement and wiring to the chains.

use crate::geom::{Point3, Transform, Vec3, average_position, default_matrix_from_position};
use crate::scene::SceneGraph;
use crate::scene::node::{NodeId, NodeKind, NodeSpec};
use crate::scene::value::AttributeSpec;
use crate::scene::wire::AttrRef;

use super::error::RigError;
use super::naming::RigNames;
use super::shapes::{Icon, create_control};

pub const STRENGTH: &str = "strength";
pub const FK_VIS: &str = "fk_vis";
pub const IK_VIS: &str = "ik_vis";
pub const ANNOTATION_VIS: &str = "annotation_vis";
pub const ROLL: &str = "roll";
pub const TWIST: &str = "twist";

pub const AXES: [&str; 3] = ["X", "Y", "Z"];

/// Per-axis wave parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisParam {
    pub name: &'static str,
    pub default: f64,
    pub range: Option<(f64, f64)>,
}

const fn param(name: &'static str, default: f64, range: Option<(f64, f64)>) -> AxisParam {
    AxisParam { name, default, range }
}

/// Separator heading each axis block in the channel box.
pub const AXIS_SEPARATOR: &str = "parameter";

/// The wave parameters repeated for every axis, in channel-box order.
pub const AXIS_PARAMS: [AxisParam; 13] = [
    param("loop_per_second", 0.0, None),
    param("amp", 0.0, None),
    param("amp_bias_range", 0.0, Some((0.0, 1.0))),
    param("amp_bias_LPS_mult", 1.0, None),
    param("amp_bias_noise", 0.0, None),
    param("offset_frame", 0.0, None),
    param("offset_noise", 0.0, None),
    param("offset_rdm", 0.0, None),
    param("delay", 0.0, None),
    param("falloff", 0.0, Some((0.0, 10.0))),
    param("amp_offset", 0.0, None),
    param("amp_positive_mult", 1.0, None),
    param("amp_negative_mult", 1.0, None),
];

/// `{base}_{axis}`, e.g. `amp_bias_range_Y`.
#[must_use]
pub fn axis_attr(base: &str, axis: &str) -> String {
    format!("{base}_{axis}")
}

/// Full custom attribute list of a master control, in creation order.
#[must_use]
pub fn master_schema() -> Vec<AttributeSpec> {
    let mut schema = vec![
        AttributeSpec::double(STRENGTH, 1.0),
        AttributeSpec::boolean(FK_VIS, true),
        AttributeSpec::boolean(IK_VIS, true),
        AttributeSpec::boolean(ANNOTATION_VIS, true),
        AttributeSpec::double(ROLL, 0.0),
        AttributeSpec::double(TWIST, 0.0),
    ];
    for axis in AXES {
        schema.push(AttributeSpec::separator(axis_attr(AXIS_SEPARATOR, axis), &[axis]));
        for param in AXIS_PARAMS {
            let spec = AttributeSpec::double(axis_attr(param.name, axis), param.default);
            schema.push(match param.range {
                Some((min, max)) => spec.with_range(min, max),
                None => spec,
            });
        }
    }
    schema
}

/// Attributes that shape the wave: strength, the visibility switches and the
/// per-axis doubles. Roll, twist and separators are left out.
#[must_use]
pub fn is_wave_attribute(name: &str) -> bool {
    name != ROLL && name != TWIST && !name.starts_with(AXIS_SEPARATOR)
}

/// Nodes making up a rig's master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Master {
    pub control: NodeId,
    pub tag: NodeId,
    pub annotation: NodeId,
}

/// Height of the annotation above the master, in IK-size units.
const ANNOTATION_LIFT: f64 = 2.0;
const MASTER_ICON_SCALE: f64 = 1.5;

/// Creates the master control at the average of `roots`.
pub fn build_master(
    scene: &mut dyn SceneGraph,
    names: &RigNames,
    parent: NodeId,
    roots: &[Point3],
    ik_size: f64,
    color: [f64; 3],
) -> Result<Master, RigError> {
    let position = average_position(roots).unwrap_or(Point3::ORIGIN);
    let matrix = default_matrix_from_position(position);
    let icon = Icon::Sphere {
        radius: ik_size * MASTER_ICON_SCALE,
    };
    let control = create_control(scene, &names.master_control(), Some(parent), matrix, icon.shape(None, color))?;
    for spec in master_schema() {
        scene.add_attribute(control, spec)?;
    }
    let tag = scene.tag_controller(control, None)?;

    let lifted = matrix.compose(Transform::translate(Vec3::Y.mul_scalar(ik_size * ANNOTATION_LIFT)));
    let annotation = scene.create_annotation(&names.annotation(), names.rig(), Some(control), lifted)?;

    log::debug!("master {} at {:?}", names.master_control(), position.to_array());
    Ok(Master {
        control,
        tag,
        annotation,
    })
}

/// Connects the master's switches to one chain's groups and IK handle.
pub fn wire_chain(
    scene: &mut dyn SceneGraph,
    master: &Master,
    fk_group: NodeId,
    sik_group: NodeId,
    handle: NodeId,
) -> Result<(), RigError> {
    let links = [
        (FK_VIS, fk_group, "visibility"),
        (IK_VIS, sik_group, "visibility"),
        (ROLL, handle, "roll"),
        (TWIST, handle, "twist"),
    ];
    for (from, node, to) in links {
        scene.connect(&AttrRef::new(master.control, from), &AttrRef::new(node, to))?;
    }
    Ok(())
}

/// Connects the annotation switch.
pub fn wire_annotation(scene: &mut dyn SceneGraph, master: &Master) -> Result<(), RigError> {
    scene.connect(
        &AttrRef::new(master.control, ANNOTATION_VIS),
        &AttrRef::new(master.annotation, "visibility"),
    )?;
    Ok(())
}

/// Locks translate, rotate, scale and visibility.
pub fn lock_transform(scene: &mut dyn SceneGraph, id: NodeId) -> Result<(), RigError> {
    for channel in ["translate", "rotate", "scale"] {
        for axis in AXES {
            scene.lock_attribute(id, &format!("{channel}{axis}"))?;
        }
    }
    scene.lock_attribute(id, "visibility")?;
    Ok(())
}

/// Creates a plain group at identity, or returns the existing one.
pub fn ensure_group(scene: &mut dyn SceneGraph, name: &str, parent: Option<NodeId>) -> Result<NodeId, RigError> {
    if let Some(id) = scene.find(name) {
        return Ok(id);
    }
    Ok(scene.create_node(
        NodeSpec::new(name, NodeKind::Transform)
            .parent(parent)
            .matrix(Transform::identity()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_six_globals_and_fourteen_per_axis() {
        let schema = master_schema();
        assert_eq!(schema.len(), 6 + 3 * 14);
        let wave = schema.iter().filter(|spec| is_wave_attribute(&spec.name)).count();
        assert_eq!(wave, 1 + 3 + 3 * 13);
        assert_eq!(schema.iter().filter(|spec| spec.is_separator()).count(), 3);
    }

    #[test]
    fn ranges_and_multiplier_defaults() {
        let schema = master_schema();
        let find = |name: &str| schema.iter().find(|spec| spec.name == name).cloned();
        let bias = find("amp_bias_range_Y").expect("bias");
        assert_eq!((bias.min, bias.max), (Some(0.0), Some(1.0)));
        let falloff = find("falloff_Z").expect("falloff");
        assert_eq!(falloff.max, Some(10.0));
        for name in ["amp_positive_mult_X", "amp_negative_mult_X", "amp_bias_LPS_mult_X", "strength"] {
            assert_eq!(find(name).expect(name).default.as_scalar(), Ok(1.0), "{name}");
        }
        assert_eq!(find("amp_X").expect("amp").default.as_scalar(), Ok(0.0));
    }
}
