//! Spline-IK tier: IK joints along the FK offsets, a curve driven by a few
//! controls, and the connections that hand the IK pose to the FK tier.

use crate::geom::{Transform, sample_even_arc_length};
use crate::scene::node::{NodeId, NodeKind, NodeSpec};
use crate::scene::value::{AttributeSpec, Value};
use crate::scene::wire::AttrRef;
use crate::scene::{SceneError, SceneGraph, SplineIkRequest};

use super::error::RigError;
use super::fk::FkRig;
use super::master::AXES;
use super::naming::{ChainNames, JointTier};
use super::shapes::{Icon, create_control};

/// Skin dropoff between the curve and its driver joints.
pub const SKIN_DROPOFF: f64 = 2.0;
/// The first IK control is drawn this much larger than the rest.
const FIRST_CONTROL_SCALE: f64 = 1.5;

pub const SINE_MULTIPLIER_ATTR: &str = "sine_multiplier_All";

#[must_use]
pub fn fk_multiplier_attr(index: usize) -> String {
    format!("FK_multiplier_{index}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplineIkRig {
    pub group: NodeId,
    pub setup: NodeId,
    pub joints: Vec<NodeId>,
    pub handle: NodeId,
    pub effector: NodeId,
    pub curve: NodeId,
    pub control_groups: Vec<NodeId>,
    pub controls: Vec<NodeId>,
    pub control_joints: Vec<NodeId>,
    pub tags: Vec<NodeId>,
    pub skin_cluster: NodeId,
}

impl SplineIkRig {
    /// The control carrying the chain's multipliers.
    #[must_use]
    pub fn first_control(&self) -> NodeId {
        self.controls[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkStyle {
    pub size: f64,
    pub count: usize,
    pub color: [f64; 3],
}

fn hide(scene: &mut dyn SceneGraph, id: NodeId) -> Result<(), RigError> {
    scene.set_attribute(id, "visibility", Value::Boolean(false))?;
    Ok(())
}

/// Builds the spline-IK tier of a chain whose FK tier already exists.
///
/// `original_joints` is the number of driven objects; it sets how many
/// `FK_multiplier_i` attributes the first control receives.
pub fn build_spline_ik(
    scene: &mut dyn SceneGraph,
    names: &ChainNames,
    fk: &FkRig,
    chain_group: NodeId,
    master_tag: NodeId,
    original_joints: usize,
    style: IkStyle,
) -> Result<SplineIkRig, RigError> {
    let group = scene.create_node(NodeSpec::new(names.sik_group(), NodeKind::Transform).parent(Some(chain_group)))?;
    let setup = scene.create_node(NodeSpec::new(names.sik_setup(), NodeKind::Transform).parent(Some(group)))?;

    let mut joints = Vec::with_capacity(fk.offset_joints.len());
    let mut parent = setup;
    for (index, offset) in fk.offset_joints.iter().enumerate() {
        let world = scene.world_matrix(*offset)?;
        let joint = scene.create_node(
            NodeSpec::new(names.joint(index, JointTier::SplineIk), NodeKind::Joint)
                .parent(Some(parent))
                .matrix(world),
        )?;
        scene.freeze_rotation(joint)?;
        hide(scene, joint)?;
        joints.push(joint);
        parent = joint;
    }

    let (Some(&start), Some(&end)) = (joints.first(), joints.last()) else {
        return Err(SceneError::UnknownName(names.sik_group()).into());
    };
    let ik = scene.create_spline_ik(&SplineIkRequest {
        handle: names.handle(),
        effector: names.effector(),
        curve: names.curve(),
        start,
        end,
        parent: Some(group),
    })?;
    hide(scene, ik.curve)?;
    hide(scene, ik.handle)?;

    let curve = scene.curve_world(ik.curve)?;
    let samples = sample_even_arc_length(&curve, style.count)?;

    let mut control_groups = Vec::with_capacity(samples.len());
    let mut controls = Vec::with_capacity(samples.len());
    let mut control_joints = Vec::with_capacity(samples.len());
    let mut tags = Vec::with_capacity(samples.len());
    let mut previous_tag = master_tag;
    for (index, sample) in samples.iter().enumerate() {
        let matrix = Transform::translate(sample.point.to_vec3());
        let control_group = scene.create_node(
            NodeSpec::new(names.ik_control_group(index), NodeKind::Transform)
                .parent(Some(group))
                .matrix(matrix),
        )?;
        let size = if index == 0 {
            style.size * FIRST_CONTROL_SCALE
        } else {
            style.size
        };
        let control = create_control(
            scene,
            &names.ik_control(index),
            Some(control_group),
            matrix,
            Icon::Null { size }.shape(None, style.color),
        )?;
        let control_joint = scene.create_node(
            NodeSpec::new(names.ik_control_joint(index), NodeKind::Joint)
                .parent(Some(control))
                .matrix(matrix),
        )?;
        hide(scene, control_joint)?;
        previous_tag = scene.tag_controller(control, Some(previous_tag))?;

        control_groups.push(control_group);
        controls.push(control);
        control_joints.push(control_joint);
        tags.push(previous_tag);
    }

    let skin_cluster = scene.bind_skin(&names.skin_cluster(), &control_joints, ik.curve, SKIN_DROPOFF)?;

    for (ik_joint, offset) in joints.iter().zip(&fk.offset_joints) {
        for channel in ["rotate", "translate"] {
            for axis in AXES {
                let attr = format!("{channel}{axis}");
                scene.connect(&AttrRef::new(*ik_joint, attr.clone()), &AttrRef::new(*offset, attr))?;
            }
        }
    }

    let first = controls[0];
    scene.add_attribute(first, AttributeSpec::double(SINE_MULTIPLIER_ATTR, 1.0).with_range(0.0, 1.0))?;
    for index in 0..original_joints {
        scene.add_attribute(first, AttributeSpec::double(fk_multiplier_attr(index), 1.0))?;
    }

    log::debug!(
        "{}: {} IK joints, {} curve controls",
        names.sik_group(),
        joints.len(),
        controls.len()
    );

    Ok(SplineIkRig {
        group,
        setup,
        joints,
        handle: ik.handle,
        effector: ik.effector,
        curve: ik.curve,
        control_groups,
        controls,
        control_joints,
        tags,
        skin_cluster,
    })
}
