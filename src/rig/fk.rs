//! FK tier of a chain: offset, expression and final joints plus box controls.

use crate::geom::{Transform, Vec3};
use crate::scene::SceneGraph;
use crate::scene::node::{DrawStyle, NodeId, NodeKind, NodeSpec};
use crate::scene::value::Value;
use crate::scene::wire::AttrRef;

use super::chain::ResolvedChain;
use super::error::RigError;
use super::master::AXES;
use super::naming::{ChainNames, JointTier, constraint_name};
use super::shapes::{Icon, create_control};

/// Nodes created for one chain's FK tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkRig {
    pub group: NodeId,
    pub setup: NodeId,
    /// `N + 1` joints, the last one is the tip.
    pub offset_joints: Vec<NodeId>,
    pub expression_joints: Vec<NodeId>,
    pub final_joints: Vec<NodeId>,
    /// One per original joint.
    pub controls: Vec<NodeId>,
    pub tags: Vec<NodeId>,
    pub constraints: Vec<NodeId>,
}

/// Style knobs for the FK controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FkStyle {
    pub size: f64,
    pub color: [f64; 3],
}

fn create_joint(
    scene: &mut dyn SceneGraph,
    name: &str,
    parent: NodeId,
    matrix: Transform,
) -> Result<NodeId, RigError> {
    let joint = scene.create_node(NodeSpec::new(name, NodeKind::Joint).parent(Some(parent)).matrix(matrix))?;
    scene.freeze_rotation(joint)?;
    scene.set_attribute(joint, "drawStyle", Value::Integer(DrawStyle::Bone as i64))?;
    Ok(joint)
}

/// Builds the FK tier of `chain` under `chain_group` and binds the driven
/// objects to its final joints.
pub fn build_fk(
    scene: &mut dyn SceneGraph,
    names: &ChainNames,
    chain: &ResolvedChain,
    chain_group: NodeId,
    master_tag: NodeId,
    style: FkStyle,
) -> Result<FkRig, RigError> {
    let count = chain.joint_count();
    let group = scene.create_node(NodeSpec::new(names.fk_group(), NodeKind::Transform).parent(Some(chain_group)))?;
    let setup = scene.create_node(NodeSpec::new(names.fk_setup(), NodeKind::Transform).parent(Some(group)))?;

    let mut offset_joints = Vec::with_capacity(count + 1);
    let mut parent = setup;
    for (index, matrix) in chain.matrices.iter().enumerate() {
        let joint = create_joint(scene, &names.joint(index, JointTier::Offset), parent, *matrix)?;
        offset_joints.push(joint);
        parent = joint;
    }
    let last_world = scene.world_matrix(parent)?;
    let tip = create_joint(
        scene,
        &names.joint(count, JointTier::Offset),
        parent,
        chain.metrics.tip_matrix(last_world),
    )?;
    offset_joints.push(tip);

    let mut expression_joints = Vec::with_capacity(count + 1);
    let mut final_joints = Vec::with_capacity(count + 1);
    for (index, offset) in offset_joints.iter().enumerate() {
        let world = scene.world_matrix(*offset)?;
        let expression = create_joint(scene, &names.joint(index, JointTier::Expression), *offset, world)?;
        let last = create_joint(scene, &names.joint(index, JointTier::Final), expression, world)?;
        expression_joints.push(expression);
        final_joints.push(last);
    }

    let side = chain.metrics.side();
    let mut controls = Vec::with_capacity(count);
    let mut tags = Vec::with_capacity(count);
    let mut previous_tag = master_tag;
    for index in 0..count {
        let here = scene.world_matrix(final_joints[index])?.position();
        let next = scene.world_matrix(final_joints[index + 1])?.position();
        let width = here.distance_to(next);
        let icon = Icon::Cube {
            width,
            height: style.size,
            depth: style.size,
        };
        let shape = icon.shape(Some(Vec3::X.mul_scalar(side * width / 2.0)), style.color);
        let control = create_control(
            scene,
            &names.fk_control(index),
            Some(expression_joints[index]),
            chain.matrices[index],
            shape,
        )?;
        scene.set_parent(final_joints[index], Some(control))?;
        previous_tag = scene.tag_controller(control, Some(previous_tag))?;
        controls.push(control);
        tags.push(previous_tag);
    }

    let mut constraints = Vec::with_capacity(count);
    for (index, slave) in chain.slaves.iter().enumerate() {
        bind_scale(scene, final_joints[index], *slave, &chain.slave_names[index])?;
        let name = constraint_name(&chain.slave_names[index]);
        constraints.push(scene.parent_constraint(&name, final_joints[index], *slave)?);
    }

    log::debug!(
        "{}: {} offset joints, {} controls, side {side}",
        names.fk_group(),
        offset_joints.len(),
        controls.len()
    );

    Ok(FkRig {
        group,
        setup,
        offset_joints,
        expression_joints,
        final_joints,
        controls,
        tags,
        constraints,
    })
}

/// Connects `scaleX/Y/Z` of the final joint to the slave, skipping axes the
/// slave keeps for itself.
fn bind_scale(scene: &mut dyn SceneGraph, joint: NodeId, slave: NodeId, slave_name: &str) -> Result<(), RigError> {
    let incoming = scene.connections_to(slave);
    for axis in AXES {
        let attr = format!("scale{axis}");
        let locked = scene
            .get_node(slave)?
            .attribute(&attr)
            .is_none_or(|slot| slot.locked);
        if locked || incoming.iter().any(|wire| wire.to.attr == attr) {
            log::warn!("{slave_name}.{attr} is locked or connected, scale not bound");
            continue;
        }
        scene.connect(&AttrRef::new(joint, attr.clone()), &AttrRef::new(slave, attr))?;
    }
    Ok(())
}
