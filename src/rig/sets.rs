//! Membership sets of a rig.

use crate::scene::SceneGraph;
use crate::scene::node::NodeId;

use super::error::RigError;
use super::naming::{ChainNames, MAIN_SET_NAME, RigNames};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigSets {
    pub main: NodeId,
    pub rig: NodeId,
    pub fk: NodeId,
    pub ik: NodeId,
    pub expression: NodeId,
    pub bake: NodeId,
}

/// Shared root set; created once and owned by no rig.
fn ensure_main_set(scene: &mut dyn SceneGraph) -> Result<NodeId, RigError> {
    if let Some(id) = scene.find(MAIN_SET_NAME) {
        return Ok(id);
    }
    let id = scene.create_set(MAIN_SET_NAME)?;
    scene.set_owner(id, None)?;
    Ok(id)
}

/// Creates the rig set and its four subsets, and adds the master control.
pub fn create_rig_sets(scene: &mut dyn SceneGraph, names: &RigNames, master: NodeId) -> Result<RigSets, RigError> {
    let main = ensure_main_set(scene)?;
    let rig = scene.create_set(&names.rig_set())?;
    scene.add_to_set(main, rig)?;
    scene.add_to_set(rig, master)?;

    let fk = scene.create_set(&names.fk_set())?;
    let ik = scene.create_set(&names.ik_set())?;
    let expression = scene.create_set(&names.expression_set())?;
    let bake = scene.create_set(&names.bake_set())?;
    for subset in [fk, ik, expression, bake] {
        scene.add_to_set(rig, subset)?;
    }
    Ok(RigSets {
        main,
        rig,
        fk,
        ik,
        expression,
        bake,
    })
}

/// Members contributed by one chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainMembers<'a> {
    pub fk_controls: &'a [NodeId],
    pub ik_controls: &'a [NodeId],
    pub expression_joints: &'a [NodeId],
    pub slaves: &'a [NodeId],
}

/// Adds one chain's controls, expression joints and driven objects.
pub fn add_chain(
    scene: &mut dyn SceneGraph,
    sets: &RigSets,
    names: &ChainNames,
    members: ChainMembers<'_>,
) -> Result<(), RigError> {
    let fk = scene.create_set(&names.fk_set())?;
    for control in members.fk_controls {
        scene.add_to_set(fk, *control)?;
    }
    scene.add_to_set(sets.fk, fk)?;

    let ik = scene.create_set(&names.ik_set())?;
    for control in members.ik_controls {
        scene.add_to_set(ik, *control)?;
    }
    scene.add_to_set(sets.ik, ik)?;

    for joint in members.expression_joints {
        scene.add_to_set(sets.expression, *joint)?;
    }
    for slave in members.slaves {
        scene.add_to_set(sets.bake, *slave)?;
    }
    Ok(())
}
