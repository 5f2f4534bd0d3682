//! Rig lifecycle: build, recompile, delete and list.
//!
//! A build runs in three phases. Everything that can be checked without
//! touching the scene is checked first (config, duplicate rig, objects that
//! are already driven or listed twice). Each chain is then resolved and
//! measured; chains that fail are skipped and reported, and every node name
//! the remaining chains would create must still be free. Finally all nodes
//! are created inside one [`Transaction`], so a failing construction step
//! leaves the scene exactly as it was.

use std::collections::HashMap;

use serde_json::json;

use crate::expr::DriverProgram;
use crate::geom::{Point3, Transform};
use crate::scene::node::{NodeData, NodeId, NodeKind, NodeSpec};
use crate::scene::transaction::Transaction;
use crate::scene::{SceneError, SceneGraph};

use super::chain::{ResolvedChain, resolve};
use super::config::{BuildRequest, RigConfig, TimeUnit};
use super::error::{ChainFailure, RigError};
use super::fk::{FkStyle, build_fk};
use super::master::{Master, build_master, ensure_group, lock_transform, wire_annotation, wire_chain};
use super::naming::{
    ChainNames, JointTier, MAIN_SET_NAME, MASTER_GRP_NAME, RigNames, alphabet_label, constraint_name, label_index,
};
use super::sets::{ChainMembers, RigSets, add_chain, create_rig_sets};
use super::spline_ik::{IkStyle, build_spline_ik};
use super::wave::{WaveInputs, attach, compile_chain};

/// Outcome of one built chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub index: usize,
    pub label: String,
    /// Driven objects, the tip not included.
    pub joint_count: usize,
    pub negated: bool,
    pub expression: NodeId,
    pub fk_controls: Vec<NodeId>,
    pub ik_controls: Vec<NodeId>,
    pub expression_joints: Vec<NodeId>,
}

/// Outcome of [`build_rig`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub rig: String,
    pub master: NodeId,
    pub chains: Vec<ChainReport>,
    pub skipped: Vec<ChainFailure>,
    pub created: Vec<NodeId>,
}

impl BuildReport {
    /// Summary for the CLI and the wasm facade.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "rig": self.rig,
            "created": self.created.len(),
            "chains": self.chains.iter().map(|chain| json!({
                "index": chain.index,
                "label": chain.label,
                "joints": chain.joint_count,
                "negated": chain.negated,
                "fk_controls": chain.fk_controls.len(),
                "ik_controls": chain.ik_controls.len(),
            })).collect::<Vec<_>>(),
            "skipped": self.skipped.iter().map(|failure| json!({
                "index": failure.index,
                "label": failure.label,
                "reason": failure.error.to_string(),
            })).collect::<Vec<_>>(),
        })
    }
}

/// Rejects objects listed twice and objects some rig already drives.
fn check_assignments(scene: &dyn SceneGraph, request: &BuildRequest) -> Result<(), RigError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, entries) in &request.chains {
        for entry in entries {
            if let Some(first) = seen.insert(entry.object.as_str(), *index) {
                return Err(RigError::DuplicateObject {
                    object: entry.object.clone(),
                    first,
                    second: *index,
                });
            }
            let constraint = constraint_name(&entry.object);
            if let Some(id) = scene.find(&constraint) {
                let by = scene.get_node(id)?.owner.clone().unwrap_or(constraint);
                return Err(RigError::AlreadyDriven {
                    object: entry.object.clone(),
                    by,
                });
            }
        }
    }
    Ok(())
}

/// Rejects a build whose derived node names are already taken.
fn check_names(
    scene: &dyn SceneGraph,
    names: &RigNames,
    resolved: &[ResolvedChain],
    ik_count: usize,
) -> Result<(), RigError> {
    let chain_names = resolved
        .iter()
        .flat_map(|chain| names.chain(chain.index, chain.joint_count()).node_names(ik_count));
    for name in names.node_names().into_iter().chain(chain_names) {
        if scene.exists(&name) {
            return Err(RigError::NameTaken(name));
        }
    }
    Ok(())
}

/// Builds a rig from `request`.
///
/// Chains that cannot be resolved are skipped and listed in the report; the
/// build fails with [`RigError::NoValidChains`] when none is left.
pub fn build_rig(scene: &mut dyn SceneGraph, request: &BuildRequest) -> Result<BuildReport, RigError> {
    let config = &request.config;
    config.validate()?;
    let names = RigNames::new(&config.name);
    if scene.exists(&names.master_control()) || scene.exists(&names.element_group()) {
        return Err(RigError::DuplicateRig(config.name.clone()));
    }
    check_assignments(scene, request)?;

    let mut resolved = Vec::with_capacity(request.chains.len());
    let mut skipped = Vec::new();
    for (index, entries) in &request.chains {
        match resolve(scene, *index, entries) {
            Ok(chain) => resolved.push(chain),
            Err(error) => {
                log::warn!("{}: skipping chain {index}: {error}", config.name);
                skipped.push(ChainFailure {
                    index: *index,
                    label: alphabet_label(*index),
                    error,
                });
            }
        }
    }
    if resolved.is_empty() {
        return Err(RigError::NoValidChains(skipped));
    }
    check_names(scene, &names, &resolved, config.ik_count)?;

    let frame_rate = request.time_unit.frame_rate();
    let mut tx = Transaction::begin(scene, Some(config.name.as_str()));
    let (master, chains) = assemble(&mut tx, &names, config, &resolved, frame_rate)?;
    let created = tx.commit();

    log::info!(
        "built rig {} with {} chains ({} skipped, {} nodes)",
        config.name,
        chains.len(),
        skipped.len(),
        created.len()
    );
    Ok(BuildReport {
        rig: config.name.clone(),
        master,
        chains,
        skipped,
        created,
    })
}

fn assemble(
    scene: &mut dyn SceneGraph,
    names: &RigNames,
    config: &RigConfig,
    resolved: &[ResolvedChain],
    frame_rate: f64,
) -> Result<(NodeId, Vec<ChainReport>), RigError> {
    let color = config.color.to_rgb()?;
    let top = ensure_group(scene, MASTER_GRP_NAME, None)?;
    scene.set_owner(top, None)?;
    let element = scene.create_node(
        NodeSpec::new(names.element_group(), NodeKind::Transform)
            .parent(Some(top))
            .matrix(Transform::identity()),
    )?;

    let roots: Vec<Point3> = resolved.iter().map(ResolvedChain::root_position).collect();
    let master = build_master(scene, names, element, &roots, config.ik_size, color)?;
    let sets = create_rig_sets(scene, names, master.control)?;

    let mut reports = Vec::with_capacity(resolved.len());
    for chain in resolved {
        reports.push(build_chain(scene, names, config, color, &master, &sets, element, chain, resolved.len(), frame_rate)?);
    }

    wire_annotation(scene, &master)?;
    lock_transform(scene, element)?;
    lock_transform(scene, top)?;
    Ok((master.control, reports))
}

#[allow(clippy::too_many_arguments)]
fn build_chain(
    scene: &mut dyn SceneGraph,
    names: &RigNames,
    config: &RigConfig,
    color: [f64; 3],
    master: &Master,
    sets: &RigSets,
    element: NodeId,
    chain: &ResolvedChain,
    chain_count: usize,
    frame_rate: f64,
) -> Result<ChainReport, RigError> {
    let chain_names = names.chain(chain.index, chain.joint_count());
    let chain_group = scene.create_node(
        NodeSpec::new(chain_names.base(), NodeKind::Transform)
            .parent(Some(element))
            .matrix(chain.matrices[0]),
    )?;

    let fk = build_fk(
        scene,
        &chain_names,
        chain,
        chain_group,
        master.tag,
        FkStyle {
            size: config.fk_size,
            color,
        },
    )?;
    let ik = build_spline_ik(
        scene,
        &chain_names,
        &fk,
        chain_group,
        master.tag,
        chain.joint_count(),
        IkStyle {
            size: config.ik_size,
            count: config.ik_count,
            color,
        },
    )?;
    wire_chain(scene, master, fk.group, ik.group, ik.handle)?;

    let expression = drive_chain(
        scene,
        names,
        &chain_names,
        &fk.expression_joints,
        ik.first_control(),
        chain.index,
        chain_count,
        frame_rate,
    )?;

    add_chain(
        scene,
        sets,
        &chain_names,
        ChainMembers {
            fk_controls: &fk.controls,
            ik_controls: &ik.controls,
            expression_joints: &fk.expression_joints,
            slaves: &chain.slaves,
        },
    )?;

    Ok(ChainReport {
        index: chain.index,
        label: chain_names.label.clone(),
        joint_count: chain.joint_count(),
        negated: chain.metrics.negated,
        expression,
        fk_controls: fk.controls,
        ik_controls: ik.controls,
        expression_joints: fk.expression_joints,
    })
}

/// Compiles a chain's wave and attaches it, replacing any stale expression.
#[allow(clippy::too_many_arguments)]
fn drive_chain(
    scene: &mut dyn SceneGraph,
    names: &RigNames,
    chain_names: &ChainNames,
    expression_joints: &[NodeId],
    ik_control: NodeId,
    chain_index: usize,
    chain_count: usize,
    frame_rate: f64,
) -> Result<NodeId, RigError> {
    let joint_names = expression_joints
        .iter()
        .map(|id| scene.name_of(*id))
        .collect::<Result<Vec<_>, _>>()?;
    let ik_name = scene.name_of(ik_control)?;
    let program = compile_chain(&WaveInputs {
        master: &names.master_control(),
        ik_control: &ik_name,
        expression_joints: &joint_names,
        original_joints: joint_names.len().saturating_sub(1),
        chain_index,
        chain_count,
        frame_rate,
    });
    attach(scene, &chain_names.expression(), expression_joints, program)
}

/// Regenerates every chain's expression of rig `name`. Returns the new
/// expression nodes in chain order.
pub fn recompile_drivers(scene: &mut dyn SceneGraph, name: &str, time_unit: TimeUnit) -> Result<Vec<NodeId>, RigError> {
    let names = RigNames::new(name);
    let owned = scene.owned_by(name);
    if owned.is_empty() {
        return Err(RigError::UnknownRig(name.to_owned()));
    }

    let mut chains: Vec<usize> = owned
        .iter()
        .filter_map(|id| scene.name_of(*id).ok())
        .filter_map(|node| names.label_from_fk_group(&node))
        .filter_map(|label| label_index(&label))
        .collect();
    chains.sort_unstable();
    chains.dedup();
    let chain_count = chains.len();

    let mut tx = Transaction::begin(scene, Some(name));
    let mut expressions = Vec::with_capacity(chain_count);
    for chain_index in chains {
        let base = ChainNames::new(name, chain_index, 0).base().to_owned();
        let joints = expression_joints_of(&tx, name, &base);
        let original = joints.len().saturating_sub(1);
        let chain_names = names.chain(chain_index, original);
        let ik_name = chain_names.ik_control(0);
        let ik_control = tx.find(&ik_name).ok_or(SceneError::UnknownName(ik_name))?;
        expressions.push(drive_chain(
            &mut tx,
            &names,
            &chain_names,
            &joints,
            ik_control,
            chain_index,
            chain_count,
            time_unit.frame_rate(),
        )?);
    }
    tx.commit();
    log::info!("recompiled {} drivers of rig {name}", expressions.len());
    Ok(expressions)
}

/// Expression joints of a chain, root to tip, found by name.
fn expression_joints_of(scene: &dyn SceneGraph, rig: &str, base: &str) -> Vec<NodeId> {
    let prefix = format!("{base}_");
    let suffix = JointTier::Expression.suffix();
    let mut joints: Vec<(String, NodeId)> = scene
        .ls(&format!("{prefix}*{suffix}*"))
        .into_iter()
        .filter_map(|id| {
            let node = scene.get_node(id).ok()?;
            let rest = node.name.strip_prefix(&prefix)?;
            let (digits, tail) = rest.split_once('_')?;
            let tier = tail.strip_suffix("_TIP").unwrap_or(tail);
            let ours = node.kind == NodeKind::Joint
                && node.owner.as_deref() == Some(rig)
                && digits.bytes().all(|b| b.is_ascii_digit())
                && tier == suffix.trim_start_matches('_');
            ours.then(|| (node.name.clone(), id))
        })
        .collect();
    joints.sort();
    joints.into_iter().map(|(_, id)| id).collect()
}

/// Removes every node of rig `name`, and the shared group and set once no rig
/// is left. Returns the number of removed nodes.
pub fn delete_rig(scene: &mut dyn SceneGraph, name: &str) -> Result<usize, RigError> {
    if scene.owned_by(name).is_empty() {
        return Err(RigError::UnknownRig(name.to_owned()));
    }
    let names = RigNames::new(name);
    let mut removed = 0;
    if let Some(element) = scene.find(&names.element_group()) {
        removed += scene.delete_node(element)?.len();
    }
    while let Some(id) = scene.owned_by(name).first().copied() {
        removed += scene.delete_node(id)?.len();
    }

    if let Some(top) = scene.find(MASTER_GRP_NAME) {
        if scene.children(top).is_empty() {
            removed += scene.delete_node(top)?.len();
            if let Some(main) = scene.find(MAIN_SET_NAME) {
                removed += scene.delete_node(main)?.len();
            }
        }
    }
    log::info!("deleted rig {name} ({removed} nodes)");
    Ok(removed)
}

/// Names of every rig in the scene, sorted.
#[must_use]
pub fn rig_names(scene: &dyn SceneGraph) -> Vec<String> {
    let mut names: Vec<String> = scene
        .ls("Sine_*_MCtl")
        .into_iter()
        .filter_map(|id| scene.name_of(id).ok())
        .filter_map(|name| {
            name.strip_prefix("Sine_")
                .and_then(|rest| rest.strip_suffix("_MCtl"))
                .map(str::to_owned)
        })
        .collect();
    names.sort();
    names
}

/// Driver programs of rig `name`, keyed by expression node name.
pub fn driver_programs(scene: &dyn SceneGraph, name: &str) -> Result<Vec<(String, DriverProgram)>, RigError> {
    let owned = scene.owned_by(name);
    if owned.is_empty() {
        return Err(RigError::UnknownRig(name.to_owned()));
    }
    let mut programs = Vec::new();
    for id in owned {
        let node = scene.get_node(id)?;
        if let NodeData::Expression(program) = &node.data {
            programs.push((node.name.clone(), program.clone()));
        }
    }
    programs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(programs)
}

/// Formula text of every driver of rig `name`, one block per expression.
pub fn formula_text(scene: &dyn SceneGraph, name: &str) -> Result<String, RigError> {
    let mut text = String::new();
    for (expression, program) in driver_programs(scene, name)? {
        text.push_str(&format!("// {expression}\n{program}\n"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::f64::consts::FRAC_PI_2;

    use super::*;
    use crate::geom::Vec3;
    use crate::scene::MemoryScene;

    fn scene_with_chain(prefix: &str, count: usize) -> (MemoryScene, Vec<String>) {
        let mut scene = MemoryScene::new();
        let mut parent = None;
        let mut names = Vec::new();
        for i in 0..count {
            let name = format!("{prefix}_{i:02}");
            let matrix = Transform::translate(Vec3::new(0.0, 0.0, i as f64)).compose(Transform::rotate_y(-FRAC_PI_2));
            let id = scene
                .create_node(NodeSpec::new(&name, NodeKind::Joint).parent(parent).matrix(matrix))
                .expect("joint");
            parent = Some(id);
            names.push(name);
        }
        (scene, names)
    }

    fn request(name: &str, chains: &[(usize, Vec<String>)]) -> BuildRequest {
        let chains: BTreeMap<usize, Vec<String>> = chains.iter().cloned().collect();
        BuildRequest::from_objects(&chains, RigConfig::new(name))
    }

    #[test]
    fn rig_names_lists_built_rigs() {
        let (mut scene, tail) = scene_with_chain("tail", 3);
        build_rig(&mut scene, &request("tail", &[(0, tail)])).expect("build");
        assert_eq!(rig_names(&scene), vec!["tail".to_owned()]);
    }

    #[test]
    fn second_rig_with_same_name_is_rejected() {
        let (mut scene, tail) = scene_with_chain("tail", 3);
        build_rig(&mut scene, &request("tail", &[(0, tail)])).expect("build");
        let before = scene.node_count();
        let err = build_rig(&mut scene, &request("tail", &[(1, vec!["x".into(), "y".into()])])).unwrap_err();
        assert!(matches!(err, RigError::DuplicateRig(_)));
        assert_eq!(scene.node_count(), before);
    }

    #[test]
    fn object_listed_twice_is_rejected() {
        let (mut scene, tail) = scene_with_chain("tail", 3);
        let err = build_rig(&mut scene, &request("tail", &[(0, tail.clone()), (1, tail)])).unwrap_err();
        assert!(matches!(err, RigError::DuplicateObject { first: 0, second: 1, .. }));
        assert_eq!(scene.node_count(), 3);
    }

    #[test]
    fn unresolvable_chains_are_skipped() {
        let (mut scene, tail) = scene_with_chain("tail", 3);
        let report = build_rig(
            &mut scene,
            &request("tail", &[(0, tail), (1, vec!["ghost_a".into(), "ghost_b".into()])]),
        )
        .expect("build");
        assert_eq!(report.chains.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].label, "B");

        let err = build_rig(&mut scene, &request("ghost", &[(0, vec!["only".into()])])).unwrap_err();
        assert!(matches!(err, RigError::NoValidChains(ref skipped) if skipped.len() == 1));
    }

    #[test]
    fn formula_text_has_a_block_per_chain() {
        let (mut scene, tail) = scene_with_chain("tail", 3);
        build_rig(&mut scene, &request("tail", &[(0, tail)])).expect("build");
        let text = formula_text(&scene, "tail").expect("text");
        assert!(text.starts_with("// Sine_tail_A_00_exp_jnt_exp\n"));
        assert!(text.contains("Sine_tail_A_03_exp_jnt_TIP.rotateZ = "));
        assert!(matches!(formula_text(&scene, "nope"), Err(RigError::UnknownRig(_))));
    }
}
