//! Per-frame evaluatie van een scene in topologische volgorde.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::expr::{AttrPath, EvalContext, ExprError};

use super::node::{NodeData, NodeId};
use super::topo::{Topology, TopologyError};
use super::value::Value;
use super::{MemoryScene, SceneError, SceneGraph};

/// Resultaat van een evaluatie-run.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct EvaluationResult {
    /// Tijd in seconden waarop geëvalueerd is.
    pub time: f64,
    /// Aantal uitgevoerde expressies.
    pub expressions: usize,
    /// Aantal opgeloste parent constraints.
    pub constraints: usize,
    /// Door expressies geschreven waarden, per `node.attr`.
    pub written: BTreeMap<String, f64>,
}

/// Voorbereide volgorde en inkomende verbindingen, herbruikbaar zolang de
/// scene-structuur niet wijzigt.
#[derive(Debug, Clone, Default)]
pub struct EvaluationPlan {
    order: Vec<NodeId>,
    incoming: HashMap<NodeId, Vec<(NodeId, String, String)>>,
}

impl EvaluationPlan {
    /// Bouwt een evaluatieplan op basis van een scene.
    pub fn new(scene: &MemoryScene) -> Result<Self, EvaluationError> {
        let topology = Topology::sort(scene)?;

        let mut incoming: HashMap<NodeId, Vec<(NodeId, String, String)>> = HashMap::new();
        for wire in scene.wires() {
            incoming
                .entry(wire.to.node)
                .or_default()
                .push((wire.from.node, wire.from.attr.clone(), wire.to.attr.clone()));
        }
        for connections in incoming.values_mut() {
            connections.sort();
        }

        Ok(Self {
            order: topology.order,
            incoming,
        })
    }

    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    fn incoming_connections(&self, node: NodeId) -> &[(NodeId, String, String)] {
        self.incoming.get(&node).map_or(&[], Vec::as_slice)
    }
}

/// Fouttype voor evaluatieproblemen.
#[derive(Debug)]
pub enum EvaluationError {
    /// Topologiesortering is mislukt.
    Topology(TopologyError),
    /// Een expressie kon niet uitgerekend worden.
    Expression { node: String, error: ExprError },
    /// De scene weigerde een schrijfactie.
    Scene(SceneError),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topology(err) => write!(f, "topologiesortering mislukt: {err}"),
            Self::Expression { node, error } => write!(f, "expressie `{node}` faalde: {error}"),
            Self::Scene(err) => write!(f, "scene-fout tijdens evaluatie: {err}"),
        }
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Topology(err) => Some(err),
            Self::Expression { error, .. } => Some(error),
            Self::Scene(err) => Some(err),
        }
    }
}

impl From<TopologyError> for EvaluationError {
    fn from(error: TopologyError) -> Self {
        Self::Topology(error)
    }
}

impl From<SceneError> for EvaluationError {
    fn from(error: SceneError) -> Self {
        Self::Scene(error)
    }
}

/// Leest attributen rechtstreeks uit de scene.
struct SceneContext<'a> {
    scene: &'a MemoryScene,
    time: f64,
}

impl EvalContext for SceneContext<'_> {
    fn time(&self) -> f64 {
        self.time
    }

    fn read(&self, path: &AttrPath) -> Option<f64> {
        let id = self.scene.find_node(&path.node)?;
        self.scene.node(id)?.attribute(&path.attr)?.value.as_scalar().ok()
    }
}

/// Evalueert de scene op `time` seconden.
pub fn evaluate(scene: &mut MemoryScene, time: f64) -> Result<EvaluationResult, EvaluationError> {
    let plan = EvaluationPlan::new(scene)?;
    evaluate_with_plan(scene, &plan, time)
}

/// Evalueert de scene met behulp van een vooraf opgebouwd evaluatieplan.
/// Nodes die sinds het bouwen van het plan verdwenen zijn worden overgeslagen.
pub fn evaluate_with_plan(
    scene: &mut MemoryScene,
    plan: &EvaluationPlan,
    time: f64,
) -> Result<EvaluationResult, EvaluationError> {
    let mut result = EvaluationResult {
        time,
        ..EvaluationResult::default()
    };

    for &node_id in plan.order() {
        if scene.node(node_id).is_none() {
            continue;
        }

        for (from_node, from_attr, to_attr) in plan.incoming_connections(node_id) {
            let value = scene.get_attribute(*from_node, from_attr)?;
            write_value(scene, node_id, to_attr, &value)?;
        }

        let Some(node) = scene.node(node_id) else {
            continue;
        };
        match &node.data {
            NodeData::Expression(program) => {
                let ctx = SceneContext { scene: &*scene, time };
                let outputs = program.run(&ctx).map_err(|error| EvaluationError::Expression {
                    node: node.name.clone(),
                    error,
                })?;
                for (target, value) in outputs {
                    let target_id = scene
                        .find_node(&target.node)
                        .ok_or_else(|| SceneError::UnknownName(target.node.clone()))?;
                    write_value(scene, target_id, &target.attr, &Value::Number(value))?;
                    result.written.insert(target.to_string(), value);
                }
                result.expressions += 1;
            }
            NodeData::ParentConstraint { driver, driven } => {
                let (driver, driven) = (*driver, *driven);
                let world = scene.world_matrix(driver)?;
                scene.place(driven, world, false)?;
                result.constraints += 1;
            }
            _ => {}
        }
    }

    log::debug!(
        "evaluatie t={time}: {} expressies, {} constraints",
        result.expressions,
        result.constraints
    );
    Ok(result)
}

/// Schrijft een waarde zonder lock-controle; gelockte kanalen mogen wel
/// aangestuurd worden.
fn write_value(scene: &mut MemoryScene, id: NodeId, attr: &str, value: &Value) -> Result<(), SceneError> {
    let node = scene.node_mut(id).ok_or(SceneError::UnknownNode(id))?;
    let name = node.name.clone();
    let slot = node.attributes.get_mut(attr).ok_or_else(|| SceneError::UnknownAttribute {
        node: name.clone(),
        attr: attr.to_owned(),
    })?;
    slot.value = value.coerce_to(&slot.spec.ty).map_err(|err| SceneError::InvalidValue {
        node: name,
        attr: attr.to_owned(),
        reason: super::value::AttributeError::Value(err),
    })?;
    Ok(())
}

impl MemoryScene {
    /// Evalueert alle verbindingen, expressies en constraints op `time` seconden.
    pub fn evaluate(&mut self, time: f64) -> Result<EvaluationResult, EvaluationError> {
        evaluate(self, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{DriverProgram, Expr};
    use crate::geom::{Tolerance, Transform, Vec3};
    use crate::scene::node::{NodeKind, NodeSpec};
    use crate::scene::wire::AttrRef;

    #[test]
    fn evaluates_empty_scene() {
        let mut scene = MemoryScene::new();
        let result = scene.evaluate(0.0).expect("lege scene evalueert");
        assert_eq!(result.expressions, 0);
        assert!(result.written.is_empty());
    }

    #[test]
    fn expression_output_flows_through_wires() {
        let mut scene = MemoryScene::new();
        let driver = scene.create_node(NodeSpec::new("drv", NodeKind::Transform)).expect("drv");
        let follower = scene.create_node(NodeSpec::new("flw", NodeKind::Transform)).expect("flw");
        scene
            .connect(&AttrRef::new(driver, "rotateX"), &AttrRef::new(follower, "rotateY"))
            .expect("connect");

        let mut program = DriverProgram::new();
        program.assign(AttrPath::new("drv", "rotateX"), Expr::Time * Expr::constant(10.0));
        scene.create_expression("drv_exp", program).expect("expressie");

        let result = scene.evaluate(2.0).expect("evaluatie");
        assert_eq!(result.written.get("drv.rotateX"), Some(&20.0));
        assert_eq!(scene.get_attribute(follower, "rotateY"), Ok(Value::Number(20.0)));
    }

    #[test]
    fn constraint_moves_driven_to_driver() {
        let mut scene = MemoryScene::new();
        let driver = scene
            .create_node(
                NodeSpec::new("drv", NodeKind::Joint).matrix(Transform::translate(Vec3::new(1.0, 2.0, 3.0))),
            )
            .expect("drv");
        let driven = scene.create_node(NodeSpec::new("obj", NodeKind::Transform)).expect("obj");
        scene.parent_constraint("obj_tempCns", driver, driven).expect("constraint");

        let mut program = DriverProgram::new();
        program.assign(AttrPath::new("drv", "rotateZ"), Expr::constant(90.0));
        scene.create_expression("drv_exp", program).expect("expressie");

        let result = scene.evaluate(0.0).expect("evaluatie");
        assert_eq!(result.constraints, 1);
        let expected = scene.world_matrix(driver).expect("driver");
        let actual = scene.world_matrix(driven).expect("driven");
        assert!(expected.approx_eq(actual, Tolerance::new(1e-9)));
    }

    #[test]
    fn expression_errors_name_the_node() {
        let mut scene = MemoryScene::new();
        scene.create_node(NodeSpec::new("drv", NodeKind::Transform)).expect("drv");
        let mut program = DriverProgram::new();
        program.assign(AttrPath::new("drv", "rotateX"), Expr::constant(1.0) / Expr::Time);
        scene.create_expression("drv_exp", program).expect("expressie");

        let err = scene.evaluate(0.0).expect_err("deling door nul");
        match err {
            EvaluationError::Expression { node, .. } => assert_eq!(node, "drv_exp"),
            other => panic!("onverwachte fout: {other:?}"),
        }
    }
}
