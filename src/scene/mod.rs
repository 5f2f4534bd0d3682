//! Scene-graph service: de interface die de rig-bouwers gebruiken, plus een
//! in-memory implementatie en een per-frame evaluator.

use std::fmt;

pub mod evaluator;
mod memory;
pub mod node;
pub mod topo;
pub mod transaction;
pub mod value;
pub mod wire;

pub use memory::MemoryScene;

use crate::expr::DriverProgram;
use crate::geom::{CurveError, NurbsCurve3, Point3, Transform};
use node::{Node, NodeData, NodeId, NodeKind, NodeSpec};
use value::{AttributeError, AttributeSpec, Value};
use wire::{AttrRef, Wire};

/// Namen voor de drie nodes die een spline-IK handle oplevert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplineIkRequest {
    pub handle: String,
    pub effector: String,
    pub curve: String,
    pub start: NodeId,
    pub end: NodeId,
    /// Parent voor de curve en de handle.
    pub parent: Option<NodeId>,
}

/// Nodes die een spline-IK handle heeft aangemaakt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplineIkNodes {
    pub handle: NodeId,
    pub effector: NodeId,
    pub curve: NodeId,
}

/// De operaties die de rig-bouwers van een host-scene nodig hebben.
///
/// Alle mutaties lopen via deze trait, zodat een
/// [`transaction::Transaction`] ze kan registreren en terugdraaien.
pub trait SceneGraph {
    fn find(&self, name: &str) -> Option<NodeId>;

    fn get_node(&self, id: NodeId) -> Result<&Node, SceneError>;

    fn children(&self, id: NodeId) -> Vec<NodeId>;

    /// Nodes waarvan de naam op het wildcard-patroon past.
    fn ls(&self, pattern: &str) -> Vec<NodeId>;

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError>;

    /// Verwijdert de node, zijn DAG-afstammelingen en constraints die ernaar
    /// verwijzen. Geeft alle verwijderde ids terug.
    fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError>;

    /// De ids die [`SceneGraph::delete_node`] voor `id` zou verwijderen.
    fn deletion_set(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError>;

    fn world_matrix(&self, id: NodeId) -> Result<Transform, SceneError>;

    fn set_world_matrix(&mut self, id: NodeId, matrix: Transform) -> Result<(), SceneError>;

    /// Herparent met behoud van wereldpositie.
    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), SceneError>;

    /// Bakt de rotate-kanalen van een joint in zijn orient en zet ze op nul.
    fn freeze_rotation(&mut self, id: NodeId) -> Result<(), SceneError>;

    fn add_attribute(&mut self, id: NodeId, spec: AttributeSpec) -> Result<(), SceneError>;

    fn get_attribute(&self, id: NodeId, attr: &str) -> Result<Value, SceneError>;

    fn set_attribute(&mut self, id: NodeId, attr: &str, value: Value) -> Result<(), SceneError>;

    fn lock_attribute(&mut self, id: NodeId, attr: &str) -> Result<(), SceneError>;

    /// Eenrichtingsverbinding; een doel kan maar één bron hebben.
    fn connect(&mut self, from: &AttrRef, to: &AttrRef) -> Result<(), SceneError>;

    fn connections_to(&self, id: NodeId) -> Vec<Wire>;

    /// Verbindingen van of naar deze node.
    fn wires_touching(&self, id: NodeId) -> Vec<Wire>;

    /// Verwijdert de inkomende verbinding van `to`; `false` als er geen was.
    fn disconnect(&mut self, to: &AttrRef) -> bool;

    /// Zet een eerder vastgelegde node terug onder hetzelfde id. Locks en
    /// bereiken worden daarbij niet gecontroleerd.
    fn restore_node(&mut self, node: Node) -> Result<(), SceneError>;

    /// Zet een eerder bestaande verbinding terug zonder waarde te kopiëren.
    fn restore_wire(&mut self, wire: Wire) -> Result<(), SceneError>;

    /// Curve door de gegeven wereldpunten.
    fn create_curve(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        points: &[Point3],
        degree: usize,
    ) -> Result<NodeId, SceneError>;

    /// Curve in wereldruimte.
    fn curve_world(&self, id: NodeId) -> Result<NurbsCurve3, SceneError>;

    fn create_spline_ik(&mut self, request: &SplineIkRequest) -> Result<SplineIkNodes, SceneError>;

    fn bind_skin(
        &mut self,
        name: &str,
        influences: &[NodeId],
        geometry: NodeId,
        dropoff_rate: f64,
    ) -> Result<NodeId, SceneError>;

    fn create_expression(&mut self, name: &str, program: DriverProgram) -> Result<NodeId, SceneError>;

    /// Expressienodes die naar een attribuut van deze node schrijven.
    fn expressions_targeting(&self, id: NodeId) -> Vec<NodeId>;

    fn parent_constraint(&mut self, name: &str, driver: NodeId, driven: NodeId) -> Result<NodeId, SceneError>;

    fn add_to_set(&mut self, set: NodeId, member: NodeId) -> Result<(), SceneError>;

    fn set_owner(&mut self, id: NodeId, owner: Option<&str>) -> Result<(), SceneError>;

    fn owned_by(&self, owner: &str) -> Vec<NodeId>;

    fn create_set(&mut self, name: &str) -> Result<NodeId, SceneError> {
        self.create_node(NodeSpec::new(name, NodeKind::ObjectSet).data(NodeData::Set { members: Vec::new() }))
    }

    /// Controller-tag `{control}_tag`, gekoppeld aan de tag van de vorige control.
    fn tag_controller(&mut self, control: NodeId, parent_tag: Option<NodeId>) -> Result<NodeId, SceneError> {
        let name = format!("{}_tag", self.get_node(control)?.name);
        self.create_node(
            NodeSpec::new(name, NodeKind::ControllerTag).data(NodeData::ControllerTag {
                control,
                parent: parent_tag,
            }),
        )
    }

    fn create_annotation(
        &mut self,
        name: &str,
        text: &str,
        parent: Option<NodeId>,
        matrix: Transform,
    ) -> Result<NodeId, SceneError> {
        self.create_node(
            NodeSpec::new(name, NodeKind::Annotation)
                .parent(parent)
                .matrix(matrix)
                .data(NodeData::Annotation { text: text.to_owned() }),
        )
    }

    fn set_members(&self, set: NodeId) -> Result<Vec<NodeId>, SceneError> {
        match &self.get_node(set)?.data {
            NodeData::Set { members } => Ok(members.clone()),
            _ => Err(SceneError::WrongKind {
                node: self.get_node(set)?.name.clone(),
                expected: NodeKind::ObjectSet,
            }),
        }
    }

    fn name_of(&self, id: NodeId) -> Result<String, SceneError> {
        Ok(self.get_node(id)?.name.clone())
    }

    fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

/// Fouten die de scene teruggeeft.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    DuplicateName(String),
    UnknownNode(NodeId),
    UnknownName(String),
    UnknownAttribute { node: String, attr: String },
    DuplicateAttribute { node: String, attr: String },
    LockedAttribute { node: String, attr: String },
    InvalidValue { node: String, attr: String, reason: AttributeError },
    AlreadyConnected { node: String, attr: String },
    AlreadyDriven { node: String, attr: String, by: String },
    WrongKind { node: String, expected: NodeKind },
    InvalidParent { node: String, parent: String },
    SingularMatrix(String),
    NotAChain { start: String, end: String },
    Curve(CurveError),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "naam '{name}' bestaat al in de scene"),
            Self::UnknownNode(id) => write!(f, "node {id} niet gevonden in scene"),
            Self::UnknownName(name) => write!(f, "geen node met naam '{name}'"),
            Self::UnknownAttribute { node, attr } => write!(f, "attribuut '{node}.{attr}' bestaat niet"),
            Self::DuplicateAttribute { node, attr } => write!(f, "attribuut '{node}.{attr}' bestaat al"),
            Self::LockedAttribute { node, attr } => write!(f, "attribuut '{node}.{attr}' is gelockt"),
            Self::InvalidValue { node, attr, reason } => {
                write!(f, "ongeldige waarde voor '{node}.{attr}': {reason}")
            }
            Self::AlreadyConnected { node, attr } => write!(f, "'{node}.{attr}' heeft al een inkomende verbinding"),
            Self::AlreadyDriven { node, attr, by } => write!(f, "'{node}.{attr}' wordt al aangestuurd door '{by}'"),
            Self::WrongKind { node, expected } => write!(f, "node '{node}' is geen {expected}"),
            Self::InvalidParent { node, parent } => write!(f, "'{parent}' kan geen parent van '{node}' zijn"),
            Self::SingularMatrix(node) => write!(f, "matrix van '{node}' is niet inverteerbaar"),
            Self::NotAChain { start, end } => write!(f, "'{end}' is geen afstammeling van joint '{start}'"),
            Self::Curve(err) => write!(f, "curve: {err}"),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<CurveError> for SceneError {
    fn from(value: CurveError) -> Self {
        Self::Curve(value)
    }
}
