//! Definitie van nodes binnen de scene.

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::DriverProgram;
use crate::geom::{NurbsCurve3, Point3, Transform};

use super::value::{Attribute, AttributeSpec, Value};

/// Identifier voor een node binnen de scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct NodeId(pub usize);

impl NodeId {
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }
}

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Soort node. DAG-soorten hebben een transform en kunnen een parent hebben.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Transform,
    Joint,
    Curve,
    IkHandle,
    IkEffector,
    Annotation,
    SkinCluster,
    ParentConstraint,
    Expression,
    ObjectSet,
    ControllerTag,
}

impl NodeKind {
    #[must_use]
    pub const fn is_dag(self) -> bool {
        matches!(
            self,
            Self::Transform | Self::Joint | Self::Curve | Self::IkHandle | Self::IkEffector | Self::Annotation
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transform => "transform",
            Self::Joint => "joint",
            Self::Curve => "nurbsCurve",
            Self::IkHandle => "ikHandle",
            Self::IkEffector => "ikEffector",
            Self::Annotation => "annotation",
            Self::SkinCluster => "skinCluster",
            Self::ParentConstraint => "parentConstraint",
            Self::Expression => "expression",
            Self::ObjectSet => "objectSet",
            Self::ControllerTag => "controller",
        };
        f.write_str(name)
    }
}

/// Weergave van een joint in de viewport.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawStyle {
    Bone = 0,
    MultiChildBox = 1,
    Hidden = 2,
}

/// Vorm van een control: curve-stukken in lokale ruimte plus kleur.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlShape {
    pub icon: String,
    pub curves: Vec<Vec<Point3>>,
    pub color: [f64; 3],
}

/// Per-soort gegevens die niet als attribuut bestaan.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeData {
    #[default]
    None,
    Control(ControlShape),
    /// Control points in de lokale ruimte van de curve-node.
    Curve(NurbsCurve3),
    IkHandle {
        joints: Vec<NodeId>,
        effector: NodeId,
        curve: NodeId,
    },
    SkinCluster {
        influences: Vec<NodeId>,
        geometry: NodeId,
        dropoff_rate: f64,
        /// Gewicht per control point per influence; elke rij telt op tot 1.
        weights: Vec<Vec<f64>>,
        bind_pre_matrices: Vec<Transform>,
    },
    ParentConstraint {
        driver: NodeId,
        driven: NodeId,
    },
    Expression(DriverProgram),
    Annotation {
        text: String,
    },
    Set {
        members: Vec<NodeId>,
    },
    ControllerTag {
        control: NodeId,
        parent: Option<NodeId>,
    },
}

/// Kanalen die elke DAG-node krijgt.
pub const TRANSFORM_CHANNELS: [&str; 9] = [
    "translateX",
    "translateY",
    "translateZ",
    "rotateX",
    "rotateY",
    "rotateZ",
    "scaleX",
    "scaleY",
    "scaleZ",
];

/// Een node in de scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Joint orient (alleen rotatie). Blijft identiteit voor gewone transforms.
    pub orient: Transform,
    pub attributes: BTreeMap<String, Attribute>,
    pub data: NodeData,
    /// Naam van de rig die deze node bezit, `None` voor gedeelde nodes.
    pub owner: Option<String>,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let mut node = Self {
            id: NodeId::default(),
            name: name.into(),
            kind,
            parent: None,
            orient: Transform::identity(),
            attributes: BTreeMap::new(),
            data: NodeData::None,
            owner: None,
        };
        if kind.is_dag() {
            for channel in TRANSFORM_CHANNELS {
                let default = if channel.starts_with("scale") { 1.0 } else { 0.0 };
                node.insert_attribute(AttributeSpec::double(channel, default));
            }
            node.insert_attribute(AttributeSpec::boolean("visibility", true));
        }
        if kind == NodeKind::Joint {
            node.insert_attribute(AttributeSpec::integer("drawStyle", DrawStyle::Bone as i64));
        }
        node
    }

    pub(crate) fn insert_attribute(&mut self, spec: AttributeSpec) {
        self.attributes.insert(spec.name.clone(), Attribute::new(spec));
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Scalaire waarde van een kanaal; ontbrekende kanalen tellen als 0.
    #[must_use]
    pub fn channel(&self, name: &str) -> f64 {
        self.attributes
            .get(name)
            .and_then(|attr| attr.value.as_scalar().ok())
            .unwrap_or(0.0)
    }

    pub(crate) fn set_channel(&mut self, name: &str, value: f64) {
        if let Some(attr) = self.attributes.get_mut(name) {
            attr.value = Value::Number(value);
        }
    }

    /// Custom attributen: alles behalve de ingebouwde kanalen.
    pub fn custom_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .values()
            .filter(|attr| !is_builtin_attribute(self.kind, &attr.spec.name))
    }
}

fn is_builtin_attribute(kind: NodeKind, name: &str) -> bool {
    if kind.is_dag() && (TRANSFORM_CHANNELS.contains(&name) || name == "visibility") {
        return true;
    }
    match kind {
        NodeKind::Joint => name == "drawStyle",
        NodeKind::IkHandle => name == "roll" || name == "twist",
        _ => false,
    }
}

/// Alles wat nodig is om een node aan te maken.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Wereldmatrix; `None` laat de node op zijn parent staan.
    pub matrix: Option<Transform>,
    pub data: NodeData,
}

impl NodeSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            matrix: None,
            data: NodeData::None,
        }
    }

    #[must_use]
    pub fn parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent = parent;
        self
    }

    #[must_use]
    pub fn matrix(mut self, matrix: Transform) -> Self {
        self.matrix = Some(matrix);
        self
    }

    #[must_use]
    pub fn data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joints_get_channels_and_draw_style() {
        let node = Node::new("a_jnt", NodeKind::Joint);
        assert_eq!(node.channel("scaleY"), 1.0);
        assert_eq!(node.channel("rotateX"), 0.0);
        assert!(node.attribute("drawStyle").is_some());
        assert_eq!(node.custom_attributes().count(), 0);
    }

    #[test]
    fn sets_have_no_transform() {
        let node = Node::new("some_sets", NodeKind::ObjectSet);
        assert!(node.attribute("translateX").is_none());
        assert!(!NodeKind::ObjectSet.is_dag());
    }
}
