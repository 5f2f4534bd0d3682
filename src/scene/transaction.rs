//! Transactiegrens rond een reeks scene-mutaties.
//!
//! Een [`Transaction`] houdt een journaal bij: nodes die via hem aangemaakt
//! worden, en voor elke wijziging aan een node die al bestond de toestand van
//! vóór die wijziging. Verdwijnt hij zonder [`Transaction::commit`], dan wordt
//! het journaal in omgekeerde volgorde teruggespeeld.

use crate::expr::DriverProgram;
use crate::geom::{NurbsCurve3, Point3, Transform};

use super::node::{Node, NodeData, NodeId, NodeSpec};
use super::value::{AttributeSpec, Value};
use super::wire::{AttrRef, Wire};
use super::{SceneError, SceneGraph, SplineIkNodes, SplineIkRequest};

/// Eén terug te draaien stap.
#[derive(Debug)]
enum Undo {
    Created(NodeId),
    /// Toestand van een bestaande node vóór een wijziging.
    Restore(Box<Node>),
    Connected(AttrRef),
    Deleted {
        nodes: Vec<Node>,
        /// Sets die een verwijderde node als lid hadden.
        sets: Vec<Node>,
        wires: Vec<Wire>,
    },
}

pub struct Transaction<'a> {
    scene: &'a mut dyn SceneGraph,
    owner: Option<String>,
    created: Vec<NodeId>,
    journal: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    /// Start een transactie. Nieuwe nodes krijgen `owner` als eigenaar.
    pub fn begin(scene: &'a mut dyn SceneGraph, owner: Option<&str>) -> Self {
        Self {
            scene,
            owner: owner.map(str::to_owned),
            created: Vec::new(),
            journal: Vec::new(),
            committed: false,
        }
    }

    #[must_use]
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    /// Houdt alle wijzigingen en geeft de ids van de aangemaakte nodes terug.
    pub fn commit(mut self) -> Vec<NodeId> {
        self.committed = true;
        log::debug!(
            "transactie gecommit: {} nodes, {} stappen",
            self.created.len(),
            self.journal.len()
        );
        self.journal.clear();
        std::mem::take(&mut self.created)
    }

    /// Draait alles terug wat deze transactie gedaan heeft.
    pub fn rollback(mut self) {
        self.undo();
    }

    fn undo(&mut self) {
        self.committed = true;
        self.created.clear();
        let journal = std::mem::take(&mut self.journal);
        let steps = journal.len();
        for step in journal.into_iter().rev() {
            if let Err(err) = self.revert(step) {
                log::warn!("rollback: {err}");
            }
        }
        log::debug!("transactie teruggedraaid: {steps} stappen");
    }

    fn revert(&mut self, step: Undo) -> Result<(), SceneError> {
        match step {
            Undo::Created(id) => {
                if self.scene.get_node(id).is_ok() {
                    self.scene.delete_node(id)?;
                }
            }
            Undo::Restore(node) => self.scene.restore_node(*node)?,
            Undo::Connected(to) => {
                self.scene.disconnect(&to);
            }
            Undo::Deleted { nodes, sets, wires } => {
                for node in nodes.into_iter().chain(sets) {
                    self.scene.restore_node(node)?;
                }
                for wire in wires {
                    self.scene.restore_wire(wire)?;
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        self.created.push(id);
        self.journal.push(Undo::Created(id));
        if let Some(owner) = &self.owner {
            self.scene.set_owner(id, Some(owner.as_str()))?;
        }
        Ok(id)
    }

    /// Legt de huidige toestand vast van een node die niet door deze
    /// transactie is aangemaakt.
    fn snapshot(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.created.contains(&id) {
            return Ok(());
        }
        let node = self.scene.get_node(id)?.clone();
        self.journal.push(Undo::Restore(Box::new(node)));
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.undo();
        }
    }
}

impl SceneGraph for Transaction<'_> {
    fn find(&self, name: &str) -> Option<NodeId> {
        self.scene.find(name)
    }

    fn get_node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.scene.get_node(id)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.scene.children(id)
    }

    fn ls(&self, pattern: &str) -> Vec<NodeId> {
        self.scene.ls(pattern)
    }

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError> {
        let id = self.scene.create_node(spec)?;
        self.record(id)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let doomed = self.scene.deletion_set(id)?;
        let mut nodes = Vec::with_capacity(doomed.len());
        let mut wires: Vec<Wire> = Vec::new();
        for doomed_id in &doomed {
            nodes.push(self.scene.get_node(*doomed_id)?.clone());
            for wire in self.scene.wires_touching(*doomed_id) {
                if !wires.contains(&wire) {
                    wires.push(wire);
                }
            }
        }
        let sets: Vec<Node> = self
            .scene
            .ls("*")
            .into_iter()
            .filter(|set| !doomed.contains(set))
            .filter_map(|set| self.scene.get_node(set).ok())
            .filter(|node| match &node.data {
                NodeData::Set { members } => members.iter().any(|member| doomed.contains(member)),
                _ => false,
            })
            .cloned()
            .collect();

        let deleted = self.scene.delete_node(id)?;
        self.created.retain(|created| !deleted.contains(created));
        self.journal.push(Undo::Deleted { nodes, sets, wires });
        Ok(deleted)
    }

    fn deletion_set(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.scene.deletion_set(id)
    }

    fn world_matrix(&self, id: NodeId) -> Result<Transform, SceneError> {
        self.scene.world_matrix(id)
    }

    fn set_world_matrix(&mut self, id: NodeId, matrix: Transform) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.set_world_matrix(id, matrix)
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.set_parent(id, parent)
    }

    fn freeze_rotation(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.freeze_rotation(id)
    }

    fn add_attribute(&mut self, id: NodeId, spec: AttributeSpec) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.add_attribute(id, spec)
    }

    fn get_attribute(&self, id: NodeId, attr: &str) -> Result<Value, SceneError> {
        self.scene.get_attribute(id, attr)
    }

    fn set_attribute(&mut self, id: NodeId, attr: &str, value: Value) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.set_attribute(id, attr, value)
    }

    fn lock_attribute(&mut self, id: NodeId, attr: &str) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.lock_attribute(id, attr)
    }

    fn connect(&mut self, from: &AttrRef, to: &AttrRef) -> Result<(), SceneError> {
        self.snapshot(to.node)?;
        self.scene.connect(from, to)?;
        self.journal.push(Undo::Connected(to.clone()));
        Ok(())
    }

    fn connections_to(&self, id: NodeId) -> Vec<Wire> {
        self.scene.connections_to(id)
    }

    fn wires_touching(&self, id: NodeId) -> Vec<Wire> {
        self.scene.wires_touching(id)
    }

    fn disconnect(&mut self, to: &AttrRef) -> bool {
        let Some(wire) = self.scene.connections_to(to.node).into_iter().find(|wire| &wire.to == to) else {
            return false;
        };
        self.journal.push(Undo::Deleted {
            nodes: Vec::new(),
            sets: Vec::new(),
            wires: vec![wire],
        });
        self.scene.disconnect(to)
    }

    fn restore_node(&mut self, node: Node) -> Result<(), SceneError> {
        let id = node.id;
        let existed = self.scene.get_node(id).is_ok();
        if existed {
            self.snapshot(id)?;
        }
        self.scene.restore_node(node)?;
        if !existed {
            self.journal.push(Undo::Created(id));
        }
        Ok(())
    }

    fn restore_wire(&mut self, wire: Wire) -> Result<(), SceneError> {
        if self.scene.wires_touching(wire.to.node).contains(&wire) {
            return Ok(());
        }
        let to = wire.to.clone();
        self.scene.restore_wire(wire)?;
        self.journal.push(Undo::Connected(to));
        Ok(())
    }

    fn create_curve(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        points: &[Point3],
        degree: usize,
    ) -> Result<NodeId, SceneError> {
        let id = self.scene.create_curve(name, parent, points, degree)?;
        self.record(id)
    }

    fn curve_world(&self, id: NodeId) -> Result<NurbsCurve3, SceneError> {
        self.scene.curve_world(id)
    }

    fn create_spline_ik(&mut self, request: &SplineIkRequest) -> Result<SplineIkNodes, SceneError> {
        let nodes = self.scene.create_spline_ik(request)?;
        for id in [nodes.curve, nodes.effector, nodes.handle] {
            self.record(id)?;
        }
        Ok(nodes)
    }

    fn bind_skin(
        &mut self,
        name: &str,
        influences: &[NodeId],
        geometry: NodeId,
        dropoff_rate: f64,
    ) -> Result<NodeId, SceneError> {
        let id = self.scene.bind_skin(name, influences, geometry, dropoff_rate)?;
        self.record(id)
    }

    fn create_expression(&mut self, name: &str, program: DriverProgram) -> Result<NodeId, SceneError> {
        let id = self.scene.create_expression(name, program)?;
        self.record(id)
    }

    fn expressions_targeting(&self, id: NodeId) -> Vec<NodeId> {
        self.scene.expressions_targeting(id)
    }

    fn parent_constraint(&mut self, name: &str, driver: NodeId, driven: NodeId) -> Result<NodeId, SceneError> {
        let id = self.scene.parent_constraint(name, driver, driven)?;
        self.record(id)
    }

    fn add_to_set(&mut self, set: NodeId, member: NodeId) -> Result<(), SceneError> {
        self.snapshot(set)?;
        self.scene.add_to_set(set, member)
    }

    fn set_owner(&mut self, id: NodeId, owner: Option<&str>) -> Result<(), SceneError> {
        self.snapshot(id)?;
        self.scene.set_owner(id, owner)
    }

    fn owned_by(&self, owner: &str) -> Vec<NodeId> {
        self.scene.owned_by(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use crate::scene::node::NodeKind;

    #[test]
    fn dropped_transaction_removes_created_nodes() {
        let mut scene = MemoryScene::new();
        scene.create_node(NodeSpec::new("keep", NodeKind::Transform)).expect("keep");
        {
            let mut tx = Transaction::begin(&mut scene, Some("tail"));
            let grp = tx.create_node(NodeSpec::new("grp", NodeKind::Transform)).expect("grp");
            tx.create_node(NodeSpec::new("child", NodeKind::Transform).parent(Some(grp)))
                .expect("child");
            tx.create_set("grp_sets").expect("set");
            assert_eq!(tx.owned_by("tail").len(), 3);
        }
        assert_eq!(scene.node_count(), 1);
        assert!(scene.find("keep").is_some());
    }

    #[test]
    fn committed_nodes_stay_and_carry_owner() {
        let mut scene = MemoryScene::new();
        let mut tx = Transaction::begin(&mut scene, Some("tail"));
        let grp = tx.create_node(NodeSpec::new("grp", NodeKind::Transform)).expect("grp");
        let shared = tx.create_set("shared_set").expect("set");
        tx.set_owner(shared, None).expect("owner");
        let ids = tx.commit();
        assert_eq!(ids, vec![grp, shared]);
        assert_eq!(scene.owned_by("tail"), vec![grp]);
        assert_eq!(scene.node_count(), 2);
    }

    #[test]
    fn dropped_transaction_restores_existing_nodes() {
        let mut scene = MemoryScene::new();
        let slave = scene.create_node(NodeSpec::new("slave", NodeKind::Transform)).expect("slave");
        scene.set_attribute(slave, "scaleX", Value::Number(2.0)).expect("scale");
        let shared = scene.create_set("shared_set").expect("set");
        {
            let mut tx = Transaction::begin(&mut scene, Some("tail"));
            let joint = tx.create_node(NodeSpec::new("jnt", NodeKind::Joint)).expect("jnt");
            tx.connect(&AttrRef::new(joint, "scaleX"), &AttrRef::new(slave, "scaleX"))
                .expect("connect");
            tx.set_attribute(slave, "translateY", Value::Number(5.0)).expect("translate");
            tx.lock_attribute(slave, "translateX").expect("lock");
            tx.add_to_set(shared, joint).expect("member");
            tx.set_owner(slave, Some("tail")).expect("owner");
            assert_eq!(tx.get_attribute(slave, "scaleX").expect("scale").as_scalar(), Ok(1.0));
        }
        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.wire_count(), 0);
        assert_eq!(scene.get_attribute(slave, "scaleX").expect("scale").as_scalar(), Ok(2.0));
        assert_eq!(scene.get_attribute(slave, "translateY").expect("translate").as_scalar(), Ok(0.0));
        let node = scene.node(slave).expect("node");
        assert!(!node.attribute("translateX").is_some_and(|attr| attr.locked));
        assert_eq!(node.owner, None);
        assert!(scene.set_members(shared).expect("members").is_empty());
    }

    #[test]
    fn dropped_transaction_brings_deleted_nodes_back() {
        let mut scene = MemoryScene::new();
        let grp = scene.create_node(NodeSpec::new("grp", NodeKind::Transform)).expect("grp");
        let child = scene
            .create_node(NodeSpec::new("child", NodeKind::Transform).parent(Some(grp)))
            .expect("child");
        let source = scene.create_node(NodeSpec::new("source", NodeKind::Transform)).expect("source");
        scene
            .connect(&AttrRef::new(source, "translateX"), &AttrRef::new(child, "translateX"))
            .expect("connect");
        let set = scene.create_set("members").expect("set");
        scene.add_to_set(set, child).expect("member");
        {
            let mut tx = Transaction::begin(&mut scene, None);
            assert_eq!(tx.delete_node(grp).expect("delete").len(), 2);
            assert!(tx.find("child").is_none());
        }
        assert_eq!(scene.node_count(), 4);
        assert_eq!(scene.find("child"), Some(child));
        assert_eq!(scene.node(child).expect("child").parent, Some(grp));
        assert_eq!(scene.wire_count(), 1);
        assert_eq!(scene.set_members(set).expect("members"), vec![child]);
    }

    #[test]
    fn explicit_rollback_tolerates_deleted_nodes() {
        let mut scene = MemoryScene::new();
        let mut tx = Transaction::begin(&mut scene, None);
        let grp = tx.create_node(NodeSpec::new("grp", NodeKind::Transform)).expect("grp");
        tx.create_node(NodeSpec::new("child", NodeKind::Transform).parent(Some(grp)))
            .expect("child");
        tx.delete_node(grp).expect("delete");
        assert!(tx.created().is_empty());
        tx.rollback();
        assert_eq!(scene.node_count(), 0);
    }
}
