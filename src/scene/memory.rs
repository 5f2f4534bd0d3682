//! In-memory implementatie van [`SceneGraph`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use wildmatch::WildMatch;

use crate::expr::{AttrPath, DriverProgram};
use crate::geom::{Curve3, NurbsCurve3, Point3, Tolerance, Transform, Vec3};

use super::node::{Node, NodeData, NodeId, NodeKind, NodeSpec};
use super::value::{AttributeSpec, Value};
use super::wire::{AttrRef, Wire};
use super::{SceneError, SceneGraph, SplineIkNodes, SplineIkRequest};

/// Scene container met een naamindex voor snelle lookups.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    nodes: BTreeMap<NodeId, Node>,
    wires: Vec<Wire>,
    name_index: HashMap<String, NodeId>,
    next_id: usize,
}

impl MemoryScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    #[must_use]
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn require_kind(&self, id: NodeId, kind: NodeKind) -> Result<&Node, SceneError> {
        let node = self.require(id)?;
        if node.kind == kind {
            Ok(node)
        } else {
            Err(SceneError::WrongKind {
                node: node.name.clone(),
                expected: kind,
            })
        }
    }

    fn require_dag(&self, id: NodeId) -> Result<&Node, SceneError> {
        let node = self.require(id)?;
        if node.kind.is_dag() {
            Ok(node)
        } else {
            Err(SceneError::WrongKind {
                node: node.name.clone(),
                expected: NodeKind::Transform,
            })
        }
    }

    /// Lokale matrix: translate · orient · rotate(xyz, graden) · scale.
    pub(crate) fn local_matrix(node: &Node) -> Transform {
        let translate = Vec3::new(node.channel("translateX"), node.channel("translateY"), node.channel("translateZ"));
        let rotate = Vec3::new(node.channel("rotateX"), node.channel("rotateY"), node.channel("rotateZ"));
        let scale = Vec3::new(node.channel("scaleX"), node.channel("scaleY"), node.channel("scaleZ"));
        Transform::translate(translate)
            .compose(node.orient)
            .compose(Transform::from_euler_xyz(rotate.to_radians()))
            .compose(Transform::scale(scale.x, scale.y, scale.z))
    }

    fn parent_world(&self, node: &Node) -> Result<Transform, SceneError> {
        node.parent
            .map_or(Ok(Transform::identity()), |parent| self.world_matrix(parent))
    }

    /// Zet translate/rotate (en optioneel scale) zodat de node op `matrix`
    /// in wereldruimte staat. Locks worden hier niet gecontroleerd.
    pub(crate) fn place(&mut self, id: NodeId, matrix: Transform, include_scale: bool) -> Result<(), SceneError> {
        let node = self.require(id)?;
        let name = node.name.clone();
        let parent_inverse = self
            .parent_world(node)?
            .inverse()
            .ok_or_else(|| SceneError::SingularMatrix(name.clone()))?;
        let local = parent_inverse.compose(matrix);
        let parts = local.decompose().ok_or_else(|| SceneError::SingularMatrix(name.clone()))?;
        let orient_inverse = node.orient.inverse().ok_or(SceneError::SingularMatrix(name))?;
        let rotate = orient_inverse.compose(parts.rotation).to_euler_xyz().to_degrees();

        let node = self.require_mut(id)?;
        for (axis, suffix) in ["X", "Y", "Z"].into_iter().enumerate() {
            node.set_channel(&format!("translate{suffix}"), parts.translation.component(axis));
            node.set_channel(&format!("rotate{suffix}"), rotate.component(axis));
            if include_scale {
                node.set_channel(&format!("scale{suffix}"), parts.scale.component(axis));
            }
        }
        Ok(())
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current));
        }
        out
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(&node).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    fn resolve_path(&self, path: &AttrPath) -> Result<AttrRef, SceneError> {
        let id = self
            .find_node(&path.node)
            .ok_or_else(|| SceneError::UnknownName(path.node.clone()))?;
        let node = self.require(id)?;
        if node.attribute(&path.attr).is_none() {
            return Err(SceneError::UnknownAttribute {
                node: path.node.clone(),
                attr: path.attr.clone(),
            });
        }
        Ok(AttrRef::new(id, path.attr.clone()))
    }

    /// Naam van de expressie die dit attribuut al beschrijft, indien aanwezig.
    fn expression_writing(&self, target: &AttrPath) -> Option<&str> {
        self.nodes.values().find_map(|node| match &node.data {
            NodeData::Expression(program) => program
                .assignments
                .iter()
                .any(|assignment| &assignment.target == target)
                .then_some(node.name.as_str()),
            _ => None,
        })
    }

    fn skin_weights(points: &[Point3], influences: &[Point3], dropoff_rate: f64) -> Vec<Vec<f64>> {
        points
            .iter()
            .map(|cv| {
                let distances: Vec<f64> = influences.iter().map(|p| cv.distance_to(*p)).collect();
                if let Some(hit) = distances.iter().position(|d| *d <= Tolerance::ZERO_LENGTH.eps) {
                    return (0..influences.len()).map(|i| if i == hit { 1.0 } else { 0.0 }).collect();
                }
                let raw: Vec<f64> = distances.iter().map(|d| d.powf(-dropoff_rate)).collect();
                let total: f64 = raw.iter().sum();
                raw.into_iter().map(|w| w / total).collect()
            })
            .collect()
    }
}

impl SceneGraph for MemoryScene {
    fn find(&self, name: &str) -> Option<NodeId> {
        self.find_node(name)
    }

    fn get_node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.require(id)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.parent == Some(id))
            .map(|node| node.id)
            .collect()
    }

    fn ls(&self, pattern: &str) -> Vec<NodeId> {
        let matcher = WildMatch::new(pattern);
        self.nodes
            .values()
            .filter(|node| matcher.matches(&node.name))
            .map(|node| node.id)
            .collect()
    }

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError> {
        if spec.name.is_empty() || self.name_index.contains_key(&spec.name) {
            return Err(SceneError::DuplicateName(spec.name));
        }
        if let Some(parent) = spec.parent {
            let parent_node = self.require_dag(parent)?;
            if !spec.kind.is_dag() {
                return Err(SceneError::InvalidParent {
                    node: spec.name,
                    parent: parent_node.name.clone(),
                });
            }
        }

        let id = NodeId::new(self.next_id);
        self.next_id += 1;

        let mut node = Node::new(spec.name.clone(), spec.kind);
        node.id = id;
        node.parent = spec.parent;
        node.data = spec.data;
        if spec.kind == NodeKind::IkHandle {
            node.insert_attribute(AttributeSpec::double("roll", 0.0));
            node.insert_attribute(AttributeSpec::double("twist", 0.0));
        }
        self.name_index.insert(spec.name, id);
        self.nodes.insert(id, node);

        if let Some(matrix) = spec.matrix {
            if let Err(err) = self.place(id, matrix, true) {
                self.remove_single(id);
                return Err(err);
            }
        }
        log::debug!("scene: {} '{}' aangemaakt", spec.kind, self.require(id)?.name);
        Ok(id)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let doomed = self.deletion_set(id)?;
        for doomed_id in &doomed {
            self.remove_single(*doomed_id);
        }
        Ok(doomed)
    }

    fn deletion_set(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.require(id)?;
        let mut doomed: BTreeSet<NodeId> = self.descendants(id).into_iter().collect();
        let constraints: Vec<NodeId> = self
            .nodes
            .values()
            .filter_map(|node| match node.data {
                NodeData::ParentConstraint { driver, driven }
                    if doomed.contains(&driver) || doomed.contains(&driven) =>
                {
                    Some(node.id)
                }
                _ => None,
            })
            .collect();
        doomed.extend(constraints);
        Ok(doomed.into_iter().collect())
    }

    fn world_matrix(&self, id: NodeId) -> Result<Transform, SceneError> {
        let mut node = self.require(id)?;
        let mut matrix = Self::local_matrix(node);
        while let Some(parent) = node.parent {
            node = self.require(parent)?;
            matrix = Self::local_matrix(node).compose(matrix);
        }
        Ok(matrix)
    }

    fn set_world_matrix(&mut self, id: NodeId, matrix: Transform) -> Result<(), SceneError> {
        let node = self.require_dag(id)?;
        for channel in super::node::TRANSFORM_CHANNELS {
            if node.attribute(channel).is_some_and(|attr| attr.locked) {
                return Err(SceneError::LockedAttribute {
                    node: node.name.clone(),
                    attr: channel.to_owned(),
                });
            }
        }
        self.place(id, matrix, true)
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        let name = self.require_dag(id)?.name.clone();
        if let Some(parent) = parent {
            let parent_name = self.require_dag(parent)?.name.clone();
            if parent == id || self.is_ancestor(id, parent) {
                return Err(SceneError::InvalidParent {
                    node: name,
                    parent: parent_name,
                });
            }
        }
        let world = self.world_matrix(id)?;
        let previous = self.require(id)?.parent;
        self.require_mut(id)?.parent = parent;
        if let Err(err) = self.place(id, world, true) {
            self.require_mut(id)?.parent = previous;
            return Err(err);
        }
        Ok(())
    }

    fn freeze_rotation(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.require_kind(id, NodeKind::Joint)?;
        let node = self.require_mut(id)?;
        let rotate = Vec3::new(node.channel("rotateX"), node.channel("rotateY"), node.channel("rotateZ"));
        node.orient = node.orient.compose(Transform::from_euler_xyz(rotate.to_radians()));
        for channel in ["rotateX", "rotateY", "rotateZ"] {
            node.set_channel(channel, 0.0);
        }
        Ok(())
    }

    fn add_attribute(&mut self, id: NodeId, spec: AttributeSpec) -> Result<(), SceneError> {
        let node = self.require_mut(id)?;
        if node.attributes.contains_key(&spec.name) {
            return Err(SceneError::DuplicateAttribute {
                node: node.name.clone(),
                attr: spec.name,
            });
        }
        node.insert_attribute(spec);
        Ok(())
    }

    fn get_attribute(&self, id: NodeId, attr: &str) -> Result<Value, SceneError> {
        let node = self.require(id)?;
        node.attribute(attr)
            .map(|a| a.value.clone())
            .ok_or_else(|| SceneError::UnknownAttribute {
                node: node.name.clone(),
                attr: attr.to_owned(),
            })
    }

    fn set_attribute(&mut self, id: NodeId, attr: &str, value: Value) -> Result<(), SceneError> {
        let node = self.require_mut(id)?;
        let name = node.name.clone();
        let slot = node.attributes.get_mut(attr).ok_or_else(|| SceneError::UnknownAttribute {
            node: name.clone(),
            attr: attr.to_owned(),
        })?;
        if slot.locked {
            return Err(SceneError::LockedAttribute {
                node: name,
                attr: attr.to_owned(),
            });
        }
        slot.value = slot.spec.accept(&value).map_err(|reason| SceneError::InvalidValue {
            node: name,
            attr: attr.to_owned(),
            reason,
        })?;
        Ok(())
    }

    fn lock_attribute(&mut self, id: NodeId, attr: &str) -> Result<(), SceneError> {
        let node = self.require_mut(id)?;
        let name = node.name.clone();
        let slot = node.attributes.get_mut(attr).ok_or(SceneError::UnknownAttribute {
            node: name,
            attr: attr.to_owned(),
        })?;
        slot.locked = true;
        Ok(())
    }

    fn connect(&mut self, from: &AttrRef, to: &AttrRef) -> Result<(), SceneError> {
        let source = self.get_attribute(from.node, &from.attr)?;
        let target = self.require(to.node)?;
        let target_name = target.name.clone();
        let slot = target.attribute(&to.attr).ok_or_else(|| SceneError::UnknownAttribute {
            node: target_name.clone(),
            attr: to.attr.clone(),
        })?;
        if slot.locked {
            return Err(SceneError::LockedAttribute {
                node: target_name,
                attr: to.attr.clone(),
            });
        }
        if self.wires.iter().any(|wire| &wire.to == to) {
            return Err(SceneError::AlreadyConnected {
                node: target_name,
                attr: to.attr.clone(),
            });
        }
        let value = source.coerce_to(&slot.spec.ty).map_err(|err| SceneError::InvalidValue {
            node: target_name,
            attr: to.attr.clone(),
            reason: super::value::AttributeError::Value(err),
        })?;

        if let Some(slot) = self.require_mut(to.node)?.attributes.get_mut(&to.attr) {
            slot.value = value;
        }
        self.wires.push(Wire {
            from: from.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    fn connections_to(&self, id: NodeId) -> Vec<Wire> {
        self.wires.iter().filter(|wire| wire.to.node == id).cloned().collect()
    }

    fn wires_touching(&self, id: NodeId) -> Vec<Wire> {
        self.wires.iter().filter(|wire| wire.touches(id)).cloned().collect()
    }

    fn disconnect(&mut self, to: &AttrRef) -> bool {
        let before = self.wires.len();
        self.wires.retain(|wire| &wire.to != to);
        self.wires.len() != before
    }

    fn restore_node(&mut self, node: Node) -> Result<(), SceneError> {
        if self.name_index.get(&node.name).is_some_and(|existing| *existing != node.id) {
            return Err(SceneError::DuplicateName(node.name));
        }
        if let Some(previous) = self.nodes.get(&node.id) {
            if previous.name != node.name {
                let stale = previous.name.clone();
                self.name_index.remove(&stale);
            }
        }
        self.next_id = self.next_id.max(node.id.0 + 1);
        self.name_index.insert(node.name.clone(), node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    fn restore_wire(&mut self, wire: Wire) -> Result<(), SceneError> {
        self.require(wire.from.node)?;
        self.require(wire.to.node)?;
        if !self.wires.contains(&wire) {
            self.wires.push(wire);
        }
        Ok(())
    }

    fn create_curve(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        points: &[Point3],
        degree: usize,
    ) -> Result<NodeId, SceneError> {
        let world_curve = NurbsCurve3::interpolate_through_points(points, degree)?;
        let id = self.create_node(NodeSpec::new(name, NodeKind::Curve).parent(parent))?;
        let to_local = self
            .world_matrix(id)?
            .inverse()
            .ok_or_else(|| SceneError::SingularMatrix(name.to_owned()))?;
        let local = NurbsCurve3 {
            control_points: world_curve
                .control_points
                .iter()
                .map(|p| to_local.apply_point(*p))
                .collect(),
            ..world_curve
        };
        self.require_mut(id)?.data = NodeData::Curve(local);
        Ok(id)
    }

    fn curve_world(&self, id: NodeId) -> Result<NurbsCurve3, SceneError> {
        let node = self.require(id)?;
        let NodeData::Curve(curve) = &node.data else {
            return Err(SceneError::WrongKind {
                node: node.name.clone(),
                expected: NodeKind::Curve,
            });
        };
        let world = self.world_matrix(id)?;
        Ok(NurbsCurve3 {
            control_points: curve.control_points.iter().map(|p| world.apply_point(*p)).collect(),
            ..curve.clone()
        })
    }

    fn create_spline_ik(&mut self, request: &SplineIkRequest) -> Result<SplineIkNodes, SceneError> {
        let start_name = self.require_kind(request.start, NodeKind::Joint)?.name.clone();
        let end_name = self.require_kind(request.end, NodeKind::Joint)?.name.clone();
        let not_a_chain = || SceneError::NotAChain {
            start: start_name.clone(),
            end: end_name.clone(),
        };
        if request.start == request.end || !self.is_ancestor(request.start, request.end) {
            return Err(not_a_chain());
        }

        // Alleen joints tussen start en end tellen mee voor de curve.
        let mut joints = vec![request.end];
        let mut cursor = request.end;
        while cursor != request.start {
            cursor = self.require(cursor)?.parent.ok_or_else(not_a_chain)?;
            if self.require(cursor)?.kind == NodeKind::Joint {
                joints.push(cursor);
            }
        }
        joints.reverse();

        // Samenvallende joints (een tip zonder lengte) maken de fit singulier.
        let mut positions: Vec<Point3> = Vec::with_capacity(joints.len());
        for joint in &joints {
            let p = self.world_matrix(*joint)?.position();
            if positions.last().is_none_or(|last| last.distance_to(p) > Tolerance::DEFAULT.eps) {
                positions.push(p);
            }
        }
        let end_world = self.world_matrix(request.end)?;
        let end_parent = self.require(request.end)?.parent;

        let curve = self.create_curve(&request.curve, request.parent, &positions, 3)?;
        let effector = self.create_node(
            NodeSpec::new(&request.effector, NodeKind::IkEffector)
                .parent(end_parent)
                .matrix(end_world),
        )?;
        let handle = self.create_node(
            NodeSpec::new(&request.handle, NodeKind::IkHandle)
                .parent(request.parent)
                .matrix(Transform::translate(end_world.translation()))
                .data(NodeData::IkHandle {
                    joints,
                    effector,
                    curve,
                }),
        )?;
        Ok(SplineIkNodes {
            handle,
            effector,
            curve,
        })
    }

    fn bind_skin(
        &mut self,
        name: &str,
        influences: &[NodeId],
        geometry: NodeId,
        dropoff_rate: f64,
    ) -> Result<NodeId, SceneError> {
        if influences.is_empty() {
            return Err(SceneError::UnknownName(format!("{name}: geen influences")));
        }
        let mut positions = Vec::with_capacity(influences.len());
        let mut bind_pre_matrices = Vec::with_capacity(influences.len());
        for influence in influences {
            let joint = self.require_kind(*influence, NodeKind::Joint)?;
            let world = self.world_matrix(*influence)?;
            positions.push(world.position());
            bind_pre_matrices.push(world.inverse().ok_or_else(|| SceneError::SingularMatrix(joint.name.clone()))?);
        }
        let curve = self.curve_world(geometry)?;
        let weights = Self::skin_weights(&curve.control_points, &positions, dropoff_rate);

        self.create_node(NodeSpec::new(name, NodeKind::SkinCluster).data(NodeData::SkinCluster {
            influences: influences.to_vec(),
            geometry,
            dropoff_rate,
            weights,
            bind_pre_matrices,
        }))
    }

    fn create_expression(&mut self, name: &str, program: DriverProgram) -> Result<NodeId, SceneError> {
        for read in program.attribute_reads() {
            self.resolve_path(read)?;
        }
        for assignment in &program.assignments {
            let target = self.resolve_path(&assignment.target)?;
            if self.require(target.node)?.attribute(&target.attr).is_some_and(|a| a.locked) {
                return Err(SceneError::LockedAttribute {
                    node: assignment.target.node.clone(),
                    attr: assignment.target.attr.clone(),
                });
            }
            if let Some(existing) = self.expression_writing(&assignment.target) {
                return Err(SceneError::AlreadyDriven {
                    node: assignment.target.node.clone(),
                    attr: assignment.target.attr.clone(),
                    by: existing.to_owned(),
                });
            }
        }
        self.create_node(NodeSpec::new(name, NodeKind::Expression).data(NodeData::Expression(program)))
    }

    fn expressions_targeting(&self, id: NodeId) -> Vec<NodeId> {
        let Some(target) = self.nodes.get(&id) else {
            return Vec::new();
        };
        self.nodes
            .values()
            .filter(|node| match &node.data {
                NodeData::Expression(program) => program
                    .assignments
                    .iter()
                    .any(|assignment| assignment.target.node == target.name),
                _ => false,
            })
            .map(|node| node.id)
            .collect()
    }

    fn parent_constraint(&mut self, name: &str, driver: NodeId, driven: NodeId) -> Result<NodeId, SceneError> {
        self.require_dag(driver)?;
        self.require_dag(driven)?;
        self.create_node(
            NodeSpec::new(name, NodeKind::ParentConstraint).data(NodeData::ParentConstraint { driver, driven }),
        )
    }

    fn add_to_set(&mut self, set: NodeId, member: NodeId) -> Result<(), SceneError> {
        self.require(member)?;
        let node = self.require_mut(set)?;
        let NodeData::Set { members } = &mut node.data else {
            return Err(SceneError::WrongKind {
                node: node.name.clone(),
                expected: NodeKind::ObjectSet,
            });
        };
        if !members.contains(&member) {
            members.push(member);
        }
        Ok(())
    }

    fn set_owner(&mut self, id: NodeId, owner: Option<&str>) -> Result<(), SceneError> {
        self.require_mut(id)?.owner = owner.map(str::to_owned);
        Ok(())
    }

    fn owned_by(&self, owner: &str) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.owner.as_deref() == Some(owner))
            .map(|node| node.id)
            .collect()
    }
}

impl MemoryScene {
    fn remove_single(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            self.name_index.remove(&node.name);
        }
        self.wires.retain(|wire| !wire.touches(id));
        for node in self.nodes.values_mut() {
            if let NodeData::Set { members } = &mut node.data {
                members.retain(|member| *member != id);
            }
            if node.parent == Some(id) {
                node.parent = None;
            }
        }
    }

    /// Positie van de CVs na skinning met de huidige influence-matrices.
    pub fn skinned_curve_points(&self, skin: NodeId) -> Result<Vec<Point3>, SceneError> {
        let node = self.require_kind(skin, NodeKind::SkinCluster)?;
        let NodeData::SkinCluster {
            influences,
            geometry,
            weights,
            bind_pre_matrices,
            ..
        } = &node.data
        else {
            return Err(SceneError::WrongKind {
                node: node.name.clone(),
                expected: NodeKind::SkinCluster,
            });
        };
        let curve = self.curve_world(*geometry)?;
        let skin_matrices = influences
            .iter()
            .zip(bind_pre_matrices)
            .map(|(joint, pre)| self.world_matrix(*joint).map(|world| world.compose(*pre)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(curve
            .control_points
            .iter()
            .zip(weights)
            .map(|(cv, row)| {
                let blended = row
                    .iter()
                    .zip(&skin_matrices)
                    .fold(Vec3::ZERO, |acc, (w, m)| acc.add(m.apply_point(*cv).to_vec3().mul_scalar(*w)));
                Point3::from(blended)
            })
            .collect())
    }

    /// Lengte van de curve in wereldruimte.
    pub fn curve_length(&self, curve: NodeId) -> Result<f64, SceneError> {
        Ok(crate::geom::curve_arc_length(&self.curve_world(curve)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Tolerance;

    fn joint_chain(scene: &mut MemoryScene, count: usize) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut parent = None;
        for i in 0..count {
            let id = scene
                .create_node(
                    NodeSpec::new(format!("j{i}"), NodeKind::Joint)
                        .parent(parent)
                        .matrix(Transform::translate(Vec3::new(0.0, 0.0, i as f64))),
                )
                .expect("joint");
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut scene = MemoryScene::new();
        scene.create_node(NodeSpec::new("a", NodeKind::Transform)).expect("eerste");
        let err = scene.create_node(NodeSpec::new("a", NodeKind::Transform)).unwrap_err();
        assert_eq!(err, SceneError::DuplicateName("a".into()));
    }

    #[test]
    fn reparent_keeps_world_pose() {
        let mut scene = MemoryScene::new();
        let parent = scene
            .create_node(
                NodeSpec::new("grp", NodeKind::Transform)
                    .matrix(Transform::translate(Vec3::new(1.0, 2.0, 3.0)).compose(Transform::rotate_y(0.5))),
            )
            .expect("grp");
        let child = scene
            .create_node(NodeSpec::new("obj", NodeKind::Transform).matrix(Transform::translate(Vec3::new(5.0, 0.0, 0.0))))
            .expect("obj");
        let before = scene.world_matrix(child).expect("world");
        scene.set_parent(child, Some(parent)).expect("parent");
        let after = scene.world_matrix(child).expect("world");
        assert!(before.approx_eq(after, Tolerance::new(1e-9)));
        assert!(scene.node(child).expect("node").channel("translateX").abs() > 0.0);
    }

    #[test]
    fn parenting_under_a_descendant_fails() {
        let mut scene = MemoryScene::new();
        let joints = joint_chain(&mut scene, 3);
        let err = scene.set_parent(joints[0], Some(joints[2])).unwrap_err();
        assert!(matches!(err, SceneError::InvalidParent { .. }));
    }

    #[test]
    fn freeze_moves_rotation_into_orient() {
        let mut scene = MemoryScene::new();
        let world = Transform::translate(Vec3::new(0.0, 1.0, 0.0)).compose(Transform::from_euler_xyz(Vec3::new(0.2, 0.4, -0.3)));
        let joint = scene
            .create_node(NodeSpec::new("jnt", NodeKind::Joint).matrix(world))
            .expect("joint");
        assert!(scene.node(joint).expect("node").channel("rotateY").abs() > 1.0);
        scene.freeze_rotation(joint).expect("freeze");
        let node = scene.node(joint).expect("node");
        assert_eq!(node.channel("rotateX"), 0.0);
        assert!(scene.world_matrix(joint).expect("world").approx_eq(world, Tolerance::new(1e-9)));
    }

    #[test]
    fn connect_copies_value_and_refuses_second_source() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node(NodeSpec::new("a", NodeKind::Transform)).expect("a");
        let b = scene.create_node(NodeSpec::new("b", NodeKind::Transform)).expect("b");
        let c = scene.create_node(NodeSpec::new("c", NodeKind::Transform)).expect("c");
        scene.set_attribute(a, "scaleX", Value::Number(2.0)).expect("set");
        scene
            .connect(&AttrRef::new(a, "scaleX"), &AttrRef::new(b, "scaleX"))
            .expect("connect");
        assert_eq!(scene.get_attribute(b, "scaleX"), Ok(Value::Number(2.0)));
        let err = scene
            .connect(&AttrRef::new(c, "scaleX"), &AttrRef::new(b, "scaleX"))
            .unwrap_err();
        assert!(matches!(err, SceneError::AlreadyConnected { .. }));
    }

    #[test]
    fn locked_attributes_cannot_be_set_or_connected() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node(NodeSpec::new("a", NodeKind::Transform)).expect("a");
        let b = scene.create_node(NodeSpec::new("b", NodeKind::Transform)).expect("b");
        scene.lock_attribute(b, "visibility").expect("lock");
        assert!(matches!(
            scene.set_attribute(b, "visibility", Value::Boolean(false)),
            Err(SceneError::LockedAttribute { .. })
        ));
        assert!(
            scene
                .connect(&AttrRef::new(a, "visibility"), &AttrRef::new(b, "visibility"))
                .is_err()
        );
    }

    #[test]
    fn delete_removes_descendants_wires_and_set_membership() {
        let mut scene = MemoryScene::new();
        let joints = joint_chain(&mut scene, 3);
        let set = scene.create_set("demo_sets").expect("set");
        scene.add_to_set(set, joints[2]).expect("member");
        let other = scene.create_node(NodeSpec::new("other", NodeKind::Transform)).expect("other");
        scene
            .connect(&AttrRef::new(joints[2], "scaleX"), &AttrRef::new(other, "scaleX"))
            .expect("connect");
        scene.parent_constraint("other_tempCns", joints[1], other).expect("constraint");

        let deleted = scene.delete_node(joints[1]).expect("delete");
        assert_eq!(deleted.len(), 3, "j1, j2 en de constraint");
        assert!(scene.find("j2").is_none());
        assert!(scene.find("other_tempCns").is_none());
        assert_eq!(scene.wire_count(), 0);
        assert!(scene.set_members(set).expect("members").is_empty());
    }

    #[test]
    fn spline_ik_builds_curve_through_joints() {
        let mut scene = MemoryScene::new();
        let joints = joint_chain(&mut scene, 4);
        let nodes = scene
            .create_spline_ik(&SplineIkRequest {
                handle: "ik_handle".into(),
                effector: "ik_effector".into(),
                curve: "ik_curve".into(),
                start: joints[0],
                end: joints[3],
                parent: None,
            })
            .expect("spline ik");
        let curve = scene.curve_world(nodes.curve).expect("curve");
        assert!(Tolerance::new(1e-9).approx_eq_point3(curve.end_point(), Point3::new(0.0, 0.0, 3.0)));
        assert!((scene.curve_length(nodes.curve).expect("length") - 3.0).abs() < 1e-6);
        assert_eq!(scene.get_attribute(nodes.handle, "roll"), Ok(Value::Number(0.0)));
        assert_eq!(scene.node(nodes.effector).expect("effector").parent, Some(joints[2]));
    }

    #[test]
    fn skin_weights_are_normalized_and_follow_influences() {
        let mut scene = MemoryScene::new();
        let curve = scene
            .create_curve(
                "crv",
                None,
                &[Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 2.0)],
                3,
            )
            .expect("curve");
        let a = scene
            .create_node(NodeSpec::new("a", NodeKind::Joint))
            .expect("a");
        let b = scene
            .create_node(NodeSpec::new("b", NodeKind::Joint).matrix(Transform::translate(Vec3::new(0.0, 0.0, 2.0))))
            .expect("b");
        let skin = scene.bind_skin("crv_skinCluster", &[a, b], curve, 2.0).expect("skin");
        let NodeData::SkinCluster { weights, .. } = &scene.node(skin).expect("skin").data else {
            panic!("verwacht skinCluster data");
        };
        for row in weights {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert_eq!(weights[0], vec![1.0, 0.0]);

        scene.set_attribute(b, "translateX", Value::Number(1.0)).expect("move");
        let points = scene.skinned_curve_points(skin).expect("skinned");
        assert_eq!(points[0], Point3::new(0.0, 0.0, 0.0));
        assert!((points[2].x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ls_matches_wildcards() {
        let mut scene = MemoryScene::new();
        scene.create_set("Sine_tail_Sets").expect("set");
        scene.create_set("Sine_ear_Sets").expect("set");
        scene.create_set("Other").expect("set");
        assert_eq!(scene.ls("Sine*Sets").len(), 2);
    }
}
