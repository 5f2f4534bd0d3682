//! Per-chain metrics and resolution of chain entries against a scene.

use crate::geom::{Point3, Tolerance, Transform, Vec3};
use crate::scene::SceneGraph;
use crate::scene::node::NodeId;

use super::config::{ChainEntry, DriverInput};
use super::error::ChainError;

/// Aim/axis dot products inside this band count as aligned.
const ALIGNED_BAND: (f64, f64) = (0.99, 1.01);

/// Measurements taken from a chain's world matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainMetrics {
    /// Distance between consecutive joints, `N - 1` entries.
    pub segment_lengths: Vec<f64>,
    pub total_length: f64,
    pub average_length: f64,
    /// Sum of each segment projected on the previous joint's local X.
    pub local_x_sum: f64,
    /// The first aim does not follow the root's local X.
    pub negated: bool,
    /// Local X translation of the tip below the last joint.
    pub tip_offset: f64,
}

impl ChainMetrics {
    /// World matrix of the tip joint given the last joint's world matrix.
    #[must_use]
    pub fn tip_matrix(&self, last: Transform) -> Transform {
        last.compose(Transform::translate(Vec3::new(self.tip_offset, 0.0, 0.0)))
    }

    /// `-1` when negated, `1` otherwise.
    #[must_use]
    pub fn side(&self) -> f64 {
        if self.negated { -1.0 } else { 1.0 }
    }
}

/// Measures a chain of world matrices, root first.
pub fn analyze(matrices: &[Transform]) -> Result<ChainMetrics, ChainError> {
    if matrices.len() < 2 {
        return Err(ChainError::TooShort { count: matrices.len() });
    }

    let positions: Vec<Point3> = matrices.iter().map(|m| m.position()).collect();
    let mut segment_lengths = Vec::with_capacity(positions.len() - 1);
    let mut local_x_sum = 0.0;
    for (pair, parent) in positions.windows(2).zip(matrices) {
        let segment = pair[1].sub_point(pair[0]);
        let length = segment.length();
        segment_lengths.push(length);
        if length > Tolerance::ZERO_LENGTH.eps {
            if let Some(axis) = parent.x_axis().normalized() {
                local_x_sum += segment.dot(axis);
            }
        }
    }

    let total_length: f64 = segment_lengths.iter().sum();
    if total_length <= Tolerance::ZERO_LENGTH.eps {
        return Err(ChainError::Degenerate);
    }
    let average_length = total_length / segment_lengths.len() as f64;
    let tip_offset = average_length * (local_x_sum / total_length);

    // First non-degenerate segment sets the aim.
    let aim = positions
        .windows(2)
        .find_map(|pair| pair[1].sub_point(pair[0]).normalized())
        .unwrap_or(Vec3::X);
    let negated = matrices[0].x_axis().normalized().is_none_or(|axis| {
        let dot = aim.dot(axis);
        dot < ALIGNED_BAND.0 || dot > ALIGNED_BAND.1
    });

    log::debug!(
        "chain: {} segments, total {total_length:.4}, tip {tip_offset:.4}, negated={negated}",
        segment_lengths.len()
    );

    Ok(ChainMetrics {
        segment_lengths,
        total_length,
        average_length,
        local_x_sum,
        negated,
        tip_offset,
    })
}

/// A chain whose objects and poses resolved, ready to build.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChain {
    pub index: usize,
    pub slaves: Vec<NodeId>,
    pub slave_names: Vec<String>,
    pub matrices: Vec<Transform>,
    pub metrics: ChainMetrics,
}

impl ResolvedChain {
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.slaves.len()
    }

    #[must_use]
    pub fn root_position(&self) -> Point3 {
        self.matrices[0].position()
    }
}

/// Resolves every entry of a chain and measures it.
///
/// Unresolved names are collected together with the closest existing name so
/// the caller can report them all at once.
pub fn resolve(scene: &dyn SceneGraph, index: usize, entries: &[ChainEntry]) -> Result<ResolvedChain, ChainError> {
    if entries.len() < 2 {
        return Err(ChainError::TooShort { count: entries.len() });
    }

    let mut unresolved = Vec::new();
    let mut slaves = Vec::with_capacity(entries.len());
    let mut matrices = Vec::with_capacity(entries.len());

    for entry in entries {
        match scene.find(&entry.object) {
            Some(id) => slaves.push(id),
            None => unresolved.push(entry.object.clone()),
        }
        match &entry.pose {
            DriverInput::StaticMatrix(matrix) => matrices.push(*matrix),
            DriverInput::LiveNode(name) => match scene.find(name) {
                Some(id) => matrices.push(scene.world_matrix(id).map_err(|_| ChainError::Degenerate)?),
                None if name == &entry.object => {}
                None => unresolved.push(name.clone()),
            },
        }
    }

    if !unresolved.is_empty() {
        let candidates: Vec<String> = scene
            .ls("*")
            .into_iter()
            .filter_map(|id| scene.name_of(id).ok())
            .collect();
        let suggestions = unresolved
            .iter()
            .map(|name| closest_name(name, &candidates))
            .collect();
        for name in &unresolved {
            log::warn!("chain {index}: `{name}` does not exist in the scene");
        }
        return Err(ChainError::UnresolvedReferences {
            names: unresolved,
            suggestions,
        });
    }

    let metrics = analyze(&matrices)?;
    Ok(ResolvedChain {
        index,
        slaves,
        slave_names: entries.iter().map(|entry| entry.object.clone()).collect(),
        matrices,
        metrics,
    })
}

/// Closest candidate by edit distance, if any is reasonably close.
#[must_use]
pub fn closest_name(name: &str, candidates: &[String]) -> Option<String> {
    let limit = (name.len() / 2).max(2);
    candidates
        .iter()
        .map(|candidate| (levenshtein::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= limit)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use crate::scene::node::{NodeKind, NodeSpec};
    use std::f64::consts::FRAC_PI_2;

    /// Joints along +Z with local X pointing down the chain.
    fn aimed_chain(count: usize, spacing: f64) -> Vec<Transform> {
        (0..count)
            .map(|i| {
                Transform::translate(Vec3::new(0.0, 0.0, i as f64 * spacing)).compose(Transform::rotate_y(-FRAC_PI_2))
            })
            .collect()
    }

    #[test]
    fn aimed_chain_is_not_negated_and_tip_continues() {
        let metrics = analyze(&aimed_chain(4, 1.0)).expect("chain");
        assert!(!metrics.negated);
        assert!((metrics.total_length - 3.0).abs() < 1e-12);
        assert!((metrics.average_length - 1.0).abs() < 1e-12);
        assert!((metrics.tip_offset - 1.0).abs() < 1e-12);
        let tip = metrics.tip_matrix(aimed_chain(4, 1.0)[3]);
        assert!(Tolerance::new(1e-12).approx_eq_point3(tip.position(), Point3::new(0.0, 0.0, 4.0)));
    }

    #[test]
    fn reversed_aim_is_negated() {
        let matrices: Vec<Transform> = (0..3)
            .map(|i| {
                Transform::translate(Vec3::new(-f64::from(i), 0.0, 0.0))
            })
            .collect();
        let metrics = analyze(&matrices).expect("chain");
        assert!(metrics.negated);
        assert!(metrics.tip_offset < 0.0);
    }

    #[test]
    fn short_and_degenerate_chains_fail() {
        assert_eq!(
            analyze(&[Transform::identity()]),
            Err(ChainError::TooShort { count: 1 })
        );
        assert_eq!(
            analyze(&[Transform::identity(), Transform::identity()]),
            Err(ChainError::Degenerate)
        );
    }

    #[test]
    fn zero_segments_contribute_nothing() {
        let mut matrices = aimed_chain(3, 2.0);
        matrices.insert(1, matrices[0]);
        let metrics = analyze(&matrices).expect("chain");
        assert_eq!(metrics.segment_lengths[0], 0.0);
        assert!((metrics.total_length - 4.0).abs() < 1e-12);
        assert!(!metrics.negated);
    }

    #[test]
    fn unresolved_names_get_suggestions() {
        let mut scene = MemoryScene::new();
        scene.create_node(NodeSpec::new("tail_01", NodeKind::Transform)).expect("node");
        scene.create_node(NodeSpec::new("tail_02", NodeKind::Transform)).expect("node");
        let entries = [ChainEntry::live("tail_01"), ChainEntry::live("tial_02")];
        let err = resolve(&scene, 0, &entries).unwrap_err();
        let ChainError::UnresolvedReferences { names, suggestions } = err else {
            panic!("expected unresolved references");
        };
        assert_eq!(names, vec!["tial_02".to_owned()]);
        assert_eq!(suggestions, vec![Some("tail_02".to_owned())]);
    }
}
