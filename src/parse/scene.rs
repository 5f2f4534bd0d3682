//! JSON scene-documenten: een platte lijst objecten met parent, wereldmatrix
//! en gelockte kanalen, ingelezen in een [`MemoryScene`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{Transform, Vec3};
use crate::scene::node::{NodeKind, NodeSpec};
use crate::scene::{MemoryScene, SceneError, SceneGraph};

/// Result type voor het inlezen van scene-documenten.
pub type SceneDocumentResult<T> = Result<T, SceneDocumentError>;

#[derive(Debug, Error)]
pub enum SceneDocumentError {
    #[error("JSON parsefout: {0}")]
    Json(#[from] serde_json::Error),
    /// Een object verwijst naar een parent die er (nog) niet is.
    #[error("object '{object}' verwijst naar onbekende parent '{parent}'")]
    UnknownParent { object: String, parent: String },
    #[error("scene: {0}")]
    Scene(#[from] SceneError),
}

/// Soort object in een document; alleen DAG-soorten die een rig kan aansturen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Transform,
    Joint,
}

impl From<ObjectKind> for NodeKind {
    fn from(value: ObjectKind) -> Self {
        match value {
            ObjectKind::Transform => Self::Transform,
            ObjectKind::Joint => Self::Joint,
        }
    }
}

/// Eén object uit het document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Wereldmatrix; gaat voor `translate`/`rotate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<[f64; 3]>,
    /// Euler XYZ in graden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<[f64; 3]>,
    /// Attributen die na het aanmaken gelockt worden, bv. `scaleX`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locked: Vec<String>,
}

impl SceneObject {
    /// Wereldmatrix van het object.
    #[must_use]
    pub fn world_matrix(&self) -> Transform {
        if let Some(matrix) = self.matrix {
            return matrix;
        }
        let translate = self.translate.map_or(Vec3::ZERO, Vec3::from_array);
        let rotate = self.rotate.map_or(Vec3::ZERO, |r| Vec3::from_array(r).to_radians());
        Transform::translate(translate).compose(Transform::from_euler_xyz(rotate))
    }
}

/// Een volledig scene-document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    pub objects: Vec<SceneObject>,
}

impl SceneDocument {
    pub fn parse_str(input: &str) -> SceneDocumentResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Bouwt een nieuwe [`MemoryScene`]. Parents moeten vóór hun kinderen staan.
    pub fn to_scene(&self) -> SceneDocumentResult<MemoryScene> {
        let mut scene = MemoryScene::new();
        self.load_into(&mut scene)?;
        Ok(scene)
    }

    /// Voegt alle objecten toe aan een bestaande scene.
    pub fn load_into(&self, scene: &mut dyn SceneGraph) -> SceneDocumentResult<()> {
        for object in &self.objects {
            let parent = match &object.parent {
                Some(parent) => Some(scene.find(parent).ok_or_else(|| SceneDocumentError::UnknownParent {
                    object: object.name.clone(),
                    parent: parent.clone(),
                })?),
                None => None,
            };
            let id = scene.create_node(
                NodeSpec::new(&object.name, object.kind.into())
                    .parent(parent)
                    .matrix(object.world_matrix()),
            )?;
            for attr in &object.locked {
                scene.lock_attribute(id, attr)?;
            }
        }
        log::debug!("scene-document ingelezen: {} objecten", self.objects.len());
        Ok(())
    }
}

/// Leest een JSON scene-document direct in als [`MemoryScene`].
pub fn parse_str(input: &str) -> SceneDocumentResult<MemoryScene> {
    SceneDocument::parse_str(input)?.to_scene()
}
