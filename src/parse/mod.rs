//! Inlezen en wegschrijven van scene-documenten en `.sineConfig` presets.

pub mod preset;
pub mod scene;

pub use preset::{Preset, PresetError};
pub use scene::{SceneDocument, SceneDocumentError};
