use thiserror::Error;

use crate::geom::CurveError;
use crate::scene::SceneError;

/// Problems with a rig configuration or build request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rig name `{0}` must start with a letter or underscore and contain only letters, digits and underscores")]
    InvalidName(String),
    #[error("{field} must be a positive finite number, got {value}")]
    NonPositiveSize { field: &'static str, value: f64 },
    #[error("ik_count must be at least 2, got {0}")]
    TooFewIkControls(usize),
    #[error("color components must lie in [0, 1], got {0:?}")]
    ColorOutOfRange([f64; 3]),
    #[error("palette index {0} is out of range")]
    PaletteIndex(u8),
    #[error("unrecognized time unit `{0}`")]
    UnknownTimeUnit(String),
    #[error("invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single chain was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("a chain needs at least 2 objects, got {count}")]
    TooShort { count: usize },
    #[error("every segment of the chain has zero length")]
    Degenerate,
    #[error("unresolved references: {}", format_unresolved(.names, .suggestions))]
    UnresolvedReferences {
        names: Vec<String>,
        suggestions: Vec<Option<String>>,
    },
}

fn format_unresolved(names: &[String], suggestions: &[Option<String>]) -> String {
    names
        .iter()
        .zip(suggestions.iter().chain(std::iter::repeat(&None)))
        .map(|(name, suggestion)| match suggestion {
            Some(closest) => format!("`{name}` (did you mean `{closest}`?)"),
            None => format!("`{name}`"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A chain that was left out of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainFailure {
    pub index: usize,
    pub label: String,
    pub error: ChainError,
}

#[derive(Debug, Error)]
pub enum RigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("a rig named `{0}` already exists")]
    DuplicateRig(String),
    #[error("no rig named `{0}` exists")]
    UnknownRig(String),
    #[error("`{object}` is already driven by `{by}`")]
    AlreadyDriven { object: String, by: String },
    #[error("`{object}` is already assigned to chain {first} and cannot also be in chain {second}")]
    DuplicateObject { object: String, first: usize, second: usize },
    #[error("`{0}` already exists in the scene")]
    NameTaken(String),
    #[error("no chain could be built ({} skipped)", .0.len())]
    NoValidChains(Vec<ChainFailure>),
    #[error("scene: {0}")]
    Scene(#[from] SceneError),
    #[error("curve: {0}")]
    Curve(#[from] CurveError),
}
