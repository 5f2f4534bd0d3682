//! Rig configuration and build requests.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::geom::Transform;

use super::error::ConfigError;

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

fn fps_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+(\.\d+)?)\s*fps$").ok()).as_ref()
}

/// `true` when `name` is usable as a rig name.
#[must_use]
pub fn is_valid_rig_name(name: &str) -> bool {
    name_pattern().is_some_and(|re| re.is_match(name))
}

/// Default index palette, RGB in `[0, 1]`.
const PALETTE: [[f64; 3]; 32] = [
    [0.627, 0.627, 0.627],
    [0.0, 0.0, 0.0],
    [0.247, 0.247, 0.247],
    [0.498, 0.498, 0.498],
    [0.608, 0.0, 0.157],
    [0.0, 0.016, 0.376],
    [0.0, 0.0, 1.0],
    [0.0, 0.275, 0.098],
    [0.149, 0.0, 0.263],
    [0.784, 0.0, 0.784],
    [0.541, 0.282, 0.2],
    [0.247, 0.137, 0.122],
    [0.6, 0.149, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.255, 0.6],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, 0.0],
    [0.392, 0.863, 1.0],
    [0.263, 1.0, 0.639],
    [1.0, 0.69, 0.69],
    [0.894, 0.675, 0.475],
    [1.0, 1.0, 0.388],
    [0.0, 0.6, 0.329],
    [0.631, 0.416, 0.188],
    [0.62, 0.631, 0.188],
    [0.408, 0.631, 0.188],
    [0.188, 0.631, 0.365],
    [0.188, 0.631, 0.631],
    [0.188, 0.404, 0.631],
    [0.435, 0.188, 0.631],
    [0.631, 0.188, 0.416],
];

/// Control color: RGB triple or palette index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Rgb([f64; 3]),
    Index(u8),
}

impl Default for Color {
    fn default() -> Self {
        Self::Index(17)
    }
}

impl Color {
    pub fn to_rgb(self) -> Result<[f64; 3], ConfigError> {
        match self {
            Self::Rgb(rgb) => {
                if rgb.iter().all(|c| (0.0..=1.0).contains(c)) {
                    Ok(rgb)
                } else {
                    Err(ConfigError::ColorOutOfRange(rgb))
                }
            }
            Self::Index(index) => PALETTE
                .get(usize::from(index))
                .copied()
                .ok_or(ConfigError::PaletteIndex(index)),
        }
    }
}

/// Immutable per-rig settings, shared by every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    pub name: String,
    pub fk_size: f64,
    pub ik_size: f64,
    pub ik_count: usize,
    #[serde(default)]
    pub color: Color,
}

impl RigConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fk_size: 1.0,
            ik_size: 1.0,
            ik_count: 3,
            color: Color::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_rig_name(&self.name) {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }
        for (field, value) in [("fk_size", self.fk_size), ("ik_size", self.ik_size)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveSize { field, value });
            }
        }
        if self.ik_count < 2 {
            return Err(ConfigError::TooFewIkControls(self.ik_count));
        }
        self.color.to_rgb()?;
        Ok(())
    }
}

/// Scene time unit, used to turn `offset_frame` into seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnit {
    #[default]
    Film,
    Show,
    Pal,
    Ntsc,
    Palf,
    Ntscf,
    Fps(f64),
}

impl TimeUnit {
    /// Frames per second.
    #[must_use]
    pub fn frame_rate(self) -> f64 {
        match self {
            Self::Film => 24.0,
            Self::Show => 48.0,
            Self::Pal => 25.0,
            Self::Ntsc => 30.0,
            Self::Palf => 50.0,
            Self::Ntscf => 60.0,
            Self::Fps(rate) => rate,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unit = match trimmed {
            "film" => Self::Film,
            "show" => Self::Show,
            "pal" => Self::Pal,
            "ntsc" => Self::Ntsc,
            "palf" => Self::Palf,
            "ntscf" => Self::Ntscf,
            _ => {
                let rate = fps_pattern()
                    .and_then(|re| re.captures(trimmed))
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .filter(|rate| *rate > 0.0)
                    .ok_or_else(|| ConfigError::UnknownTimeUnit(s.to_owned()))?;
                Self::Fps(rate)
            }
        };
        Ok(unit)
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeUnit> for String {
    fn from(value: TimeUnit) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Film => f.write_str("film"),
            Self::Show => f.write_str("show"),
            Self::Pal => f.write_str("pal"),
            Self::Ntsc => f.write_str("ntsc"),
            Self::Palf => f.write_str("palf"),
            Self::Ntscf => f.write_str("ntscf"),
            Self::Fps(rate) => write!(f, "{rate} fps"),
        }
    }
}

/// Where a chain entry's pose comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DriverInput {
    /// Literal world matrix.
    StaticMatrix(Transform),
    /// World matrix of a scene node, read at build time.
    LiveNode(String),
}

/// One driven object and its pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub object: String,
    pub pose: DriverInput,
}

impl ChainEntry {
    /// Pose read from the object itself.
    #[must_use]
    pub fn live(object: impl Into<String>) -> Self {
        let object = object.into();
        Self {
            pose: DriverInput::LiveNode(object.clone()),
            object,
        }
    }

    #[must_use]
    pub fn fixed(object: impl Into<String>, matrix: Transform) -> Self {
        Self {
            object: object.into(),
            pose: DriverInput::StaticMatrix(matrix),
        }
    }
}

/// Everything needed to build one rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Chain index → ordered root-to-tip entries.
    pub chains: BTreeMap<usize, Vec<ChainEntry>>,
    pub config: RigConfig,
    #[serde(default)]
    pub time_unit: TimeUnit,
}

impl BuildRequest {
    /// Request whose poses all come from the named objects.
    #[must_use]
    pub fn from_objects(chains: &BTreeMap<usize, Vec<String>>, config: RigConfig) -> Self {
        let chains = chains
            .iter()
            .map(|(index, objects)| (*index, objects.iter().map(ChainEntry::live).collect()))
            .collect();
        Self {
            chains,
            config,
            time_unit: TimeUnit::default(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_units_map_to_frame_rates() {
        let cases = [
            ("film", 24.0),
            ("show", 48.0),
            ("pal", 25.0),
            ("ntsc", 30.0),
            ("palf", 50.0),
            ("ntscf", 60.0),
            ("12 fps", 12.0),
            ("23.976fps", 23.976),
        ];
        for (text, rate) in cases {
            let unit: TimeUnit = text.parse().expect(text);
            assert!((unit.frame_rate() - rate).abs() < 1e-12, "{text}");
        }
        assert!(matches!("hour".parse::<TimeUnit>(), Err(ConfigError::UnknownTimeUnit(_))));
        assert!("0 fps".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn config_validation() {
        assert!(RigConfig::new("tail_01").validate().is_ok());
        assert!(matches!(
            RigConfig::new("1tail").validate(),
            Err(ConfigError::InvalidName(_))
        ));
        let mut config = RigConfig::new("tail");
        config.ik_count = 1;
        assert!(matches!(config.validate(), Err(ConfigError::TooFewIkControls(1))));
        config.ik_count = 3;
        config.fk_size = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveSize { field: "fk_size", .. })));
        config.fk_size = 1.0;
        config.color = Color::Rgb([1.2, 0.0, 0.0]);
        assert!(config.validate().is_err());
        config.color = Color::Index(40);
        assert!(config.validate().is_err());
    }

    #[test]
    fn request_parses_from_json() {
        let json = r#"{
            "chains": {
                "0": [
                    {"object": "tail_01", "pose": {"kind": "live_node", "value": "tail_01"}},
                    {"object": "tail_02", "pose": {"kind": "static_matrix", "value": [[1,0,0,0],[0,1,0,0],[0,0,1,1],[0,0,0,1]]}}
                ]
            },
            "config": {"name": "tail", "fk_size": 1.0, "ik_size": 1.0, "ik_count": 3, "color": [1.0, 0.5, 0.0]},
            "time_unit": "30 fps"
        }"#;
        let request = BuildRequest::from_json(json).expect("valid request");
        assert_eq!(request.time_unit, TimeUnit::Fps(30.0));
        assert_eq!(request.chains[&0].len(), 2);
        assert_eq!(request.chains[&0][0].pose, DriverInput::LiveNode("tail_01".into()));
        assert_eq!(request.config.color, Color::Rgb([1.0, 0.5, 0.0]));
    }
}
