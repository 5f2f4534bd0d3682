//! `.sineConfig` presets: per keten de geordende namen van de aangestuurde
//! objecten, bijvoorbeeld `{"0": ["ns:tail_01", "ns:tail_02"]}`.
//!
//! Bij het importeren wordt elke naam tegen de scene opgelost: eerst exact,
//! daarna via de korte naam zonder namespace. Alles wat niet eenduidig
//! oplost wordt in één keer gerapporteerd.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rig::chain::closest_name;
use crate::rig::naming::{RigNames, label_index};
use crate::rig::{BuildRequest, RigConfig};
use crate::scene::SceneGraph;
use crate::scene::node::NodeData;

/// Bestandsextensie van presets.
pub const PRESET_EXTENSION: &str = "sineConfig";

/// Result type voor preset-operaties.
pub type PresetResult<T> = Result<T, PresetError>;

/// Een naam die niet gevonden werd, met de dichtstbijzijnde bestaande naam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub chain: usize,
    pub name: String,
    pub suggestion: Option<String>,
}

/// Een korte naam die op meerdere objecten past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguous {
    pub chain: usize,
    pub name: String,
    pub candidates: Vec<String>,
}

/// Een object dat in twee ketens voorkomt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyAssigned {
    pub object: String,
    pub first: usize,
    pub second: usize,
}

/// Alle problemen die een import tegenhouden.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub unresolved: Vec<Unresolved>,
    pub ambiguous: Vec<Ambiguous>,
    pub already_assigned: Vec<AlreadyAssigned>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unresolved.is_empty() && self.ambiguous.is_empty() && self.already_assigned.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for item in &self.unresolved {
            parts.push(match &item.suggestion {
                Some(suggestion) => format!(
                    "keten {}: '{}' niet gevonden (bedoelde je '{suggestion}'?)",
                    item.chain, item.name
                ),
                None => format!("keten {}: '{}' niet gevonden", item.chain, item.name),
            });
        }
        for item in &self.ambiguous {
            parts.push(format!(
                "keten {}: '{}' is niet eenduidig ({})",
                item.chain,
                item.name,
                item.candidates.join(", ")
            ));
        }
        for item in &self.already_assigned {
            parts.push(format!(
                "'{}' is al toegewezen aan keten {} en kan niet ook in keten {} staan",
                item.object, item.first, item.second
            ));
        }
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("JSON parsefout: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bestandsfout: {0}")]
    Io(#[from] std::io::Error),
    #[error("preset bevat geen ketens")]
    Empty,
    #[error("ongeldige preset: {0}")]
    Invalid(ValidationReport),
    #[error("geen rig met naam '{0}'")]
    UnknownRig(String),
}

/// Per keten-index de geordende objectnamen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preset {
    pub chains: BTreeMap<usize, Vec<String>>,
}

impl Preset {
    #[must_use]
    pub fn new(chains: BTreeMap<usize, Vec<String>>) -> Self {
        Self { chains }
    }

    pub fn parse_str(input: &str) -> PresetResult<Self> {
        let preset: Self = serde_json::from_str(input)?;
        if preset.chains.is_empty() {
            return Err(PresetError::Empty);
        }
        Ok(preset)
    }

    pub fn to_json_string(&self) -> PresetResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> PresetResult<Self> {
        Self::parse_str(&std::fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> PresetResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Lost elke naam op tegen de scene en geeft de volledige namen terug.
    pub fn resolve(&self, scene: &dyn SceneGraph) -> PresetResult<BTreeMap<usize, Vec<String>>> {
        let all_names: Vec<String> = scene
            .ls("*")
            .into_iter()
            .filter_map(|id| scene.name_of(id).ok())
            .collect();
        let mut by_short: HashMap<&str, Vec<&String>> = HashMap::new();
        for name in &all_names {
            by_short.entry(short_name(name)).or_default().push(name);
        }

        let mut report = ValidationReport::default();
        let mut assigned: HashMap<String, usize> = HashMap::new();
        let mut resolved = BTreeMap::new();
        for (chain, names) in &self.chains {
            let mut objects = Vec::with_capacity(names.len());
            for name in names {
                let full = if scene.exists(name) {
                    name.clone()
                } else {
                    match by_short.get(short_name(name)).map(Vec::as_slice) {
                        Some([only]) => (*only).clone(),
                        Some(candidates) if !candidates.is_empty() => {
                            log::warn!("preset: '{name}' past op {} objecten", candidates.len());
                            report.ambiguous.push(Ambiguous {
                                chain: *chain,
                                name: name.clone(),
                                candidates: candidates.iter().map(|c| (*c).clone()).collect(),
                            });
                            continue;
                        }
                        _ => {
                            log::warn!("preset: '{name}' bestaat niet in de scene");
                            report.unresolved.push(Unresolved {
                                chain: *chain,
                                name: name.clone(),
                                suggestion: closest_name(name, &all_names),
                            });
                            continue;
                        }
                    }
                };
                if let Some(first) = assigned.get(&full) {
                    log::warn!("preset: '{full}' is al toegewezen aan keten {first}");
                    report.already_assigned.push(AlreadyAssigned {
                        object: full,
                        first: *first,
                        second: *chain,
                    });
                    continue;
                }
                assigned.insert(full.clone(), *chain);
                objects.push(full);
            }
            resolved.insert(*chain, objects);
        }

        if report.is_empty() {
            Ok(resolved)
        } else {
            Err(PresetError::Invalid(report))
        }
    }

    /// Valideert de preset en maakt er een build-verzoek van.
    pub fn to_request(&self, scene: &dyn SceneGraph, config: RigConfig) -> PresetResult<BuildRequest> {
        Ok(BuildRequest::from_objects(&self.resolve(scene)?, config))
    }

    /// Leest de aangestuurde objecten van een bestaande rig terug uit zijn
    /// parent constraints.
    pub fn from_rig(scene: &dyn SceneGraph, rig: &str) -> PresetResult<Self> {
        let owned = scene.owned_by(rig);
        if owned.is_empty() {
            return Err(PresetError::UnknownRig(rig.to_owned()));
        }
        let prefix = format!("{}_", RigNames::new(rig).element_group());
        let mut entries: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
        for id in owned {
            let Ok(node) = scene.get_node(id) else {
                continue;
            };
            let NodeData::ParentConstraint { driver, driven } = node.data else {
                continue;
            };
            let (Ok(driver), Ok(driven)) = (scene.name_of(driver), scene.name_of(driven)) else {
                continue;
            };
            // Driver heet `Sine_{rig}_{label}_{ii}_jnt`.
            let Some((label, joint)) = driver
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix("_jnt"))
                .and_then(|rest| rest.split_once('_'))
            else {
                continue;
            };
            let (Some(chain), Ok(joint)) = (label_index(label), joint.parse::<usize>()) else {
                continue;
            };
            entries.entry(chain).or_default().insert(joint, driven);
        }
        if entries.is_empty() {
            return Err(PresetError::Empty);
        }
        Ok(Self::new(
            entries
                .into_iter()
                .map(|(chain, joints)| (chain, joints.into_values().collect()))
                .collect(),
        ))
    }
}

/// Naam zonder namespace: `ns:sub:obj` → `obj`.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use crate::scene::node::{NodeKind, NodeSpec};

    fn scene(names: &[&str]) -> MemoryScene {
        let mut scene = MemoryScene::new();
        for name in names {
            scene.create_node(NodeSpec::new(*name, NodeKind::Transform)).expect("node");
        }
        scene
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let text = r#"{"0": ["ns:tail_01", "ns:tail_02"], "3": ["ear_b", "ear_a"]}"#;
        let preset = Preset::parse_str(text).expect("preset");
        assert_eq!(preset.chains[&3], vec!["ear_b".to_owned(), "ear_a".to_owned()]);
        let again = Preset::parse_str(&preset.to_json_string().expect("json")).expect("again");
        assert_eq!(again, preset);
    }

    #[test]
    fn saved_preset_loads_back() {
        let path = std::env::temp_dir().join(format!("sine_rig_preset_{}.{PRESET_EXTENSION}", std::process::id()));
        let preset = Preset::parse_str(r#"{"1": ["fin_01", "fin_02"]}"#).expect("preset");
        preset.save(&path).expect("save");
        let loaded = Preset::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.expect("load"), preset);
    }

    #[test]
    fn empty_preset_is_rejected() {
        assert!(matches!(Preset::parse_str("{}"), Err(PresetError::Empty)));
        assert!(matches!(Preset::parse_str("[1]"), Err(PresetError::Json(_))));
    }

    #[test]
    fn namespace_stripped_names_resolve_when_unique() {
        let scene = scene(&["chr:tail_01", "chr:tail_02"]);
        let preset = Preset::parse_str(r#"{"0": ["tail_01", "other:tail_02"]}"#).expect("preset");
        let resolved = preset.resolve(&scene).expect("resolved");
        assert_eq!(resolved[&0], vec!["chr:tail_01".to_owned(), "chr:tail_02".to_owned()]);
    }

    #[test]
    fn problems_are_collected() {
        let scene = scene(&["a:tail_01", "b:tail_01", "tail_02", "fin_01"]);
        let preset = Preset::parse_str(r#"{"0": ["tail_01", "tail_03"], "1": ["fin_01", "tail_02"], "2": ["fin_01"]}"#)
            .expect("preset");
        let Err(PresetError::Invalid(report)) = preset.resolve(&scene) else {
            panic!("expected an invalid preset");
        };
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].candidates.len(), 2);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].suggestion.as_deref(), Some("tail_02"));
        assert_eq!(
            report.already_assigned,
            vec![AlreadyAssigned {
                object: "fin_01".into(),
                first: 1,
                second: 2
            }]
        );
        assert!(report.to_string().contains("bedoelde je 'tail_02'"));
    }
}
