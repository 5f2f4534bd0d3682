#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod expr;
pub mod geom;
pub mod parse;
pub mod rig;
pub mod scene;

use std::fmt;

use parse::{Preset, SceneDocument};
use rig::{BuildRequest, RigConfig, TimeUnit};
use scene::evaluator::{self, EvaluationPlan, EvaluationResult};
use scene::value::Value;
use scene::{MemoryScene, SceneGraph};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    // Een tweede initialize() mag geen fout geven.
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                ::log::debug!($($t)*);
            }
        }
    }};
}

/// Public entry point for consumers.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    scene: Option<MemoryScene>,
    time_unit: TimeUnit,
    evaluation_plan: Option<EvaluationPlan>,
    last_result: Option<EvaluationResult>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine {
            initialized: true,
            scene: None,
            time_unit: TimeUnit::default(),
            evaluation_plan: None,
            last_result: None,
        }
    }

    /// Geeft terug of de engine de minimale initialisatie heeft doorlopen.
    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Laad een JSON scene-document; vervangt de huidige scene.
    #[wasm_bindgen]
    pub fn load_scene(&mut self, json: &str) -> Result<(), JsValue> {
        let scene = SceneDocument::parse_str(json)
            .and_then(|document| document.to_scene())
            .map_err(to_js_error)?;
        let plan = EvaluationPlan::new(&scene).map_err(to_js_error)?;
        debug_log!("scene geladen: {} nodes", scene.node_count());

        self.scene = Some(scene);
        self.evaluation_plan = Some(plan);
        self.last_result = None;
        Ok(())
    }

    /// Stel de tijdseenheid in, bv. `film`, `ntsc` of `12 fps`. Bestaande rigs
    /// worden opnieuw gecompileerd met de nieuwe frame rate.
    #[wasm_bindgen]
    pub fn set_time_unit(&mut self, unit: &str) -> Result<(), JsValue> {
        let unit = unit.parse::<TimeUnit>().map_err(to_js_error)?;
        self.apply_time_unit(unit)
    }

    /// Huidige tijdseenheid als tekst.
    #[wasm_bindgen]
    pub fn time_unit(&self) -> String {
        self.time_unit.to_string()
    }

    /// Bouw een rig uit een JSON build-verzoek en geef het rapport als JSON terug.
    /// Een `time_unit` in het verzoek wordt eerst de tijdseenheid van de engine.
    #[wasm_bindgen]
    pub fn build(&mut self, request_json: &str) -> Result<String, JsValue> {
        let request = BuildRequest::from_json(request_json).map_err(to_js_error)?;
        let document: serde_json::Value = serde_json::from_str(request_json).map_err(to_js_error)?;
        if document.get("time_unit").is_some() {
            self.apply_time_unit(request.time_unit)?;
        }
        self.build_request(request)
    }

    /// Bouw een rig uit een `.sineConfig` preset en een JSON rig-configuratie.
    #[wasm_bindgen]
    pub fn build_from_preset(&mut self, preset_json: &str, config_json: &str) -> Result<String, JsValue> {
        let preset = Preset::parse_str(preset_json).map_err(to_js_error)?;
        let config: RigConfig = serde_json::from_str(config_json).map_err(to_js_error)?;
        let request = preset.to_request(self.scene()?, config).map_err(to_js_error)?;
        self.build_request(request)
    }

    /// Exporteer de aangestuurde objecten van een rig als `.sineConfig` JSON.
    #[wasm_bindgen]
    pub fn export_preset(&self, name: &str) -> Result<String, JsValue> {
        Preset::from_rig(self.scene()?, name)
            .and_then(|preset| preset.to_json_string())
            .map_err(to_js_error)
    }

    /// Verwijder een rig; geeft het aantal verwijderde nodes terug.
    #[wasm_bindgen]
    pub fn delete_rig(&mut self, name: &str) -> Result<usize, JsValue> {
        let removed = rig::delete_rig(self.scene_mut()?, name).map_err(to_js_error)?;
        self.invalidate();
        Ok(removed)
    }

    /// Vervang de wave-expressies van een rig, met de huidige tijdseenheid.
    #[wasm_bindgen]
    pub fn recompile(&mut self, name: &str) -> Result<usize, JsValue> {
        let time_unit = self.time_unit;
        let created = rig::recompile_drivers(self.scene_mut()?, name, time_unit).map_err(to_js_error)?;
        self.invalidate();
        Ok(created.len())
    }

    /// Zet een attribuut, bv. een wave-parameter op de master control.
    #[wasm_bindgen]
    pub fn set_attribute(&mut self, node: &str, attr: &str, value: f64) -> Result<(), JsValue> {
        if !value.is_finite() {
            return Err(js_error("attribuutwaarde moet een eindig getal zijn"));
        }
        let scene = self.scene_mut()?;
        let id = scene
            .find(node)
            .ok_or_else(|| js_error(&format!("onbekende node `{node}`")))?;
        scene.set_attribute(id, attr, Value::Number(value)).map_err(to_js_error)?;
        self.last_result = None;
        Ok(())
    }

    /// Evalueer de scene op een frame in de huidige tijdseenheid.
    #[wasm_bindgen]
    pub fn evaluate(&mut self, frame: f64) -> Result<JsValue, JsValue> {
        let result = self.evaluate_frame(frame)?;
        serde_wasm_bindgen::to_value(result).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Namen van alle rigs in de scene.
    #[wasm_bindgen]
    pub fn rig_names(&self) -> Result<JsValue, JsValue> {
        let names = rig::rig_names(self.scene()?);
        serde_wasm_bindgen::to_value(&names).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Leesbare tekst van alle wave-expressies van een rig.
    #[wasm_bindgen]
    pub fn formula_text(&self, name: &str) -> Result<String, JsValue> {
        rig::formula_text(self.scene()?, name).map_err(to_js_error)
    }
}

impl Engine {
    /// Native variant van [`Engine::build`] met een getypt verzoek. De rig
    /// krijgt altijd de tijdseenheid van de engine.
    pub fn build_request(&mut self, mut request: BuildRequest) -> Result<String, JsValue> {
        request.time_unit = self.time_unit;
        let report = rig::build_rig(self.scene_mut()?, &request).map_err(to_js_error)?;
        self.invalidate();
        log::info!(
            "rig `{}` gebouwd: {} ketens, {} overgeslagen",
            report.rig,
            report.chains.len(),
            report.skipped.len()
        );
        serde_json::to_string(&report.to_json()).map_err(to_js_error)
    }

    /// Native variant van [`Engine::evaluate`].
    pub fn evaluate_frame(&mut self, frame: f64) -> Result<&EvaluationResult, JsValue> {
        if !frame.is_finite() {
            return Err(js_error("frame moet een eindig getal zijn"));
        }
        let time = frame / self.time_unit.frame_rate();
        let scene = self
            .scene
            .as_mut()
            .ok_or_else(|| js_error("er is geen scene geladen"))?;
        if self.evaluation_plan.is_none() {
            self.evaluation_plan = Some(EvaluationPlan::new(scene).map_err(to_js_error)?);
        }
        let plan = self
            .evaluation_plan
            .as_ref()
            .ok_or_else(|| js_error("evaluatieplan ontbreekt"))?;
        let result = evaluator::evaluate_with_plan(scene, plan, time).map_err(to_js_error)?;
        Ok(self.last_result.insert(result))
    }

    /// Laatst berekend evaluatieresultaat, indien aanwezig.
    #[must_use]
    pub fn last_result(&self) -> Option<&EvaluationResult> {
        self.last_result.as_ref()
    }

    #[must_use]
    pub fn scene_ref(&self) -> Option<&MemoryScene> {
        self.scene.as_ref()
    }

    fn scene(&self) -> Result<&MemoryScene, JsValue> {
        self.scene.as_ref().ok_or_else(|| js_error("er is geen scene geladen"))
    }

    fn scene_mut(&mut self) -> Result<&mut MemoryScene, JsValue> {
        self.scene.as_mut().ok_or_else(|| js_error("er is geen scene geladen"))
    }

    /// Zet de tijdseenheid en compileert alle rigs opnieuw. Mislukt dat voor
    /// een rig, dan krijgen de al bijgewerkte rigs de oude eenheid terug.
    fn apply_time_unit(&mut self, unit: TimeUnit) -> Result<(), JsValue> {
        let previous = self.time_unit;
        if unit == previous {
            return Ok(());
        }
        if let Some(scene) = self.scene.as_mut() {
            let mut done: Vec<String> = Vec::new();
            for name in rig::rig_names(&*scene) {
                if let Err(err) = rig::recompile_drivers(scene, &name, unit) {
                    for rig_name in &done {
                        if let Err(undo) = rig::recompile_drivers(scene, rig_name, previous) {
                            log::warn!("rig `{rig_name}` kon niet terug naar {previous}: {undo}");
                        }
                    }
                    return Err(to_js_error(err));
                }
                done.push(name);
            }
            if !done.is_empty() {
                log::info!("{} rigs opnieuw gecompileerd voor {unit}", done.len());
            }
        }
        self.time_unit = unit;
        self.invalidate();
        Ok(())
    }

    /// De scene-structuur is gewijzigd; het plan wordt bij de volgende
    /// evaluatie opnieuw opgebouwd.
    fn invalidate(&mut self) {
        self.evaluation_plan = None;
        self.last_result = None;
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        log::warn!("{message}");
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_requires_a_scene() {
        let mut engine = Engine::new();
        assert!(engine.is_initialized());
        assert!(engine.evaluate_frame(1.0).is_err());
        assert!(engine.formula_text("tail").is_err());
        assert!(engine.delete_rig("tail").is_err());
    }

    #[test]
    fn time_unit_is_parsed() {
        let mut engine = Engine::new();
        assert!(engine.set_time_unit("ntsc").is_ok());
        assert_eq!(engine.time_unit(), "ntsc");
        assert!(engine.set_time_unit("sometimes").is_err());
        assert_eq!(engine.time_unit(), "ntsc");
    }

    #[test]
    fn built_rig_uses_the_engine_time_unit() {
        let mut engine = Engine::new();
        engine
            .load_scene(
                r#"{"objects": [
                    {"name": "tail_01", "kind": "joint", "translate": [0, 0, 0], "rotate": [0, -90, 0]},
                    {"name": "tail_02", "kind": "joint", "parent": "tail_01", "translate": [0, 0, 1], "rotate": [0, -90, 0]},
                    {"name": "tail_03", "kind": "joint", "parent": "tail_02", "translate": [0, 0, 2], "rotate": [0, -90, 0]}
                ]}"#,
            )
            .expect("scene");
        engine.set_time_unit("ntsc").expect("ntsc");
        engine
            .build_from_preset(r#"{"0": ["tail_01", "tail_02", "tail_03"]}"#, r#"{"name": "tail"}"#)
            .expect("build");
        assert_eq!(engine.time_unit(), "ntsc");
        assert!(engine.formula_text("tail").expect("text").contains("offset_frame_X / 30 "));

        engine.set_time_unit("pal").expect("pal");
        assert_eq!(engine.time_unit(), "pal");
        let text = engine.formula_text("tail").expect("text");
        assert!(text.contains("offset_frame_X / 25 "), "{text}");
        assert!(!text.contains("offset_frame_X / 30 "));
    }

    #[test]
    fn empty_scene_evaluates() {
        let mut engine = Engine::new();
        engine.load_scene(r#"{"objects": []}"#).expect("scene");
        let result = engine.evaluate_frame(12.0).expect("evaluatie");
        assert!((result.time - 0.5).abs() < 1e-12);
        assert_eq!(result.expressions, 0);
    }
}
