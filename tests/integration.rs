use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;

use sine_rig::Engine;
use sine_rig::geom::{Point3, Tolerance, Transform, Vec3};
use sine_rig::parse::Preset;
use sine_rig::rig::master::{axis_attr, is_wave_attribute};
use sine_rig::rig::naming::MAIN_SET_NAME;
use sine_rig::rig::{self, BuildRequest, ChainEntry, RigConfig, RigError, RigNames, TimeUnit};
use sine_rig::scene::node::{NodeData, NodeKind, NodeSpec};
use sine_rig::scene::value::Value;
use sine_rig::scene::{MemoryScene, SceneGraph};

/// Joints `{prefix}_01..` one unit apart along +Z at `x`, local X aimed
/// down the chain (or against it when `flipped`).
fn add_chain(scene: &mut MemoryScene, prefix: &str, count: usize, x: f64, flipped: bool) -> Vec<String> {
    let aim = if flipped {
        Transform::rotate_y(FRAC_PI_2)
    } else {
        Transform::rotate_y(-FRAC_PI_2)
    };
    let mut parent = None;
    let mut names = Vec::new();
    for i in 0..count {
        let name = format!("{prefix}_{:02}", i + 1);
        let matrix = Transform::translate(Vec3::new(x, 0.0, i as f64)).compose(aim);
        let id = scene
            .create_node(NodeSpec::new(&name, NodeKind::Joint).parent(parent).matrix(matrix))
            .expect("joint");
        parent = Some(id);
        names.push(name);
    }
    names
}

fn request(name: &str, chains: Vec<(usize, Vec<String>)>) -> BuildRequest {
    let chains: BTreeMap<usize, Vec<String>> = chains.into_iter().collect();
    BuildRequest::from_objects(&chains, RigConfig::new(name))
}

fn position(scene: &MemoryScene, name: &str) -> Point3 {
    let id = scene.find(name).unwrap_or_else(|| panic!("{name} missing"));
    scene.world_matrix(id).expect("world").position()
}

fn set_master(scene: &mut MemoryScene, rig_name: &str, values: &[(&str, f64)]) {
    let master = scene.find(&format!("Sine_{rig_name}_MCtl")).expect("master");
    for (attr, value) in values {
        scene
            .set_attribute(master, attr, Value::Number(*value))
            .expect("master attribute");
    }
}

#[test]
fn engine_initializes() {
    let engine = Engine::new();
    assert!(engine.is_initialized());
}

#[test]
fn four_aimed_joints_build_the_full_layout() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 4, 0.0, false);
    let report = rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("build");

    assert_eq!(report.chains.len(), 1);
    let chain = &report.chains[0];
    assert_eq!(chain.label, "A");
    assert_eq!(chain.joint_count, 4);
    assert!(!chain.negated);
    assert_eq!(chain.fk_controls.len(), 4);
    assert_eq!(chain.ik_controls.len(), 3);
    assert_eq!(chain.expression_joints.len(), 5);

    let tol = Tolerance::LOOSE;
    for i in 0..4 {
        let offset = position(&scene, &format!("Sine_tail_A_{i:02}_offset_jnt"));
        assert!(tol.approx_eq_point3(offset, Point3::new(0.0, 0.0, i as f64)), "{i}: {offset:?}");
    }
    let tip = position(&scene, "Sine_tail_A_04_offset_jnt_TIP");
    assert!(tol.approx_eq_point3(tip, Point3::new(0.0, 0.0, 4.0)), "{tip:?}");

    // IK controls at 0%, 50% and 100% of the curve.
    for (index, z) in [(0, 0.0), (1, 2.0), (2, 4.0)] {
        let control = position(&scene, &format!("Sine_tail_A_SIK_{index}_Ctl"));
        assert!(Tolerance::new(1e-2).approx_eq_point3(control, Point3::new(0.0, 0.0, z)), "{index}: {control:?}");
    }

    let master = scene.node(report.master).expect("master");
    assert_eq!(master.custom_attributes().count(), 48);
    let wave = master
        .custom_attributes()
        .filter(|attr| is_wave_attribute(&attr.spec.name))
        .count();
    assert_eq!(wave, 43);

    assert!(scene.exists("Sine_Grp"));
    assert!(scene.exists("Sine_Main_Set"));
    assert!(scene.exists("tail_04_tempCns"));
}

#[test]
fn flipped_chain_is_negated() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, true);
    let report = rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("build");
    assert!(report.chains[0].negated);

    // The tip still continues the chain.
    let tip = position(&scene, "Sine_tail_A_03_offset_jnt_TIP");
    assert!(Tolerance::LOOSE.approx_eq_point3(tip, Point3::new(0.0, 0.0, 3.0)), "{tip:?}");

    // FK box sits on the negative local X side.
    let control = scene.node(report.chains[0].fk_controls[0]).expect("control");
    let NodeData::Control(shape) = &control.data else {
        panic!("FK control without shape");
    };
    let points = &shape.curves[0];
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / points.len() as f64;
    assert!((mean_x + 0.5).abs() < 1e-9, "{mean_x}");
}

#[test]
fn objects_of_another_rig_are_rejected_without_changes() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    rig::build_rig(&mut scene, &request("first", vec![(0, tail.clone())])).expect("build");
    let nodes = scene.node_count();
    let wires = scene.wire_count();

    let err = rig::build_rig(&mut scene, &request("second", vec![(0, tail)])).unwrap_err();
    match err {
        RigError::AlreadyDriven { object, by } => {
            assert_eq!(object, "tail_01");
            assert_eq!(by, "first");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(scene.node_count(), nodes);
    assert_eq!(scene.wire_count(), wires);
    assert_eq!(rig::rig_names(&scene), vec!["first".to_owned()]);
}

#[test]
fn failed_build_leaves_the_scene_untouched() {
    let mut scene = MemoryScene::new();
    let head = add_chain(&mut scene, "head", 3, 8.0, false);
    rig::build_rig(&mut scene, &request("first", vec![(0, head)])).expect("first");

    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    let tail_03 = scene.find("tail_03").expect("tail_03");
    scene
        .set_attribute(tail_03, "scaleX", Value::Number(2.0))
        .expect("scale");
    // Sets resolve as driven objects but cannot be constrained.
    let mut fin = Vec::new();
    for i in 0..3 {
        let name = format!("fin_{:02}", i + 1);
        scene.create_set(&name).expect("set");
        let matrix = Transform::translate(Vec3::new(4.0, 0.0, f64::from(i))).compose(Transform::rotate_y(-FRAC_PI_2));
        fin.push(ChainEntry::fixed(name, matrix));
    }
    let mut request = request("second", vec![(0, tail)]);
    request.chains.insert(1, fin);

    let main_set = scene.find(MAIN_SET_NAME).expect("main set");
    let members = scene.set_members(main_set).expect("members");
    let nodes = scene.node_count();
    let wires = scene.wire_count();

    let err = rig::build_rig(&mut scene, &request).unwrap_err();
    assert!(matches!(err, RigError::Scene(_)), "{err}");
    assert_eq!(scene.node_count(), nodes);
    assert_eq!(scene.wire_count(), wires);
    assert_eq!(scene.get_attribute(tail_03, "scaleX").expect("scale").as_scalar(), Ok(2.0));
    assert!(scene.connections_to(tail_03).is_empty());
    assert_eq!(scene.set_members(main_set).expect("members"), members);
    assert_eq!(rig::rig_names(&scene), vec!["first".to_owned()]);
    assert!(scene.find("Sine_second_MCtl").is_none());
}

#[test]
fn taken_chain_name_rejects_the_build() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    let fin = add_chain(&mut scene, "fin", 3, 4.0, false);
    scene
        .create_node(NodeSpec::new("Sine_r_B", NodeKind::Transform))
        .expect("user node");
    let nodes = scene.node_count();

    let err = rig::build_rig(&mut scene, &request("r", vec![(0, tail), (1, fin)])).unwrap_err();
    assert!(matches!(&err, RigError::NameTaken(name) if name == "Sine_r_B"), "{err}");
    assert_eq!(scene.node_count(), nodes);
    assert_eq!(scene.wire_count(), 0);
    assert!(rig::rig_names(&scene).is_empty());
}

#[test]
fn derived_names_cover_every_built_node() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 4, 0.0, false);
    let report = rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("build");
    let ik_count = report.chains[0].ik_controls.len();

    let names = RigNames::new("tail");
    let mut expected = names.node_names();
    expected.extend(names.chain(0, 4).node_names(ik_count));
    for name in &expected {
        assert!(scene.exists(name), "{name} was not built");
    }
    // Plus one constraint per driven joint.
    assert_eq!(scene.owned_by("tail").len(), expected.len() + 4);
}

#[test]
fn rigs_are_isolated_and_delete_cleans_up() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    let fin = add_chain(&mut scene, "fin", 4, 5.0, false);
    let original = scene.node_count();

    rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("tail");
    let tail_text = rig::formula_text(&scene, "tail").expect("text");
    rig::build_rig(&mut scene, &request("fin", vec![(0, fin)])).expect("fin");
    assert_eq!(rig::rig_names(&scene), vec!["fin".to_owned(), "tail".to_owned()]);
    assert_eq!(rig::formula_text(&scene, "tail").expect("text"), tail_text);

    let removed = rig::delete_rig(&mut scene, "tail").expect("delete tail");
    assert!(removed > 0);
    assert!(scene.exists("Sine_Grp"));
    assert!(scene.exists("Sine_fin_MCtl"));
    assert!(!scene.exists("tail_01_tempCns"));
    assert_eq!(rig::rig_names(&scene), vec!["fin".to_owned()]);

    rig::delete_rig(&mut scene, "fin").expect("delete fin");
    assert!(!scene.exists("Sine_Grp"));
    assert!(!scene.exists("Sine_Main_Set"));
    assert_eq!(scene.node_count(), original);
    assert_eq!(scene.wire_count(), 0);
    assert!(matches!(rig::delete_rig(&mut scene, "fin"), Err(RigError::UnknownRig(_))));
}

#[test]
fn recompile_is_idempotent() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 4, 0.0, false);
    let ear = add_chain(&mut scene, "ear", 3, 4.0, false);
    rig::build_rig(&mut scene, &request("tail", vec![(0, tail), (2, ear)])).expect("build");
    let before = rig::formula_text(&scene, "tail").expect("text");
    let nodes = scene.node_count();

    let expressions = rig::recompile_drivers(&mut scene, "tail", TimeUnit::Film).expect("recompile");
    assert_eq!(expressions.len(), 2);
    assert_eq!(rig::formula_text(&scene, "tail").expect("text"), before);
    assert_eq!(scene.node_count(), nodes);

    rig::recompile_drivers(&mut scene, "tail", TimeUnit::Ntsc).expect("recompile");
    assert_ne!(rig::formula_text(&scene, "tail").expect("text"), before);
    assert!(matches!(
        rig::recompile_drivers(&mut scene, "nope", TimeUnit::Film),
        Err(RigError::UnknownRig(_))
    ));
}

#[test]
fn failed_recompile_keeps_the_old_drivers() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 4, 0.0, false);
    let ear = add_chain(&mut scene, "ear", 3, 4.0, false);
    rig::build_rig(&mut scene, &request("tail", vec![(0, tail), (2, ear)])).expect("build");
    let before = rig::formula_text(&scene, "tail").expect("text");
    let nodes = scene.node_count();
    let first = scene.find("Sine_tail_A_00_exp_jnt_exp").expect("first expression");
    let second = scene.find("Sine_tail_C_00_exp_jnt_exp").expect("second expression");

    let joint = scene.find("Sine_tail_C_00_exp_jnt").expect("joint");
    scene.lock_attribute(joint, "rotateX").expect("lock");
    let err = rig::recompile_drivers(&mut scene, "tail", TimeUnit::Ntsc).unwrap_err();
    assert!(matches!(err, RigError::Scene(_)), "{err}");

    assert_eq!(rig::formula_text(&scene, "tail").expect("text"), before);
    assert_eq!(scene.node_count(), nodes);
    assert_eq!(scene.find("Sine_tail_A_00_exp_jnt_exp"), Some(first));
    assert_eq!(scene.find("Sine_tail_C_00_exp_jnt_exp"), Some(second));
}

#[test]
fn evaluated_frame_follows_the_wave() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("build");
    set_master(
        &mut scene,
        "tail",
        &[(&axis_attr("loop_per_second", "X"), 1.0), (&axis_attr("amp", "X"), 1.0)],
    );

    // Four expression joints: attenuation (k+1)/8, taper 1 - (k+2)/8.
    let result = scene.evaluate(0.25).expect("evaluate");
    let root = result.written["Sine_tail_A_00_exp_jnt.rotateX"];
    assert!((root - 0.9375).abs() < 1e-9, "{root}");
    let third = result.written["Sine_tail_A_02_exp_jnt.rotateX"];
    assert!((third - 100.0 * (3.0 / 8.0) * (4.0 / 8.0) * 0.1).abs() < 1e-9, "{third}");
    assert!(result.written["Sine_tail_A_01_exp_jnt.rotateY"].abs() < 1e-12);

    // The IK multiplier scales the whole chain.
    let ik = scene.find("Sine_tail_A_SIK_0_Ctl").expect("ik control");
    scene
        .set_attribute(ik, "sine_multiplier_All", Value::Number(0.5))
        .expect("multiplier");
    let result = scene.evaluate(0.25).expect("evaluate");
    let root = result.written["Sine_tail_A_00_exp_jnt.rotateX"];
    assert!((root - 0.46875).abs() < 1e-9, "{root}");
}

#[test]
fn driven_objects_follow_the_final_joints() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "tail", 3, 0.0, false);
    rig::build_rig(&mut scene, &request("tail", vec![(0, tail)])).expect("build");
    set_master(
        &mut scene,
        "tail",
        &[(&axis_attr("loop_per_second", "Y"), 1.0), (&axis_attr("amp", "Y"), 50.0)],
    );

    let result = scene.evaluate(0.25).expect("evaluate");
    assert_eq!(result.constraints, 3);
    for i in 0..3 {
        let slave = position(&scene, &format!("tail_{:02}", i + 1));
        let driver = position(&scene, &format!("Sine_tail_A_{i:02}_jnt"));
        assert!(Tolerance::LOOSE.approx_eq_point3(slave, driver), "{i}: {slave:?} vs {driver:?}");
    }
    // The wave bends the chain, so the last object left the Z axis.
    let last = position(&scene, "tail_03");
    assert!(last.x.abs() > 1e-3, "{last:?}");
}

#[test]
fn preset_round_trips_through_a_rig() {
    let mut scene = MemoryScene::new();
    let tail = add_chain(&mut scene, "chr:tail", 3, 0.0, false);
    let ear = add_chain(&mut scene, "chr:ear", 2, 3.0, false);

    let preset = Preset::parse_str(r#"{"0": ["tail_01", "tail_02", "tail_03"], "3": ["chr:ear_01", "ear_02"]}"#)
        .expect("preset");
    let request = preset.to_request(&scene, RigConfig::new("chr")).expect("request");
    let report = rig::build_rig(&mut scene, &request).expect("build");
    assert_eq!(report.chains[1].label, "D");

    let exported = Preset::from_rig(&scene, "chr").expect("export");
    assert_eq!(exported.chains[&0], tail);
    assert_eq!(exported.chains[&3], ear);
    let text = exported.to_json_string().expect("json");
    assert_eq!(Preset::parse_str(&text).expect("again"), exported);
}

#[test]
fn engine_builds_evaluates_and_exports() {
    let document = r#"{
        "objects": [
            {"name": "tail_01", "kind": "joint", "translate": [0, 0, 0], "rotate": [0, -90, 0]},
            {"name": "tail_02", "kind": "joint", "parent": "tail_01", "translate": [0, 0, 1], "rotate": [0, -90, 0]},
            {"name": "tail_03", "kind": "joint", "parent": "tail_02", "translate": [0, 0, 2], "rotate": [0, -90, 0]},
            {"name": "tail_04", "kind": "joint", "parent": "tail_03", "translate": [0, 0, 3], "rotate": [0, -90, 0]}
        ]
    }"#;
    let mut engine = Engine::new();
    engine.load_scene(document).expect("scene");

    let config = r#"{"name": "tail", "fk_size": 1.0, "ik_size": 1.0, "ik_count": 3}"#;
    let report = engine
        .build_from_preset(r#"{"0": ["tail_01", "tail_02", "tail_03", "tail_04"]}"#, config)
        .expect("build");
    let report: serde_json::Value = serde_json::from_str(&report).expect("report json");
    assert_eq!(report["rig"], "tail");
    assert_eq!(report["chains"][0]["joints"], 4);
    assert_eq!(report["chains"][0]["ik_controls"], 3);

    engine
        .set_attribute("Sine_tail_MCtl", &axis_attr("loop_per_second", "X"), 1.0)
        .expect("lps");
    engine
        .set_attribute("Sine_tail_MCtl", &axis_attr("amp", "X"), 1.0)
        .expect("amp");
    assert!(engine.set_attribute("Sine_tail_MCtl", "amp_W", 1.0).is_err());

    // Film: frame 6 is a quarter second. Five expression joints, span 10.
    let result = engine.evaluate_frame(6.0).expect("evaluate");
    let root = result.written["Sine_tail_A_00_exp_jnt.rotateX"];
    assert!((root - 100.0 * 0.1 * 0.8 * 0.1).abs() < 1e-9, "{root}");

    assert_eq!(engine.recompile("tail").expect("recompile"), 1);
    let preset = engine.export_preset("tail").expect("export");
    assert_eq!(
        Preset::parse_str(&preset).expect("preset").chains[&0],
        vec!["tail_01", "tail_02", "tail_03", "tail_04"]
    );
    assert!(engine.formula_text("tail").expect("text").contains("Sine_tail_A_04_exp_jnt_TIP.rotateZ"));

    assert!(engine.delete_rig("tail").expect("delete") > 0);
    let scene = engine.scene_ref().expect("scene");
    assert!(rig::rig_names(scene).is_empty());
    assert_eq!(scene.node_count(), 4);
}
