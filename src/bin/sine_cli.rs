#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("sine_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::collections::BTreeMap;
    use std::f64::consts::FRAC_PI_2;
    use std::path::{Path, PathBuf};

    use sine_rig::geom::{Transform, Vec3};
    use sine_rig::parse::{Preset, SceneDocument};
    use sine_rig::rig::master::axis_attr;
    use sine_rig::rig::{self, BuildReport, BuildRequest, RigConfig, RigNames, TimeUnit};
    use sine_rig::scene::node::{NodeKind, NodeSpec};
    use sine_rig::scene::value::Value;
    use sine_rig::scene::{MemoryScene, SceneGraph};

    const USAGE: &str = r#"sine_cli (sine-rig)

USAGE:
  sine_cli demo [options]
  sine_cli build <scene.json> <preset.sineConfig> [options]

COMMANDS:
  demo     Build a rig on two synthetic chains and print the expression
           joint rotations per frame
  build    Load a JSON scene document, build a rig from a preset and print
           the build report

OPTIONS:
  --name <rig>       Rig name (default: demo)
  --fk-size <f>      FK control size (default: 1)
  --ik-size <f>      IK control size (default: 1)
  --ik-count <n>     IK controls per chain (default: 3)
  --time-unit <u>    film, ntsc, pal, ... or `<n> fps` (default: film)
  --frames <n>       Frames to evaluate (demo only, default: 8)
  --formula          Also print the compiled expressions
  --save-preset <p>  Write the built rig's driven objects as a .sineConfig
  -h, --help         Show this help
"#;

    struct Options {
        config: RigConfig,
        time_unit: TimeUnit,
        frames: u32,
        formula: bool,
        save_preset: Option<PathBuf>,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                config: RigConfig::new("demo"),
                time_unit: TimeUnit::default(),
                frames: 8,
                formula: false,
                save_preset: None,
            }
        }
    }

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "demo" => {
                let Some(options) = parse_options(&mut args)? else {
                    return Ok(());
                };
                cmd_demo(&options)
            }
            "build" => cmd_build(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    /// `None` when help was requested.
    fn parse_options(args: &mut Args) -> Result<Option<Options>, String> {
        let mut options = Options::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--name" => options.config.name = args.value("--name")?,
                "--fk-size" => options.config.fk_size = args.number("--fk-size")?,
                "--ik-size" => options.config.ik_size = args.number("--ik-size")?,
                "--ik-count" => options.config.ik_count = args.number("--ik-count")?,
                "--time-unit" => {
                    options.time_unit = args
                        .value("--time-unit")?
                        .parse()
                        .map_err(|err| format!("{err}"))?;
                }
                "--frames" => options.frames = args.number("--frames")?,
                "--formula" => options.formula = true,
                "--save-preset" => options.save_preset = Some(PathBuf::from(args.value("--save-preset")?)),
                "-h" | "--help" => {
                    print_usage();
                    return Ok(None);
                }
                other => return Err(format!("unknown option `{other}`")),
            }
        }
        Ok(Some(options))
    }

    fn cmd_build(args: &mut Args) -> Result<(), String> {
        let scene_path = PathBuf::from(args.value("<scene.json>")?);
        let preset_path = PathBuf::from(args.value("<preset.sineConfig>")?);
        let Some(options) = parse_options(args)? else {
            return Ok(());
        };

        let text = std::fs::read_to_string(&scene_path)
            .map_err(|err| format!("failed to read {}: {err}", scene_path.display()))?;
        let mut scene = SceneDocument::parse_str(&text)
            .and_then(|document| document.to_scene())
            .map_err(|err| format!("{}: {err}", scene_path.display()))?;
        let preset = Preset::load(&preset_path).map_err(|err| format!("{}: {err}", preset_path.display()))?;

        let mut request = preset
            .to_request(&scene, options.config)
            .map_err(|err| err.to_string())?;
        request.time_unit = options.time_unit;

        let report = rig::build_rig(&mut scene, &request).map_err(|err| err.to_string())?;
        print_report(&report)?;
        if options.formula {
            print!("{}", rig::formula_text(&scene, &report.rig).map_err(|err| err.to_string())?);
        }
        save_preset(&scene, &report.rig, options.save_preset.as_deref())
    }

    fn cmd_demo(options: &Options) -> Result<(), String> {
        let mut scene = MemoryScene::new();
        let chains = demo_chains(&mut scene)?;
        let mut request = BuildRequest::from_objects(&chains, options.config.clone());
        request.time_unit = options.time_unit;

        let report = rig::build_rig(&mut scene, &request).map_err(|err| err.to_string())?;
        print_report(&report)?;
        save_preset(&scene, &report.rig, options.save_preset.as_deref())?;
        animate_master(&mut scene, &report.rig)?;
        if options.formula {
            print!("{}", rig::formula_text(&scene, &report.rig).map_err(|err| err.to_string())?);
        }

        let frame_rate = options.time_unit.frame_rate();
        for frame in 0..options.frames {
            let time = f64::from(frame) / frame_rate;
            let result = scene.evaluate(time).map_err(|err| err.to_string())?;
            println!("frame {frame} (t={time:.4}s)");
            for chain in &report.chains {
                for &joint in &chain.expression_joints {
                    let name = scene.name_of(joint).map_err(|err| err.to_string())?;
                    let rotation = ["rotateX", "rotateY", "rotateZ"].map(|attr| {
                        result
                            .written
                            .get(&format!("{name}.{attr}"))
                            .copied()
                            .unwrap_or_default()
                    });
                    println!(
                        "  {name:<28} {:>9.4} {:>9.4} {:>9.4}",
                        rotation[0], rotation[1], rotation[2]
                    );
                }
            }
        }
        Ok(())
    }

    /// Two tails of four joints along +Z, each joint's X axis aimed down the chain.
    fn demo_chains(scene: &mut MemoryScene) -> Result<BTreeMap<usize, Vec<String>>, String> {
        let aim = Transform::rotate_y(-FRAC_PI_2);
        let mut chains = BTreeMap::new();
        for (index, x) in [(0usize, 0.0), (1, 3.0)] {
            let mut parent = None;
            let mut names = Vec::new();
            for joint in 0..4u32 {
                let name = format!("tail{index}_{:02}", joint + 1);
                let matrix = Transform::translate(Vec3::new(x, 0.0, f64::from(joint))).compose(aim);
                let id = scene
                    .create_node(NodeSpec::new(&name, NodeKind::Joint).parent(parent).matrix(matrix))
                    .map_err(|err| err.to_string())?;
                parent = Some(id);
                names.push(name);
            }
            chains.insert(index, names);
        }
        Ok(chains)
    }

    /// A one-loop-per-second wave on Y with some falloff, so the demo moves.
    fn animate_master(scene: &mut MemoryScene, rig_name: &str) -> Result<(), String> {
        let master_name = RigNames::new(rig_name).master_control();
        let master = scene
            .find(&master_name)
            .ok_or_else(|| format!("master control `{master_name}` not found"))?;
        for (param, value) in [("loop_per_second", 1.0), ("amp", 20.0), ("falloff", 2.0), ("delay", 0.5)] {
            scene
                .set_attribute(master, &axis_attr(param, "Y"), Value::Number(value))
                .map_err(|err| err.to_string())?;
        }
        Ok(())
    }

    fn save_preset(scene: &MemoryScene, rig_name: &str, path: Option<&Path>) -> Result<(), String> {
        let Some(path) = path else {
            return Ok(());
        };
        Preset::from_rig(scene, rig_name)
            .and_then(|preset| preset.save(path))
            .map_err(|err| format!("{}: {err}", path.display()))?;
        println!("preset written to {}", path.display());
        Ok(())
    }

    fn print_report(report: &BuildReport) -> Result<(), String> {
        let text = serde_json::to_string_pretty(&report.to_json()).map_err(|err| err.to_string())?;
        println!("{text}");
        Ok(())
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }

        fn number<T: std::str::FromStr>(&mut self, flag: &str) -> Result<T, String> {
            let value = self.value(flag)?;
            value
                .parse()
                .map_err(|_| format!("invalid number `{value}` for {flag}"))
        }
    }
}
