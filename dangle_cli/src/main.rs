use dangle_ids::NodeID;
use dangle_rig::{CompositeStrategy, RigConfig, RunReport, SecondaryMotionRig, load_rig_toml};
use dangle_scene::{MemoryScene, NodeKind, SceneGraph};
use glam::Vec3;
use log::info;
use std::env;
use std::path::PathBuf;

const DEFAULT_CHAINS: usize = 2;
const DEFAULT_JOINTS: usize = 4;
const MAX_CHAINS: usize = 26;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if let Err(err) = run_command(&args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  dangle_cli [--chains <n>] [--joints <m>] [--config <rig.toml>]");
    eprintln!("             [--direct] [--weight <0..1>] [--prefix <name>] [--twice]");
    eprintln!();
    eprintln!("Builds <n> sibling joint chains of <m> joints in an in-memory scene,");
    eprintln!("rigs them and prints the resulting outline. --twice reruns the rig");
    eprintln!("on the same selection.");
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).cloned()
}

fn parse_count(args: &[String], flag: &str, default: usize) -> Result<usize, String> {
    match parse_flag_value(args, flag) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|err| format!("invalid value `{raw}` for {flag}: {err}")),
    }
}

fn build_config(args: &[String]) -> Result<RigConfig, String> {
    let mut config = match parse_flag_value(args, "--config") {
        Some(path) => {
            let path = PathBuf::from(path);
            load_rig_toml(&path)
                .map_err(|err| format!("failed to load rig config {}: {err}", path.display()))?
        }
        None => RigConfig::default(),
    };

    if let Some(prefix) = parse_flag_value(args, "--prefix") {
        config.prefix = Some(prefix);
    }
    if let Some(raw) = parse_flag_value(args, "--weight") {
        let weight = raw
            .parse::<f32>()
            .map_err(|err| format!("invalid value `{raw}` for --weight: {err}"))?;
        if !(0.0..=1.0).contains(&weight) {
            return Err(format!("--weight must be between 0 and 1, got {weight}"));
        }
        config.strategy = CompositeStrategy::Blend { weight };
    }
    if args.iter().any(|a| a == "--direct") {
        config.strategy = CompositeStrategy::Direct;
    }
    Ok(config)
}

/// `chains` sibling chains under a shared `hips` joint, named `tailA1`,
/// `tailB1` and so on.
fn build_scene(chains: usize, joints: usize) -> Result<(MemoryScene, Vec<NodeID>), String> {
    let mut scene = MemoryScene::new();
    let hips = scene
        .create_node("hips", NodeKind::Joint, None)
        .map_err(|err| format!("failed to create hips: {err}"))?;

    let mut roots = Vec::with_capacity(chains);
    for c in 0..chains {
        let letter = char::from(b'A' + c as u8);
        let names: Vec<String> = (1..=joints).map(|j| format!("tail{letter}{j}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let offset = c as f32 - (chains as f32 - 1.0) / 2.0;
        let chain = scene
            .add_joint_chain(&names, Some(hips), Vec3::new(offset, 0.0, 0.0), Vec3::NEG_Z)
            .map_err(|err| format!("failed to create chain {letter}: {err}"))?;
        roots.extend(chain.first().copied());
    }
    Ok((scene, roots))
}

fn print_report(pass: usize, scene: &MemoryScene, report: &RunReport) {
    println!("pass {pass}: prefix `{}`", report.prefix);
    for chain in &report.chains {
        let driver = chain
            .driver
            .and_then(|d| scene.name_of(d))
            .unwrap_or("<none>");
        let controls = chain.controls.as_ref().map_or(0, |c| c.len());
        println!(
            "  {}: {} working joint(s), driver `{driver}`, {controls} control(s)",
            chain.base,
            chain.working.chain.len()
        );
    }
    for err in &report.errors {
        println!("  error: {err}");
    }
}

fn describe_strategy(strategy: CompositeStrategy) -> String {
    match strategy {
        CompositeStrategy::Blend { weight } => {
            format!("{} (static curve weight {weight:.2})", strategy.label())
        }
        CompositeStrategy::Direct => strategy.label().to_string(),
    }
}

fn run_command(args: &[String]) -> Result<(), String> {
    let chains = parse_count(args, "--chains", DEFAULT_CHAINS)?;
    let joints = parse_count(args, "--joints", DEFAULT_JOINTS)?;
    if chains == 0 || chains > MAX_CHAINS {
        return Err(format!("--chains must be between 1 and {MAX_CHAINS}"));
    }
    let config = build_config(args)?;
    let passes = if args.iter().any(|a| a == "--twice") { 2 } else { 1 };

    let (mut scene, roots) = build_scene(chains, joints)?;
    let mut rig = SecondaryMotionRig::with_config(config);
    info!("rigging {chains} chain(s) of {joints} joint(s), {passes} pass(es)");
    println!("compositor: {}", describe_strategy(rig.config().strategy));

    let mut failed = 0;
    for pass in 1..=passes {
        let report = rig.run(&mut scene, &roots);
        print_report(pass, &scene, &report);
        failed += report.errors.len();
    }

    println!();
    print!("{}", scene.outline());
    println!(
        "{} node(s), {} undo chunk(s)",
        scene.len(),
        scene.undo_chunks_closed()
    );

    if failed > 0 {
        return Err(format!("rig finished with {failed} error(s)"));
    }
    Ok(())
}
