use dangle_ids::NodeID;
use dangle_scene::SceneGraph;
use log::{error, info, warn};

use crate::binder::bind_links;
use crate::chain::{Chain, CrossLink, WorkingChain, cross_links, duplicate_chain, walk_chain};
use crate::compositor::{CompositeTarget, composite};
use crate::config::RigConfig;
use crate::controls::{ControlHierarchy, build_control_hierarchy, follow_parent};
use crate::dynamics::{
    DynamicsBridge, DynamicsPort, SceneDiffDynamics, SimulationInput, SimulationPair,
    apply_context_settings, prepare_simulation_input,
};
use crate::error::{RigError, RigResult, ValidationError};
use crate::naming::{NameAllocator, infer_prefix, namespace_of, short_name};
use crate::organizer::{SceneGroups, hide_helpers, safe_parent};
use crate::spline::{SplineBinding, create_spline_binding, setup_twist_reference};

const FALLBACK_PREFIX: &str = "sim";

/// What one selected chain ended up with. Stages that failed leave `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainRig {
    pub source_root: NodeID,
    pub base: String,
    pub working: WorkingChain,
    pub links: Vec<CrossLink>,
    pub binding: Option<SplineBinding>,
    pub sim_input: Option<NodeID>,
    pub simulation: Option<SimulationPair>,
    /// Node feeding the binding's `inCurve` after compositing.
    pub driver: Option<NodeID>,
    pub controls: Option<ControlHierarchy>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub prefix: String,
    pub chains: Vec<ChainRig>,
    pub context: Option<NodeID>,
    pub groups: Option<SceneGroups>,
    pub errors: Vec<RigError>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn validation_errors(&self) -> usize {
        self.errors.iter().filter(|e| e.is_validation()).count()
    }

    pub fn chain(&self, source_root: NodeID) -> Option<&ChainRig> {
        self.chains.iter().find(|c| c.source_root == source_root)
    }

    fn record(&mut self, err: RigError) {
        warn!("{err}");
        self.errors.push(err);
    }
}

/// A selected root that passed validation and has not been touched yet.
struct Candidate {
    root: NodeID,
    root_name: String,
    parent: Option<NodeID>,
    original: Chain,
}

/// Branched chains and chains shorter than two joints are rejected here,
/// before anything is created for them.
fn validate(scene: &dyn SceneGraph, root: NodeID) -> RigResult<Candidate> {
    let root_name = scene
        .name_of(root)
        .map(str::to_string)
        .ok_or(dangle_scene::SceneError::NodeNotFound(root))?;
    let original = walk_chain(scene, root).map_err(ValidationError::from)?;
    if original.len() < 2 {
        return Err(ValidationError::TooShort {
            chain: root_name,
            len: original.len(),
        }
        .into());
    }
    Ok(Candidate {
        root,
        root_name,
        parent: scene.parent_of(root),
        original,
    })
}

struct Selected {
    parent: Option<NodeID>,
    namespace: Option<String>,
    original: Chain,
    rig: ChainRig,
}

/// Secondary-motion rig generator: duplicates each selected chain, drives it
/// with a simulated spline and binds the original to the copy.
pub struct SecondaryMotionRig<P: DynamicsPort = SceneDiffDynamics> {
    config: RigConfig,
    bridge: DynamicsBridge<P>,
}

impl SecondaryMotionRig<SceneDiffDynamics> {
    pub fn with_config(config: RigConfig) -> Self {
        Self::new(config, SceneDiffDynamics)
    }
}

impl<P: DynamicsPort> SecondaryMotionRig<P> {
    pub fn new(config: RigConfig, port: P) -> Self {
        Self {
            config,
            bridge: DynamicsBridge::new(port),
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Rig every chain rooted at `roots`. Per-chain failures are collected
    /// in the report and never stop the others. All scene edits happen in
    /// one undo chunk, which is closed even when a stage bails out.
    pub fn run(&mut self, scene: &mut dyn SceneGraph, roots: &[NodeID]) -> RunReport {
        let mut report = RunReport::default();
        if roots.is_empty() {
            warn!("nothing selected, select one or more chain roots");
            return report;
        }

        let root_names: Vec<String> = roots
            .iter()
            .filter_map(|r| scene.name_of(*r).map(str::to_string))
            .collect();
        report.prefix = self
            .config
            .prefix
            .clone()
            .or_else(|| infer_prefix(&root_names))
            .unwrap_or_else(|| FALLBACK_PREFIX.to_string());
        info!("rigging {} chain(s) as `{}`", roots.len(), report.prefix);

        let mut candidates = Vec::new();
        for root in roots {
            match validate(scene, *root) {
                Ok(candidate) => candidates.push(candidate),
                Err(err) => report.record(err),
            }
        }
        if candidates.is_empty() {
            warn!("no usable chains in the selection");
            return report;
        }

        scene.open_undo_chunk();
        let mut names = NameAllocator::new();
        let mut selected = Vec::new();
        for candidate in candidates {
            match self.duplicate(scene, &mut names, candidate) {
                Ok(chain) => selected.push(chain),
                Err(err) => report.record(err),
            }
        }
        let namespace = root_names
            .first()
            .and_then(|n| namespace_of(n))
            .map(str::to_string);
        if !selected.is_empty() {
            let built = self.build(
                scene,
                &mut names,
                namespace.as_deref(),
                &mut selected,
                &mut report,
            );
            if let Err(err) = built {
                error!("rig build stopped early, partial state kept: {err}");
                report.errors.push(err);
            }
        }
        scene.close_undo_chunk();

        report.chains = selected.into_iter().map(|s| s.rig).collect();
        info!(
            "rigged {} chain(s) with {} error(s)",
            report.chains.len(),
            report.errors.len()
        );
        report
    }

    /// Duplicate a validated chain and link it to its copy.
    fn duplicate(
        &self,
        scene: &mut dyn SceneGraph,
        names: &mut NameAllocator,
        candidate: Candidate,
    ) -> RigResult<Selected> {
        let working = duplicate_chain(scene, names, candidate.root, &self.config.work_suffix)?;
        let links = cross_links(&candidate.original, &working.chain);
        Ok(Selected {
            parent: candidate.parent,
            namespace: namespace_of(&candidate.root_name).map(str::to_string),
            original: candidate.original,
            rig: ChainRig {
                source_root: candidate.root,
                base: short_name(&candidate.root_name).to_string(),
                working,
                links,
                binding: None,
                sim_input: None,
                simulation: None,
                driver: None,
                controls: None,
            },
        })
    }

    fn build(
        &mut self,
        scene: &mut dyn SceneGraph,
        names: &mut NameAllocator,
        namespace: Option<&str>,
        selected: &mut [Selected],
        report: &mut RunReport,
    ) -> RigResult<()> {
        let groups = SceneGroups::ensure(scene, &self.config.root_group, &report.prefix)?;
        report.groups = Some(groups);

        // working chains, spline bindings, simulation inputs
        let mut inputs = Vec::new();
        for chain in selected.iter_mut() {
            let ns = chain.namespace.as_deref();
            let rig = &mut chain.rig;
            if let Some(root) = rig.working.root() {
                safe_parent(scene, root, groups.work_joints);
            }

            let binding = match create_spline_binding(
                scene,
                names,
                &rig.working.chain,
                &rig.base,
                ns,
            ) {
                Ok(binding) => binding,
                Err(err) => {
                    report.record(err);
                    continue;
                }
            };
            safe_parent(scene, binding.handle, groups.bindings);
            safe_parent(scene, binding.curve, groups.curves);
            rig.binding = Some(binding);

            match prepare_simulation_input(scene, names, binding.curve, &rig.base, ns) {
                Ok(input) => {
                    safe_parent(scene, input.curve, groups.sim_inputs);
                    rig.sim_input = Some(input.curve);
                    inputs.push(input);
                }
                Err(err) => report.record(err),
            }
        }

        self.simulate(scene, names, namespace, &inputs, selected, &groups, report);

        // compositing, controls, binders
        for chain in selected.iter_mut() {
            let ns = chain.namespace.as_deref();
            let rig = &mut chain.rig;

            if let (Some(binding), Some(pair)) = (rig.binding, rig.simulation) {
                let target = CompositeTarget {
                    handle: binding.handle,
                    static_curve: binding.curve,
                    output: pair.output,
                };
                match composite(
                    scene,
                    names,
                    target,
                    &rig.base,
                    ns,
                    Some(groups.curves),
                    self.config.strategy,
                ) {
                    Ok(driver) => rig.driver = Some(driver),
                    Err(err) => report.record(err),
                }
            }

            if let Some(sim_input) = rig.sim_input {
                match build_control_hierarchy(
                    scene,
                    names,
                    sim_input,
                    &rig.base,
                    ns,
                    Some(groups.controls),
                ) {
                    Ok(controls) => rig.controls = Some(controls),
                    Err(err) => report.record(err),
                }
            }

            if self.config.twist_reference {
                let first = rig.controls.as_ref().and_then(|c| c.first()).copied();
                if let (Some(binding), Some(first)) = (rig.binding, first) {
                    if let Err(err) =
                        setup_twist_reference(scene, names, binding.handle, first.transform)
                    {
                        report.record(err);
                    }
                }
            }

            for err in bind_links(scene, names, &rig.links, self.config.binder) {
                report.record(err);
            }

            if self.config.follow_parent {
                if let (Some(parent), Some(controls)) = (chain.parent, rig.controls.as_ref()) {
                    if let Err(err) = follow_parent(scene, names, parent, controls.root_group) {
                        report.record(err);
                    }
                }
            }

            if rig.links.len() < chain.original.len() {
                warn!(
                    "`{}`: only {} of {} joints linked",
                    rig.base,
                    rig.links.len(),
                    chain.original.len()
                );
            }
        }

        hide_helpers(scene, &groups);
        Ok(())
    }

    /// The one batched dynamics call for every chain that got this far.
    #[allow(clippy::too_many_arguments)]
    fn simulate(
        &mut self,
        scene: &mut dyn SceneGraph,
        names: &mut NameAllocator,
        namespace: Option<&str>,
        inputs: &[SimulationInput],
        selected: &mut [Selected],
        groups: &SceneGroups,
        report: &mut RunReport,
    ) {
        if inputs.is_empty() {
            return;
        }

        let (outcome, errors) = self.bridge.run(
            scene,
            names,
            inputs,
            &report.prefix,
            namespace,
            Some(groups.root),
        );
        for err in errors {
            report.record(err);
        }
        report.context = outcome.context;

        if let Some(context) = outcome.context {
            if !self.config.context_settings.is_empty() {
                if let Err(err) =
                    apply_context_settings(scene, context, &self.config.context_settings)
                {
                    report.record(err);
                }
            }
        }

        for chain in selected.iter_mut() {
            let Some(pair) = chain.rig.sim_input.and_then(|i| outcome.pair_for(i)).copied() else {
                continue;
            };
            safe_parent(scene, pair.anchor, groups.anchors);
            safe_parent(scene, pair.output, groups.outputs);
            chain.rig.simulation = Some(pair);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dangle_scene::{MemoryScene, NodeKind, Plug, attrs};
    use glam::Vec3;

    fn chain(scene: &mut MemoryScene, names: &[&str], parent: Option<NodeID>) -> NodeID {
        scene
            .add_joint_chain(names, parent, Vec3::ZERO, Vec3::X)
            .unwrap()[0]
    }

    #[test]
    fn empty_selection_does_nothing() {
        let mut scene = MemoryScene::new();
        let report = SecondaryMotionRig::with_config(RigConfig::default()).run(&mut scene, &[]);
        assert!(report.is_clean());
        assert!(scene.is_empty());
        assert_eq!(scene.undo_chunks_closed(), 0);
    }

    #[test]
    fn branched_chain_generates_nothing() {
        let mut scene = MemoryScene::new();
        let root = chain(&mut scene, &["arm1", "arm2", "arm3"], None);
        let mid = scene.children_of(root)[0];
        scene.create_node("thumb", NodeKind::Joint, Some(mid)).unwrap();
        let before = scene.len();

        let report = SecondaryMotionRig::with_config(RigConfig::default()).run(&mut scene, &[root]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.validation_errors(), 1);
        assert_eq!(scene.len(), before);
    }

    #[test]
    fn short_chain_is_skipped_but_others_rig() {
        let mut scene = MemoryScene::new();
        let solo = chain(&mut scene, &["tip1"], None);
        let tail = chain(&mut scene, &["tail1", "tail2", "tail3"], None);

        let report =
            SecondaryMotionRig::with_config(RigConfig::default()).run(&mut scene, &[solo, tail]);
        assert_eq!(report.validation_errors(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.chains.len(), 1);
        assert_eq!(report.prefix, "tip");
        assert!(report.chain(tail).unwrap().driver.is_some());
        assert_eq!(scene.undo_chunks_closed(), 1);
        assert_eq!(scene.undo_depth(), 0);
    }

    #[test]
    fn dropped_simulation_keeps_static_curve() {
        let mut scene = MemoryScene::new();
        let a = chain(&mut scene, &["a1", "a2", "a3"], None);
        let b = chain(&mut scene, &["b1", "b2", "b3"], None);
        let mut rig = SecondaryMotionRig::new(RigConfig::default(), DropFirst(SceneDiffDynamics));

        let report = rig.run(&mut scene, &[a, b]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], RigError::Resolution { .. }));

        let rig_a = report.chain(a).unwrap();
        let binding = rig_a.binding.unwrap();
        assert!(rig_a.simulation.is_none());
        assert!(rig_a.driver.is_none());
        assert!(rig_a.controls.is_some());
        assert_eq!(
            scene.source_of(&Plug::new(binding.handle, attrs::IN_CURVE)),
            Some(Plug::new(binding.curve, attrs::WORLD_SPACE))
        );
        assert!(report.chain(b).unwrap().driver.is_some());
    }

    /// Loses whatever the host made for the first input.
    struct DropFirst(SceneDiffDynamics);

    impl DynamicsPort for DropFirst {
        fn make_dynamic(
            &mut self,
            scene: &mut dyn SceneGraph,
            inputs: &[NodeID],
            context: Option<NodeID>,
        ) -> crate::dynamics::DynamicsOutcome {
            let mut outcome = self.0.make_dynamic(scene, inputs, context);
            outcome.pairs.retain(|p| Some(&p.input) != inputs.first());
            outcome
        }
    }

    #[test]
    fn controls_follow_the_selection_parent() {
        let mut scene = MemoryScene::new();
        let hips = scene.create_node("hips", NodeKind::Joint, None).unwrap();
        let tail = chain(&mut scene, &["tail1", "tail2"], Some(hips));

        let report = SecondaryMotionRig::with_config(RigConfig::default()).run(&mut scene, &[tail]);
        assert!(report.is_clean(), "{:?}", report.errors);
        let controls = report.chain(tail).unwrap().controls.as_ref().unwrap();
        let follow = scene.constraints_driving(controls.root_group);
        assert_eq!(follow.len(), 1);
        assert_eq!(
            scene.node(follow[0]).unwrap().kind.as_constraint().unwrap().driver,
            hips
        );
    }

    #[test]
    fn direct_strategy_wires_output_into_binding() {
        let mut scene = MemoryScene::new();
        let tail = chain(&mut scene, &["tail1", "tail2", "tail3"], None);
        let config = RigConfig {
            strategy: crate::CompositeStrategy::Direct,
            twist_reference: false,
            ..RigConfig::default()
        };

        let report = SecondaryMotionRig::with_config(config).run(&mut scene, &[tail]);
        let rig = report.chain(tail).unwrap();
        let pair = rig.simulation.unwrap();
        assert_eq!(rig.driver, Some(pair.output));
        assert_eq!(
            scene.source_of(&Plug::new(rig.binding.unwrap().handle, attrs::IN_CURVE)),
            Some(Plug::new(pair.output, attrs::WORLD_SPACE))
        );
        assert!(scene.nodes_of_type("blendShape").is_empty());
        assert!(scene.find("tail1_start_con_curve_0_upBase").is_none());
    }
}
