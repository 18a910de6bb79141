//! Bridge to the host's dynamics subsystem.
//!
//! The host command that makes curves dynamic does not report what it made in
//! any dependable way. `SceneDiffDynamics` snapshots the scene around the call
//! and follows connections to find each input's anchor and output; the rest
//! of the rig only sees the `DynamicsPort` contract.

use std::collections::BTreeMap;

use ahash::AHashSet;
use dangle_ids::NodeID;
use dangle_scene::{AttrValue, NodeKind, Plug, SceneGraph, attrs};
use log::{debug, info, warn};

use crate::error::{RigError, RigResult};
use crate::naming::{NameAllocator, with_namespace};
use crate::organizer::safe_parent;

const CONTEXT_TYPE: &str = "hairSystem";
/// Name fragments of the groups the host files anchors and outputs under.
const CONTAINER_TAGS: [&str; 2] = ["Follicles", "OutputCurves"];

/// Curve handed to the dynamics subsystem, with the base name its results
/// are renamed after.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationInput {
    pub curve: NodeID,
    pub base: String,
    pub namespace: Option<String>,
}

/// One simulated input: its anchor (follicle) and dynamic output curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationPair {
    pub input: NodeID,
    pub anchor: NodeID,
    pub output: NodeID,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicsOutcome {
    /// Shared simulation context, new or reused.
    pub context: Option<NodeID>,
    /// At most one pair per input; inputs that failed are absent.
    pub pairs: Vec<SimulationPair>,
    /// Anchor and output containers created by this call.
    pub containers: Vec<NodeID>,
}

impl DynamicsOutcome {
    pub fn pair_for(&self, input: NodeID) -> Option<&SimulationPair> {
        self.pairs.iter().find(|p| p.input == input)
    }
}

/// N curves in, up to N `SimulationPair`s out, in one batched call.
pub trait DynamicsPort {
    fn make_dynamic(
        &mut self,
        scene: &mut dyn SceneGraph,
        inputs: &[NodeID],
        context: Option<NodeID>,
    ) -> DynamicsOutcome;
}

/// Runs the host's dynamics setup and diffs the scene around it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneDiffDynamics;

impl SceneDiffDynamics {
    fn contexts(scene: &dyn SceneGraph) -> Vec<NodeID> {
        scene.nodes_of_type(CONTEXT_TYPE)
    }

    fn containers(scene: &dyn SceneGraph) -> Vec<NodeID> {
        scene
            .node_ids()
            .into_iter()
            .filter(|id| {
                scene.node(*id).is_some_and(|n| {
                    n.kind.is_group() && CONTAINER_TAGS.iter().any(|tag| n.name.contains(tag))
                })
            })
            .collect()
    }

    fn is_follicle(scene: &dyn SceneGraph, id: NodeID) -> bool {
        scene
            .node(id)
            .is_some_and(|n| matches!(n.kind, NodeKind::Follicle))
    }

    /// Follicle fed by `input`, or failing that a follicle sibling of it that
    /// nothing else feeds.
    fn find_anchor(scene: &dyn SceneGraph, input: NodeID) -> Option<NodeID> {
        let direct = scene
            .outgoing(input)
            .into_iter()
            .map(|c| c.destination.node)
            .find(|id| Self::is_follicle(scene, *id));
        if direct.is_some() {
            return direct;
        }

        let parent = scene.parent_of(input)?;
        scene.children_of(parent).into_iter().find(|id| {
            Self::is_follicle(scene, *id)
                && scene
                    .source_of(&Plug::new(*id, attrs::START_POSITION))
                    .is_none_or(|src| src.node == input)
        })
    }

    fn find_output(scene: &dyn SceneGraph, anchor: NodeID) -> Option<NodeID> {
        scene
            .outgoing(anchor)
            .into_iter()
            .filter(|c| c.source.attr == attrs::OUT_CURVE)
            .map(|c| c.destination.node)
            .find(|id| {
                scene
                    .node(*id)
                    .is_some_and(|n| matches!(n.kind, NodeKind::Curve(_)))
            })
    }
}

impl DynamicsPort for SceneDiffDynamics {
    fn make_dynamic(
        &mut self,
        scene: &mut dyn SceneGraph,
        inputs: &[NodeID],
        context: Option<NodeID>,
    ) -> DynamicsOutcome {
        if inputs.is_empty() {
            return DynamicsOutcome::default();
        }

        let contexts_before: AHashSet<NodeID> = Self::contexts(scene).into_iter().collect();
        let containers_before: AHashSet<NodeID> = Self::containers(scene).into_iter().collect();

        let reported = scene.run_dynamics_setup(inputs, context);
        debug!("dynamics setup reported {} node(s), ignoring", reported.len());
        let scene: &dyn SceneGraph = scene;

        let new_context = Self::contexts(scene)
            .into_iter()
            .find(|id| !contexts_before.contains(id));
        let context = context.filter(|c| scene.contains(*c)).or(new_context);
        let containers = Self::containers(scene)
            .into_iter()
            .filter(|id| !containers_before.contains(id))
            .collect();

        let pairs = inputs
            .iter()
            .filter_map(|input| {
                let anchor = Self::find_anchor(scene, *input)?;
                let output = Self::find_output(scene, anchor)?;
                Some(SimulationPair {
                    input: *input,
                    anchor,
                    output,
                })
            })
            .collect();

        DynamicsOutcome {
            context,
            pairs,
            containers,
        }
    }
}

/// Duplicate a binding curve as `<base>_curve_dy_start`, the curve the
/// dynamics subsystem starts from.
pub fn prepare_simulation_input(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    curve: NodeID,
    base: &str,
    namespace: Option<&str>,
) -> RigResult<SimulationInput> {
    let copy = scene
        .duplicate(curve)?
        .first()
        .copied()
        .ok_or_else(|| RigError::resolution(base, "simulation input copy"))?;
    names.rename(scene, copy, &format!("{base}_curve_dy_start"), namespace);
    Ok(SimulationInput {
        curve: copy,
        base: base.to_string(),
        namespace: namespace.map(str::to_string),
    })
}

/// Write configured attributes onto the simulation context. Returns how many
/// were written.
pub fn apply_context_settings(
    scene: &mut dyn SceneGraph,
    context: NodeID,
    settings: &BTreeMap<String, AttrValue>,
) -> RigResult<usize> {
    for (attr, value) in settings {
        scene.set_attr(&Plug::new(context, attr.as_str()), value.clone())?;
    }
    Ok(settings.len())
}

/// Drives a `DynamicsPort` for one run: reuses or names the shared context,
/// locks anchors and gives results deterministic names.
pub struct DynamicsBridge<P: DynamicsPort> {
    port: P,
}

impl<P: DynamicsPort> DynamicsBridge<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Make every input dynamic in one call. Inputs that come back without
    /// an output get a `Resolution` error; everything else is renamed.
    pub fn run(
        &mut self,
        scene: &mut dyn SceneGraph,
        names: &mut NameAllocator,
        inputs: &[SimulationInput],
        prefix: &str,
        namespace: Option<&str>,
        root_group: Option<NodeID>,
    ) -> (DynamicsOutcome, Vec<RigError>) {
        if inputs.is_empty() {
            return (DynamicsOutcome::default(), Vec::new());
        }

        let context_base = format!("{prefix}_{CONTEXT_TYPE}");
        let existing = scene
            .find(&with_namespace(namespace, &context_base))
            .filter(|id| {
                scene
                    .node(*id)
                    .is_some_and(|n| n.kind.type_name() == CONTEXT_TYPE)
            });
        if let Some(existing) = existing {
            debug!("reusing simulation context {existing}");
        }

        let curves: Vec<NodeID> = inputs.iter().map(|i| i.curve).collect();
        let mut outcome = self.port.make_dynamic(scene, &curves, existing);

        match (existing, outcome.context) {
            (Some(_), _) => {}
            (None, Some(context)) => {
                let name = names.rename(scene, context, &context_base, namespace);
                info!("simulation context `{name}`");
            }
            (None, None) => warn!("dynamics subsystem produced no simulation context"),
        }
        if let Some(root) = root_group {
            for container in &outcome.containers {
                safe_parent(scene, *container, root);
            }
        }

        let mut errors = Vec::new();
        for input in inputs {
            let Some(pair) = outcome.pair_for(input.curve).copied() else {
                warn!("`{}`: no simulation output, static curve stays", input.base);
                errors.push(RigError::resolution(&input.base, "simulation output"));
                continue;
            };
            let ns = input.namespace.as_deref();
            if let Err(err) = scene.set_attr(
                &Plug::new(pair.anchor, attrs::POINT_LOCK),
                AttrValue::Int(1),
            ) {
                warn!("`{}`: could not lock anchor: {err}", input.base);
            }
            names.rename(scene, pair.anchor, &format!("{}_follicle", input.base), ns);
            names.rename(scene, pair.output, &format!("{}_curve_dy", input.base), ns);
        }

        outcome.context = existing.or(outcome.context);
        (outcome, errors)
    }
}
