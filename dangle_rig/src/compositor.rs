use dangle_ids::NodeID;
use dangle_scene::{AttrValue, NodeKind, Plug, SceneGraph, attrs};
use log::debug;

use crate::error::RigResult;
use crate::naming::NameAllocator;

/// Weight of the static curve when blending. 0 means fully dynamic.
pub const DEFAULT_BLEND_WEIGHT: f32 = 0.0;

/// How a binding's `inCurve` is fed once the simulation exists.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompositeStrategy {
    /// Static curve at `weight`, simulation output at `1 - weight`.
    Blend { weight: f32 },
    /// Simulation output straight into the binding.
    Direct,
}

impl Default for CompositeStrategy {
    fn default() -> Self {
        Self::Blend {
            weight: DEFAULT_BLEND_WEIGHT,
        }
    }
}

impl CompositeStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Blend { .. } => "blend",
            Self::Direct => "direct",
        }
    }
}

fn source_node(scene: &dyn SceneGraph, destination: &Plug) -> Option<NodeID> {
    scene.source_of(destination).map(|p| p.node)
}

/// Blend node already feeding `handle` from exactly these two curves.
fn reusable_blend(
    scene: &dyn SceneGraph,
    current: Option<&Plug>,
    static_curve: NodeID,
    output: NodeID,
) -> Option<NodeID> {
    let blend = current?.node;
    let node = scene.node(blend)?;
    if !matches!(node.kind, NodeKind::BlendNode) {
        return None;
    }
    let fed_by_pair = source_node(scene, &Plug::new(blend, attrs::blend_input(0)))
        == Some(static_curve)
        && source_node(scene, &Plug::new(blend, attrs::blend_input(1))) == Some(output);
    fed_by_pair.then_some(blend)
}

fn set_weights(scene: &mut dyn SceneGraph, blend: NodeID, weight: f32) -> RigResult<()> {
    let weight = weight.clamp(0.0, 1.0);
    scene.set_attr(
        &Plug::new(blend, attrs::blend_weight(0)),
        AttrValue::from(weight),
    )?;
    scene.set_attr(
        &Plug::new(blend, attrs::blend_weight(1)),
        AttrValue::from(1.0 - weight),
    )?;
    Ok(())
}

/// Swap the source of `handle.inCurve`, touching no other connection.
fn feed_handle(scene: &mut dyn SceneGraph, handle: NodeID, source: Plug) -> RigResult<()> {
    let destination = Plug::new(handle, attrs::IN_CURVE);
    match scene.source_of(&destination) {
        Some(current) if current == source => return Ok(()),
        Some(current) => scene.disconnect(&current, &destination)?,
        None => {}
    }
    scene.connect(&source, &destination)?;
    Ok(())
}

/// A binding and the two curves that can drive it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeTarget {
    pub handle: NodeID,
    pub static_curve: NodeID,
    pub output: NodeID,
}

/// Point the handle at the simulated curve using `strategy`. Safe to call
/// again: only the handle's `inCurve` input is replaced, and a blend node
/// already wired to the same curves is reused. Returns the node that ends up
/// feeding the handle.
pub fn composite(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    target: CompositeTarget,
    base: &str,
    namespace: Option<&str>,
    parent: Option<NodeID>,
    strategy: CompositeStrategy,
) -> RigResult<NodeID> {
    let CompositeTarget {
        handle,
        static_curve,
        output,
    } = target;
    let current = scene.source_of(&Plug::new(handle, attrs::IN_CURVE));

    match strategy {
        CompositeStrategy::Direct => {
            feed_handle(scene, handle, Plug::new(output, attrs::WORLD_SPACE))?;
            debug!("`{base}`: binding reads the simulation output directly");
            Ok(output)
        }
        CompositeStrategy::Blend { weight } => {
            if let Some(blend) = reusable_blend(scene, current.as_ref(), static_curve, output) {
                set_weights(scene, blend, weight)?;
                return Ok(blend);
            }

            let name = names.unique_name(scene, &format!("{base}_blend"), namespace);
            let blend = scene.create_node(&name, NodeKind::BlendNode, parent)?;
            scene.connect(
                &Plug::new(static_curve, attrs::WORLD_SPACE),
                &Plug::new(blend, attrs::blend_input(0)),
            )?;
            scene.connect(
                &Plug::new(output, attrs::WORLD_SPACE),
                &Plug::new(blend, attrs::blend_input(1)),
            )?;
            set_weights(scene, blend, weight)?;
            feed_handle(scene, handle, Plug::new(blend, attrs::BLEND_OUTPUT))?;
            debug!("`{base}`: binding reads `{name}` at static weight {weight}");
            Ok(blend)
        }
    }
}
