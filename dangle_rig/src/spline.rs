use dangle_ids::NodeID;
use dangle_scene::{AttrValue, NodeKind, Plug, SceneError, SceneGraph, attrs};
use glam::{Mat4, Vec3};
use log::{debug, info};

use crate::chain::{Chain, walk_chain};
use crate::error::{RigError, RigResult, ValidationError};
use crate::naming::{NameAllocator, namespace_of, short_name};

/// Spline IK handle on a working chain and the curve driving it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplineBinding {
    pub handle: NodeID,
    pub curve: NodeID,
}

/// Spline IK from the chain's first to last joint, with a host-derived curve
/// renamed `<base>_curve`. The handle is `<root short name>_ikHandle`.
pub fn create_spline_binding(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    chain: &Chain,
    base: &str,
    namespace: Option<&str>,
) -> RigResult<SplineBinding> {
    let (Some(start), Some(end)) = (chain.root(), chain.leaf()) else {
        return Err(ValidationError::TooShort {
            chain: base.to_string(),
            len: 0,
        }
        .into());
    };
    if chain.len() < 2 {
        return Err(ValidationError::TooShort {
            chain: base.to_string(),
            len: chain.len(),
        }
        .into());
    }
    // The chain may have picked up joints since it was walked.
    walk_chain(scene, start).map_err(ValidationError::from)?;

    let root_name = scene.name_of(start).unwrap_or(base).to_string();
    let handle_name = names.unique_name(
        scene,
        &format!("{}_ikHandle", short_name(&root_name)),
        namespace_of(&root_name),
    );
    let result = scene.create_spline_handle(&handle_name, start, end)?;

    let curve = result
        .curve
        .or_else(|| curve_feeding(&*scene, result.handle))
        .ok_or_else(|| RigError::resolution(base, format!("curve of `{handle_name}`")))?;
    if result.curve.is_none() {
        debug!("`{handle_name}` did not report its curve, found it through inCurve");
    }

    let curve_name = names.rename(scene, curve, &format!("{base}_curve"), namespace);
    info!("bound `{base}` to `{curve_name}` through `{handle_name}`");
    Ok(SplineBinding {
        handle: result.handle,
        curve,
    })
}

fn curve_feeding(scene: &dyn SceneGraph, handle: NodeID) -> Option<NodeID> {
    let source = scene.source_of(&Plug::new(handle, attrs::IN_CURVE))?;
    scene
        .node(source.node)
        .filter(|n| matches!(n.kind, NodeKind::Curve(_)))
        .map(|n| n.id)
}

/// Object-up twist for `handle`: `<ctrl>_upBase` sits on `control`,
/// `<ctrl>_upRef` one unit above it along local +Y, and the handle takes its
/// up matrix from the reference. Returns `(up_base, up_ref)`.
pub fn setup_twist_reference(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    handle: NodeID,
    control: NodeID,
) -> RigResult<(NodeID, NodeID)> {
    let control_name = scene
        .name_of(control)
        .map(str::to_string)
        .ok_or(SceneError::NodeNotFound(control))?;
    if !scene.contains(handle) {
        return Err(SceneError::NodeNotFound(handle).into());
    }
    let ns = namespace_of(&control_name);
    let short = short_name(&control_name);

    let base_name = names.unique_name(scene, &format!("{short}_upBase"), ns);
    let up_base = scene.create_node(&base_name, NodeKind::Group, Some(control))?;
    let ref_name = names.unique_name(scene, &format!("{short}_upRef"), ns);
    let up_ref = scene.create_node(&ref_name, NodeKind::Group, Some(up_base))?;

    let base_world = scene.world_matrix(up_base).unwrap_or(Mat4::IDENTITY);
    scene.set_world_matrix(up_ref, base_world * Mat4::from_translation(Vec3::Y))?;

    scene.set_attr(
        &Plug::new(handle, attrs::TWIST_CONTROL_ENABLE),
        AttrValue::Bool(true),
    )?;
    // 1 = object up (start)
    scene.set_attr(&Plug::new(handle, attrs::WORLD_UP_TYPE), AttrValue::Int(1))?;

    let source = Plug::new(up_ref, attrs::WORLD_MATRIX);
    let destination = Plug::new(handle, attrs::WORLD_UP_MATRIX);
    match scene.source_of(&destination) {
        Some(existing) if existing == source => {}
        Some(existing) => {
            scene.disconnect(&existing, &destination)?;
            scene.connect(&source, &destination)?;
        }
        None => scene.connect(&source, &destination)?,
    }

    Ok((up_base, up_ref))
}
