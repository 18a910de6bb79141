use ahash::AHashSet;
use dangle_ids::NodeID;
use dangle_scene::{AttrValue, NodeKind, Plug, SceneError, SceneGraph, attrs};
use log::{debug, info, warn};

use crate::error::RigResult;

/// Reuse the group called `name` or create it, then make sure it sits under
/// `parent`. Calling it again with the same arguments changes nothing.
pub fn ensure_group(
    scene: &mut dyn SceneGraph,
    name: &str,
    parent: Option<NodeID>,
) -> RigResult<NodeID> {
    let existing = scene.find(name).filter(|id| {
        scene
            .node(*id)
            .is_some_and(|n| matches!(n.kind, NodeKind::Group | NodeKind::Transform))
    });
    let group = match existing {
        Some(id) => id,
        None => scene.create_node(name, NodeKind::Group, None)?,
    };
    if let Some(parent) = parent {
        safe_parent(scene, group, parent);
    }
    Ok(group)
}

/// Parent `child` under `parent` unless it already is. Host refusals are
/// logged, not raised. Returns whether `child` ends up under `parent`.
pub fn safe_parent(scene: &mut dyn SceneGraph, child: NodeID, parent: NodeID) -> bool {
    if !(scene.contains(child) && scene.contains(parent)) {
        return false;
    }
    if scene.parent_of(child) == Some(parent) {
        return true;
    }
    match scene.reparent(child, Some(parent)) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                "could not parent `{}` under `{}`: {err}",
                scene.name_of(child).unwrap_or_default(),
                scene.name_of(parent).unwrap_or_default()
            );
            false
        }
    }
}

/// Shared root group and the per-role subgroups of one prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneGroups {
    pub root: NodeID,
    pub work_joints: NodeID,
    pub curves: NodeID,
    pub anchors: NodeID,
    pub outputs: NodeID,
    pub bindings: NodeID,
    pub sim_inputs: NodeID,
    pub controls: NodeID,
}

impl SceneGroups {
    pub fn ensure(scene: &mut dyn SceneGraph, root_name: &str, prefix: &str) -> RigResult<Self> {
        let root = ensure_group(scene, root_name, None)?;
        let mut role =
            |suffix: &str| ensure_group(scene, &format!("{prefix}_{suffix}"), Some(root));
        Ok(Self {
            work_joints: role("workJoints_GP")?,
            curves: role("ik_curve_GP")?,
            anchors: role("follicle_GP")?,
            outputs: role("curve_dy_GP")?,
            bindings: role("ikHandle_GP")?,
            sim_inputs: role("dy_start_GP")?,
            controls: role("cluster_GP")?,
            root,
        })
    }

    pub fn roles(&self) -> [NodeID; 7] {
        [
            self.work_joints,
            self.curves,
            self.anchors,
            self.outputs,
            self.bindings,
            self.sim_inputs,
            self.controls,
        ]
    }

    /// Subgroups hidden after a run. Controls and simulation inputs stay.
    pub fn helpers(&self) -> [NodeID; 5] {
        [
            self.work_joints,
            self.curves,
            self.anchors,
            self.outputs,
            self.bindings,
        ]
    }
}

/// Hide every helper subgroup. Returns how many were hidden.
pub fn hide_helpers(scene: &mut dyn SceneGraph, groups: &SceneGroups) -> usize {
    groups
        .helpers()
        .into_iter()
        .filter(|group| {
            scene
                .set_attr(&Plug::new(*group, attrs::VISIBILITY), AttrValue::Bool(false))
                .inspect_err(|err| warn!("could not hide {group}: {err}"))
                .is_ok()
        })
        .count()
}

fn subtree(scene: &dyn SceneGraph, root: NodeID) -> Vec<NodeID> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if scene.contains(id) {
            out.push(id);
            stack.extend(scene.children_of(id));
        }
    }
    out
}

fn delete_counted(scene: &mut dyn SceneGraph, id: NodeID, deleted: &mut usize) -> RigResult<()> {
    match scene.delete(id) {
        Ok(()) => *deleted += 1,
        Err(SceneError::NodeNotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Delete a prefix's role subgroups with everything in them, plus every
/// constraint elsewhere whose driver lived inside them. `context` is the
/// prefix's simulation context and goes too, as do the emptied host
/// containers left under the root group. The root group goes once nothing
/// is left under it. Returns how many nodes were deleted directly.
pub fn teardown(
    scene: &mut dyn SceneGraph,
    groups: &SceneGroups,
    context: Option<NodeID>,
) -> RigResult<usize> {
    let owned: AHashSet<NodeID> = groups
        .roles()
        .into_iter()
        .flat_map(|group| subtree(&*scene, group))
        .collect();

    let stray_binders: Vec<NodeID> = scene
        .node_ids()
        .into_iter()
        .filter(|id| !owned.contains(id))
        .filter(|id| {
            scene
                .node(*id)
                .and_then(|n| n.kind.as_constraint())
                .is_some_and(|spec| owned.contains(&spec.driver))
        })
        .collect();

    let mut deleted = 0;
    for id in stray_binders.into_iter().chain(groups.roles()) {
        delete_counted(scene, id, &mut deleted)?;
    }

    let context = context.filter(|id| {
        scene
            .node(*id)
            .is_some_and(|n| matches!(n.kind, NodeKind::SimulationContext))
    });
    if let Some(context) = context {
        delete_counted(scene, context, &mut deleted)?;
    }

    let empty_containers: Vec<NodeID> = scene
        .children_of(groups.root)
        .into_iter()
        .filter(|id| {
            scene.node(*id).is_some_and(|n| n.kind.is_group() && n.children.is_empty())
        })
        .collect();
    for id in empty_containers {
        delete_counted(scene, id, &mut deleted)?;
    }

    if scene.contains(groups.root) && scene.children_of(groups.root).is_empty() {
        delete_counted(scene, groups.root, &mut deleted)?;
        debug!("removed empty root group");
    }
    info!("teardown removed {deleted} node(s)");
    Ok(deleted)
}
