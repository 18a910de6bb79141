use dangle_ids::NodeID;
use glam::{Mat4, Vec3};

use crate::attr::{AttrValue, Connection, Plug};
use crate::error::SceneResult;
use crate::node::{ConstraintSpec, NodeKind, SceneNode};

/// What the host hands back from `create_spline_handle`.
///
/// `curve` is whatever the host reported; some hosts leave it out even though
/// the curve exists and is wired into the handle's `inCurve`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplineHandleResult {
    pub handle: NodeID,
    pub curve: Option<NodeID>,
}

/// Command surface of the host scene graph.
///
/// Every rig stage goes through this trait; nothing reaches for process-wide
/// scene state. `MemoryScene` is the in-process implementation.
pub trait SceneGraph {
    // ---- queries ----

    fn node(&self, id: NodeID) -> Option<&SceneNode>;

    /// Look a node up by its full (`ns:short`) name.
    fn find(&self, name: &str) -> Option<NodeID>;

    /// All live node ids, in slot order.
    fn node_ids(&self) -> Vec<NodeID>;

    fn world_matrix(&self, id: NodeID) -> Option<Mat4>;

    fn attr(&self, plug: &Plug) -> Option<AttrValue>;

    /// Source plug feeding `destination`, if any.
    fn source_of(&self, destination: &Plug) -> Option<Plug>;

    /// Connections leaving any plug of `node`.
    fn outgoing(&self, node: NodeID) -> Vec<Connection>;

    // ---- mutation ----

    /// Create a node under `parent` (scene root when `None`). Fails if the
    /// name is taken.
    fn create_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeID>,
    ) -> SceneResult<NodeID>;

    /// Deep-copy the subtree rooted at `id` next to the original. Returns
    /// the clones in depth-first order, root first. The host picks the
    /// clones' names; constraint nodes are not copied.
    fn duplicate(&mut self, id: NodeID) -> SceneResult<Vec<NodeID>>;

    fn rename(&mut self, id: NodeID, name: &str) -> SceneResult<()>;

    /// Move `id` under `parent`, keeping its world transform.
    fn reparent(&mut self, id: NodeID, parent: Option<NodeID>) -> SceneResult<()>;

    /// Delete `id` and its subtree along with their connections.
    fn delete(&mut self, id: NodeID) -> SceneResult<()>;

    fn set_attr(&mut self, plug: &Plug, value: AttrValue) -> SceneResult<()>;

    fn set_world_matrix(&mut self, id: NodeID, world: Mat4) -> SceneResult<()>;

    /// Fails if `destination` already has a source.
    fn connect(&mut self, source: &Plug, destination: &Plug) -> SceneResult<()>;

    fn disconnect(&mut self, source: &Plug, destination: &Plug) -> SceneResult<()>;

    // ---- host commands ----

    /// Spline IK from `start` to `end`, auto-creating its curve.
    fn create_spline_handle(
        &mut self,
        name: &str,
        start: NodeID,
        end: NodeID,
    ) -> SceneResult<SplineHandleResult>;

    /// Cluster deformer on one control point of `curve`; returns its handle.
    fn create_cluster(&mut self, name: &str, curve: NodeID, point: usize) -> SceneResult<NodeID>;

    /// Constraint node, parented under `spec.driven`.
    fn create_constraint(&mut self, name: &str, spec: ConstraintSpec) -> SceneResult<NodeID>;

    /// Batched "make curves dynamic". Mutates the scene; the returned ids are
    /// not guaranteed to mean anything and callers should not rely on them.
    fn run_dynamics_setup(&mut self, curves: &[NodeID], context: Option<NodeID>) -> Vec<NodeID>;

    fn open_undo_chunk(&mut self);

    fn close_undo_chunk(&mut self);

    // ---- provided ----

    fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn contains(&self, id: NodeID) -> bool {
        self.node(id).is_some()
    }

    fn name_of(&self, id: NodeID) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    fn parent_of(&self, id: NodeID) -> Option<NodeID> {
        self.node(id)
            .map(|n| n.parent)
            .filter(|parent| !parent.is_nil())
    }

    fn children_of(&self, id: NodeID) -> Vec<NodeID> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn joint_children(&self, id: NodeID) -> Vec<NodeID> {
        self.children_of(id)
            .into_iter()
            .filter(|c| self.node(*c).is_some_and(|n| n.kind.is_joint()))
            .collect()
    }

    fn world_position(&self, id: NodeID) -> Option<Vec3> {
        self.world_matrix(id).map(|m| m.w_axis.truncate())
    }

    /// Constraint nodes whose driven node is `id`.
    fn constraints_driving(&self, id: NodeID) -> Vec<NodeID> {
        self.node_ids()
            .into_iter()
            .filter(|c| {
                self.node(*c)
                    .and_then(|n| n.kind.as_constraint())
                    .is_some_and(|spec| spec.driven == id)
            })
            .collect()
    }

    /// Ids of every live node of a given type name (`"hairSystem"`, ...).
    fn nodes_of_type(&self, type_name: &str) -> Vec<NodeID> {
        self.node_ids()
            .into_iter()
            .filter(|id| {
                self.node(*id)
                    .is_some_and(|n| n.kind.type_name() == type_name)
            })
            .collect()
    }
}
