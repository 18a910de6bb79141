use std::fmt::Write as _;

use ahash::{AHashMap, AHashSet};
use dangle_ids::NodeID;
use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::arena::NodeArena;
use crate::attr::{AttrValue, Connection, Plug, attrs};
use crate::error::{SceneError, SceneResult};
use crate::graph::{SceneGraph, SplineHandleResult};
use crate::node::{
    ClusterData, ConstraintSpec, CurveData, NodeKind, SceneNode, SplineHandleData,
};
use crate::transform::Transform3D;

/// In-memory host scene.
///
/// Names are unique scene-wide (namespace prefix included). Host commands
/// behave like a DCC application's: auto-created nodes get `stemN` names and
/// the dynamics command reports nothing useful about what it created.
pub struct MemoryScene {
    nodes: NodeArena,
    names: AHashMap<String, NodeID>,
    connections: Vec<Connection>,
    undo_depth: usize,
    undo_chunks_closed: usize,
    dynamics_calls: usize,
    dynamics_dropouts: AHashSet<NodeID>,
    report_spline_curves: bool,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            names: AHashMap::new(),
            connections: Vec::new(),
            undo_depth: 0,
            undo_chunks_closed: 0,
            dynamics_calls: 0,
            dynamics_dropouts: AHashSet::new(),
            report_spline_curves: true,
        }
    }

    /// Build an unbranched joint chain. The first joint sits at `origin`
    /// (local to `parent`), every following joint is offset by `step`.
    pub fn add_joint_chain(
        &mut self,
        names: &[&str],
        parent: Option<NodeID>,
        origin: Vec3,
        step: Vec3,
    ) -> SceneResult<Vec<NodeID>> {
        let mut ids = Vec::with_capacity(names.len());
        let mut parent = parent;
        for (i, name) in names.iter().enumerate() {
            let id = self.create_node(name, NodeKind::Joint, parent)?;
            let position = if i == 0 { origin } else { step };
            if let Some(node) = self.nodes.get_mut(id) {
                node.transform = Transform3D::from_position(position);
            }
            ids.push(id);
            parent = Some(id);
        }
        Ok(ids)
    }

    /// The next dynamics setup produces no follicle or output for `curve`.
    pub fn drop_dynamics_for(&mut self, curve: NodeID) {
        self.dynamics_dropouts.insert(curve);
    }

    /// When false, `create_spline_handle` leaves the curve out of its result.
    pub fn set_report_spline_curves(&mut self, report: bool) {
        self.report_spline_curves = report;
    }

    /// Locked nodes refuse new constraints.
    pub fn set_locked(&mut self, id: NodeID, locked: bool) -> SceneResult<()> {
        self.set_attr(&Plug::new(id, attrs::LOCKED), AttrValue::Bool(locked))
    }

    pub fn set_local_transform(&mut self, id: NodeID, transform: Transform3D) -> SceneResult<()> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        node.transform = transform;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_depth
    }

    pub fn undo_chunks_closed(&self) -> usize {
        self.undo_chunks_closed
    }

    pub fn dynamics_calls(&self) -> usize {
        self.dynamics_calls
    }

    /// Indented tree of the scene, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let roots: Vec<NodeID> = self
            .nodes
            .iter()
            .filter(|(_, n)| !n.has_parent())
            .map(|(id, _)| id)
            .collect();
        for root in roots {
            self.outline_node(root, 0, &mut out);
        }
        out
    }

    fn outline_node(&self, id: NodeID, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let hidden = if node.is_visible() { "" } else { " [hidden]" };
        let _ = writeln!(
            out,
            "{:indent$}{} ({}){}",
            "",
            node.name,
            node.kind.type_name(),
            hidden,
            indent = depth * 2
        );
        for child in &node.children {
            self.outline_node(*child, depth + 1, out);
        }
    }

    fn validate_name(name: &str) -> SceneResult<()> {
        let short = name.rsplit(':').next().unwrap_or(name);
        let valid = !short.is_empty()
            && !short.starts_with(|c: char| c.is_ascii_digit())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
        if valid {
            Ok(())
        } else {
            Err(SceneError::InvalidName(name.to_string()))
        }
    }

    /// `stemN` for the smallest free `N >= 1`.
    fn auto_name(&self, stem: &str) -> String {
        let mut n = 1usize;
        loop {
            let candidate = format!("{stem}{n}");
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Name for a duplicate: namespace kept, trailing digits bumped.
    fn provisional_name(&self, name: &str) -> String {
        let (ns, short) = match name.rsplit_once(':') {
            Some((ns, short)) => (Some(ns), short),
            None => (None, name),
        };
        let stem = short.trim_end_matches(|c: char| c.is_ascii_digit());
        let stem = if stem.is_empty() { short } else { stem };
        match ns {
            Some(ns) => self.auto_name(&format!("{ns}:{stem}")),
            None => self.auto_name(stem),
        }
    }

    fn insert_node(&mut self, node: SceneNode, parent: Option<NodeID>) -> SceneResult<NodeID> {
        Self::validate_name(&node.name)?;
        if self.names.contains_key(&node.name) {
            return Err(SceneError::NameTaken(node.name));
        }
        if let Some(parent) = parent {
            if !self.nodes.contains(parent) {
                return Err(SceneError::NodeNotFound(parent));
            }
        }

        let name = node.name.clone();
        let id = self.nodes.insert(node);
        self.names.insert(name, id);
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        Ok(id)
    }

    fn attach(&mut self, child: NodeID, parent: NodeID) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.add_child(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = parent;
        }
    }

    fn detach(&mut self, child: NodeID) {
        let Some(parent) = self.parent_of(child) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.remove_child(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = NodeID::nil();
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeID, mut id: NodeID) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent_of(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Depth-first ids of the subtree at `id`, root first.
    fn subtree(&self, id: NodeID, skip_constraints: bool) -> Vec<NodeID> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if skip_constraints && current != id && node.kind.as_constraint().is_some() {
                continue;
            }
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    fn parent_world(&self, id: NodeID) -> Mat4 {
        self.parent_of(id)
            .and_then(|p| self.world_matrix(p))
            .unwrap_or(Mat4::IDENTITY)
    }

    fn label(&self, plug: &Plug) -> String {
        match self.name_of(plug.node) {
            Some(name) => format!("{name}.{}", plug.attr),
            None => plug.to_string(),
        }
    }

    fn find_or_create_group(&mut self, name: &str) -> SceneResult<NodeID> {
        match self.find(name) {
            Some(id) => Ok(id),
            None => self.create_node(name, NodeKind::Group, None),
        }
    }

    fn next_input_hair_index(&self, context: NodeID) -> usize {
        self.connections
            .iter()
            .filter(|c| {
                c.destination.node == context && c.destination.attr.starts_with("inputHair[")
            })
            .count()
    }

    fn world_points(&self, curve: NodeID) -> Option<Vec<Vec3>> {
        let node = self.nodes.get(curve)?;
        let data = node.kind.as_curve()?;
        let world = self.world_matrix(curve)?;
        Some(data.points.iter().map(|p| world.transform_point3(*p)).collect())
    }

    fn make_one_dynamic(
        &mut self,
        curve: NodeID,
        context: NodeID,
        follicles: NodeID,
        outputs: NodeID,
    ) -> SceneResult<NodeID> {
        let points = self
            .world_points(curve)
            .ok_or_else(|| SceneError::InvalidOperation(format!("{curve} is not a curve")))?;

        let follicle_name = self.auto_name("follicle");
        let follicle = self.create_node(&follicle_name, NodeKind::Follicle, Some(follicles))?;
        self.set_attr(&Plug::new(follicle, attrs::POINT_LOCK), AttrValue::Int(3))?;

        let output_name = self.auto_name("curve");
        let output = self.create_node(
            &output_name,
            NodeKind::Curve(CurveData::new(points)),
            Some(outputs),
        )?;

        let index = self.next_input_hair_index(context);
        self.connect(
            &Plug::new(curve, attrs::WORLD_SPACE),
            &Plug::new(follicle, attrs::START_POSITION),
        )?;
        self.connect(
            &Plug::new(follicle, attrs::OUT_HAIR),
            &Plug::new(context, attrs::input_hair(index)),
        )?;
        self.connect(
            &Plug::new(follicle, attrs::OUT_CURVE),
            &Plug::new(output, attrs::CREATE),
        )?;
        Ok(follicle)
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for MemoryScene {
    fn node(&self, id: NodeID) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    fn find(&self, name: &str) -> Option<NodeID> {
        self.names.get(name).copied()
    }

    fn node_ids(&self) -> Vec<NodeID> {
        self.nodes.ids().collect()
    }

    fn world_matrix(&self, id: NodeID) -> Option<Mat4> {
        let node = self.nodes.get(id)?;
        let local = node.transform.to_mat4();
        if node.has_parent() {
            Some(self.world_matrix(node.parent)? * local)
        } else {
            Some(local)
        }
    }

    fn attr(&self, plug: &Plug) -> Option<AttrValue> {
        self.nodes.get(plug.node)?.attr(&plug.attr).cloned()
    }

    fn source_of(&self, destination: &Plug) -> Option<Plug> {
        self.connections
            .iter()
            .find(|c| &c.destination == destination)
            .map(|c| c.source.clone())
    }

    fn outgoing(&self, node: NodeID) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.source.node == node)
            .cloned()
            .collect()
    }

    fn create_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeID>,
    ) -> SceneResult<NodeID> {
        self.insert_node(SceneNode::new(name, kind), parent)
    }

    fn duplicate(&mut self, id: NodeID) -> SceneResult<Vec<NodeID>> {
        if !self.nodes.contains(id) {
            return Err(SceneError::NodeNotFound(id));
        }

        let originals = self.subtree(id, true);
        let mut mapping: AHashMap<NodeID, NodeID> = AHashMap::new();
        let mut clones = Vec::with_capacity(originals.len());

        for original in originals {
            let Some(source) = self.nodes.get(original).cloned() else {
                continue;
            };
            let parent = if original == id {
                self.parent_of(original)
            } else {
                mapping.get(&source.parent).copied()
            };

            let mut copy = SceneNode::new(self.provisional_name(&source.name), source.kind);
            copy.transform = source.transform;
            copy.attributes = source.attributes;

            let clone = self.insert_node(copy, parent)?;
            mapping.insert(original, clone);
            clones.push(clone);
        }

        debug!("duplicated {} node(s) from {}", clones.len(), id);
        Ok(clones)
    }

    fn rename(&mut self, id: NodeID, name: &str) -> SceneResult<()> {
        let current = self
            .nodes
            .get(id)
            .map(|n| n.name.clone())
            .ok_or(SceneError::NodeNotFound(id))?;
        if current == name {
            return Ok(());
        }
        Self::validate_name(name)?;
        if self.names.contains_key(name) {
            return Err(SceneError::NameTaken(name.to_string()));
        }

        self.names.remove(&current);
        self.names.insert(name.to_string(), id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.name = name.to_string();
        }
        Ok(())
    }

    fn reparent(&mut self, id: NodeID, parent: Option<NodeID>) -> SceneResult<()> {
        if !self.nodes.contains(id) {
            return Err(SceneError::NodeNotFound(id));
        }
        if self.parent_of(id) == parent {
            return Ok(());
        }
        if let Some(parent) = parent {
            if !self.nodes.contains(parent) {
                return Err(SceneError::NodeNotFound(parent));
            }
            if self.is_ancestor_or_self(id, parent) {
                return Err(SceneError::Cycle { child: id, parent });
            }
        }

        let world = self.world_matrix(id).unwrap_or(Mat4::IDENTITY);
        self.detach(id);
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        let local = self.parent_world(id).inverse() * world;
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform = Transform3D::from_mat4(local);
        }
        Ok(())
    }

    fn delete(&mut self, id: NodeID) -> SceneResult<()> {
        if !self.nodes.contains(id) {
            return Err(SceneError::NodeNotFound(id));
        }

        let doomed: AHashSet<NodeID> = self.subtree(id, false).into_iter().collect();
        self.detach(id);
        self.connections
            .retain(|c| !doomed.contains(&c.source.node) && !doomed.contains(&c.destination.node));
        for node_id in &doomed {
            if let Some(node) = self.nodes.remove(*node_id) {
                self.names.remove(&node.name);
            }
        }
        Ok(())
    }

    fn set_attr(&mut self, plug: &Plug, value: AttrValue) -> SceneResult<()> {
        let node = self
            .nodes
            .get_mut(plug.node)
            .ok_or(SceneError::NodeNotFound(plug.node))?;
        node.attributes.insert(plug.attr.clone(), value);
        Ok(())
    }

    fn set_world_matrix(&mut self, id: NodeID, world: Mat4) -> SceneResult<()> {
        if !self.nodes.contains(id) {
            return Err(SceneError::NodeNotFound(id));
        }
        let local = self.parent_world(id).inverse() * world;
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform = Transform3D::from_mat4(local);
        }
        Ok(())
    }

    fn connect(&mut self, source: &Plug, destination: &Plug) -> SceneResult<()> {
        for plug in [source, destination] {
            if !self.nodes.contains(plug.node) {
                return Err(SceneError::NodeNotFound(plug.node));
            }
        }
        if self.source_of(destination).is_some() {
            return Err(SceneError::AlreadyConnected(self.label(destination)));
        }
        self.connections.push(Connection {
            source: source.clone(),
            destination: destination.clone(),
        });
        Ok(())
    }

    fn disconnect(&mut self, source: &Plug, destination: &Plug) -> SceneResult<()> {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(&c.source == source && &c.destination == destination));
        if self.connections.len() == before {
            return Err(SceneError::NotConnected {
                from: self.label(source),
                to: self.label(destination),
            });
        }
        Ok(())
    }

    fn create_spline_handle(
        &mut self,
        name: &str,
        start: NodeID,
        end: NodeID,
    ) -> SceneResult<SplineHandleResult> {
        for id in [start, end] {
            if !self.nodes.contains(id) {
                return Err(SceneError::NodeNotFound(id));
            }
        }

        let mut chain = vec![start];
        let mut current = start;
        while current != end {
            let children = self.joint_children(current);
            match children.as_slice() {
                [next] => {
                    current = *next;
                    chain.push(current);
                }
                [] => {
                    return Err(SceneError::InvalidOperation(format!(
                        "{end} is not below {start} in a single chain"
                    )));
                }
                _ => {
                    return Err(SceneError::InvalidOperation(format!(
                        "chain branches at {current}"
                    )));
                }
            }
        }
        if chain.len() < 2 {
            return Err(SceneError::InvalidOperation(
                "spline handle needs at least two joints".to_string(),
            ));
        }

        let points: Vec<Vec3> = chain
            .iter()
            .filter_map(|id| self.world_position(*id))
            .collect();
        let handle_position = points.first().copied().unwrap_or(Vec3::ZERO);

        let handle = self.insert_node(
            SceneNode::new(name, NodeKind::SplineHandle(SplineHandleData { start, end }))
                .with_transform(Transform3D::from_position(handle_position)),
            None,
        )?;
        let curve_name = self.auto_name("curve");
        let curve = self.create_node(&curve_name, NodeKind::Curve(CurveData::new(points)), None)?;
        self.connect(
            &Plug::new(curve, attrs::WORLD_SPACE),
            &Plug::new(handle, attrs::IN_CURVE),
        )?;

        Ok(SplineHandleResult {
            handle,
            curve: self.report_spline_curves.then_some(curve),
        })
    }

    fn create_cluster(&mut self, name: &str, curve: NodeID, point: usize) -> SceneResult<NodeID> {
        let points = self
            .world_points(curve)
            .ok_or_else(|| SceneError::InvalidOperation(format!("{curve} is not a curve")))?;
        let position = points.get(point).copied().ok_or_else(|| {
            SceneError::InvalidOperation(format!("curve {curve} has no control point {point}"))
        })?;

        self.insert_node(
            SceneNode::new(name, NodeKind::Cluster(ClusterData { curve, point }))
                .with_transform(Transform3D::from_position(position)),
            None,
        )
    }

    fn create_constraint(&mut self, name: &str, spec: ConstraintSpec) -> SceneResult<NodeID> {
        for id in [spec.driver, spec.driven] {
            if !self.nodes.contains(id) {
                return Err(SceneError::NodeNotFound(id));
            }
        }
        if spec.driver == spec.driven {
            return Err(SceneError::InvalidOperation(format!(
                "{} cannot constrain itself",
                spec.driven
            )));
        }
        if let Some(driven) = self.nodes.get(spec.driven) {
            if driven.is_locked() {
                return Err(SceneError::Locked(driven.name.clone()));
            }
        }

        self.insert_node(
            SceneNode::new(name, NodeKind::Constraint(spec)),
            Some(spec.driven),
        )
    }

    fn run_dynamics_setup(&mut self, curves: &[NodeID], context: Option<NodeID>) -> Vec<NodeID> {
        self.dynamics_calls += 1;

        let existing = context.filter(|c| {
            self.nodes
                .get(*c)
                .is_some_and(|n| matches!(n.kind, NodeKind::SimulationContext))
        });
        let context = match existing {
            Some(c) => c,
            None => {
                let name = self.auto_name("hairSystem");
                match self.create_node(&name, NodeKind::SimulationContext, None) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!("dynamics setup could not create a context: {err}");
                        return Vec::new();
                    }
                }
            }
        };

        // Containers are named after the context as it was when first made.
        let stem = self
            .attr(&Plug::new(context, "containerStem"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| self.name_of(context).unwrap_or("hairSystem").to_string());
        let _ = self.set_attr(&Plug::new(context, "containerStem"), AttrValue::Str(stem.clone()));

        let follicles = self.find_or_create_group(&format!("{stem}Follicles"));
        let outputs = self.find_or_create_group(&format!("{stem}OutputCurves"));
        let (follicles, outputs) = match (follicles, outputs) {
            (Ok(f), Ok(o)) => (f, o),
            (Err(err), _) | (_, Err(err)) => {
                warn!("dynamics setup could not create containers: {err}");
                return vec![context];
            }
        };

        for curve in curves {
            if self.dynamics_dropouts.contains(curve) {
                debug!("dynamics setup skipped {curve}");
                continue;
            }
            if let Err(err) = self.make_one_dynamic(*curve, context, follicles, outputs) {
                warn!("dynamics setup failed for {curve}: {err}");
            }
        }

        vec![context]
    }

    fn open_undo_chunk(&mut self) {
        self.undo_depth += 1;
    }

    fn close_undo_chunk(&mut self) {
        if self.undo_depth == 0 {
            warn!("close_undo_chunk without a matching open");
            return;
        }
        self.undo_depth -= 1;
        self.undo_chunks_closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstraintKind;

    fn chain(scene: &mut MemoryScene, names: &[&str]) -> Vec<NodeID> {
        scene
            .add_joint_chain(names, None, Vec3::ZERO, Vec3::X)
            .unwrap()
    }

    #[test]
    fn names_are_unique() {
        let mut scene = MemoryScene::new();
        scene.create_node("a", NodeKind::Group, None).unwrap();
        assert_eq!(
            scene.create_node("a", NodeKind::Group, None),
            Err(SceneError::NameTaken("a".to_string()))
        );
        assert!(matches!(
            scene.create_node("bad name", NodeKind::Group, None),
            Err(SceneError::InvalidName(_))
        ));
    }

    #[test]
    fn world_positions_accumulate_down_the_chain() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2", "j3"]);
        assert_eq!(scene.world_position(ids[2]), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn reparent_keeps_world_transform() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2"]);
        let group = scene.create_node("grp", NodeKind::Group, None).unwrap();
        scene
            .set_local_transform(group, Transform3D::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();

        scene.reparent(ids[1], Some(group)).unwrap();
        let world = scene.world_position(ids[1]).unwrap();
        assert!(world.abs_diff_eq(Vec3::X, 1e-5));
        assert_eq!(scene.parent_of(ids[1]), Some(group));
        assert!(scene.children_of(ids[0]).is_empty());
    }

    #[test]
    fn reparent_refuses_cycles() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2"]);
        assert!(matches!(
            scene.reparent(ids[0], Some(ids[1])),
            Err(SceneError::Cycle { .. })
        ));
    }

    #[test]
    fn duplicate_copies_subtree_with_provisional_names() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["ns:tail1", "ns:tail2"]);
        let clones = scene.duplicate(ids[0]).unwrap();

        assert_eq!(clones.len(), 2);
        assert_eq!(scene.name_of(clones[0]), Some("ns:tail3"));
        assert_eq!(scene.parent_of(clones[1]), Some(clones[0]));
        assert_eq!(
            scene.node(clones[1]).unwrap().transform,
            scene.node(ids[1]).unwrap().transform
        );
    }

    #[test]
    fn duplicate_skips_constraints() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["a1", "a2"]);
        let driver = scene.create_node("drv", NodeKind::Transform, None).unwrap();
        scene
            .create_constraint(
                "a2_pointConstraint1",
                ConstraintSpec::new(ConstraintKind::Position, driver, ids[1]),
            )
            .unwrap();

        let clones = scene.duplicate(ids[0]).unwrap();
        assert_eq!(clones.len(), 2);
    }

    #[test]
    fn delete_drops_subtree_and_connections() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2", "j3"]);
        let result = scene.create_spline_handle("ik", ids[0], ids[2]).unwrap();
        let curve = result.curve.unwrap();
        scene.delete(curve).unwrap();

        assert!(scene.node(curve).is_none());
        assert!(scene.source_of(&Plug::new(result.handle, attrs::IN_CURVE)).is_none());
        assert!(scene.outgoing(curve).is_empty());
        assert!(!scene.exists("curve1"));
    }

    #[test]
    fn connect_allows_one_source_per_destination() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("a", NodeKind::BlendNode, None).unwrap();
        let b = scene.create_node("b", NodeKind::BlendNode, None).unwrap();
        let dst = Plug::new(b, "in");
        scene.connect(&Plug::new(a, "out"), &dst).unwrap();
        assert!(matches!(
            scene.connect(&Plug::new(a, "other"), &dst),
            Err(SceneError::AlreadyConnected(_))
        ));
        scene.disconnect(&Plug::new(a, "out"), &dst).unwrap();
        assert!(scene.source_of(&dst).is_none());
        assert!(matches!(
            scene.disconnect(&Plug::new(a, "out"), &dst),
            Err(SceneError::NotConnected { .. })
        ));
    }

    #[test]
    fn spline_handle_curve_has_a_point_per_joint() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2", "j3", "j4"]);
        let result = scene.create_spline_handle("ik", ids[0], ids[3]).unwrap();
        let curve = result.curve.unwrap();
        let data = scene.node(curve).unwrap().kind.as_curve().unwrap().clone();

        assert_eq!(data.len(), 4);
        assert_eq!(data.points[3], Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(
            scene.source_of(&Plug::new(result.handle, attrs::IN_CURVE)),
            Some(Plug::new(curve, attrs::WORLD_SPACE))
        );
    }

    #[test]
    fn spline_handle_can_hide_its_curve() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2"]);
        scene.set_report_spline_curves(false);
        let result = scene.create_spline_handle("ik", ids[0], ids[1]).unwrap();
        assert!(result.curve.is_none());
        assert!(scene.source_of(&Plug::new(result.handle, attrs::IN_CURVE)).is_some());
    }

    #[test]
    fn spline_handle_rejects_branches() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2", "j3"]);
        scene.create_node("side", NodeKind::Joint, Some(ids[1])).unwrap();
        assert!(matches!(
            scene.create_spline_handle("ik", ids[0], ids[2]),
            Err(SceneError::InvalidOperation(_))
        ));
    }

    #[test]
    fn locked_nodes_refuse_constraints() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("a", NodeKind::Joint, None).unwrap();
        let b = scene.create_node("b", NodeKind::Joint, None).unwrap();
        scene.set_locked(b, true).unwrap();
        let spec = ConstraintSpec::new(ConstraintKind::Orientation, a, b).aim(Vec3::X);
        assert_eq!(
            scene.create_constraint("b_aim", spec),
            Err(SceneError::Locked("b".to_string()))
        );
    }

    #[test]
    fn dynamics_setup_wires_follicles_and_outputs() {
        let mut scene = MemoryScene::new();
        let ids = chain(&mut scene, &["j1", "j2", "j3"]);
        let curve = scene
            .create_spline_handle("ik", ids[0], ids[2])
            .unwrap()
            .curve
            .unwrap();

        let reported = scene.run_dynamics_setup(&[curve], None);
        let context = scene.find("hairSystem1").unwrap();
        assert_eq!(reported, vec![context]);

        let follicle = scene
            .outgoing(curve)
            .into_iter()
            .find(|c| c.destination.attr == attrs::START_POSITION)
            .map(|c| c.destination.node)
            .unwrap();
        assert_eq!(scene.attr(&Plug::new(follicle, attrs::POINT_LOCK)), Some(AttrValue::Int(3)));
        assert!(scene.exists("hairSystem1OutputCurves"));
        assert_eq!(scene.parent_of(follicle), scene.find("hairSystem1Follicles"));
    }

    #[test]
    fn dynamics_setup_reuses_a_given_context() {
        let mut scene = MemoryScene::new();
        let a = chain(&mut scene, &["a1", "a2"]);
        let b = chain(&mut scene, &["b1", "b2"]);
        let ca = scene.create_spline_handle("ik_a", a[0], a[1]).unwrap().curve.unwrap();
        let cb = scene.create_spline_handle("ik_b", b[0], b[1]).unwrap().curve.unwrap();

        let context = scene.run_dynamics_setup(&[ca], None)[0];
        scene.rename(context, "tail_hairSystem").unwrap();
        scene.run_dynamics_setup(&[cb], Some(context));

        assert_eq!(scene.nodes_of_type("hairSystem").len(), 1);
        assert_eq!(
            scene.source_of(&Plug::new(context, attrs::input_hair(1))).map(|p| p.attr),
            Some(attrs::OUT_HAIR.to_string())
        );
        assert_eq!(scene.dynamics_calls(), 2);
    }

    #[test]
    fn undo_chunks_balance() {
        let mut scene = MemoryScene::new();
        scene.close_undo_chunk();
        assert_eq!(scene.undo_chunks_closed(), 0);
        scene.open_undo_chunk();
        assert_eq!(scene.undo_depth(), 1);
        scene.close_undo_chunk();
        assert_eq!(scene.undo_depth(), 0);
        assert_eq!(scene.undo_chunks_closed(), 1);
    }

    #[test]
    fn outline_marks_hidden_nodes() {
        let mut scene = MemoryScene::new();
        let grp = scene.create_node("grp", NodeKind::Group, None).unwrap();
        scene.create_node("child", NodeKind::Transform, Some(grp)).unwrap();
        scene
            .set_attr(&Plug::new(grp, attrs::VISIBILITY), AttrValue::Bool(false))
            .unwrap();
        assert_eq!(scene.outline(), "grp (group) [hidden]\n  child (transform)\n");
    }
}
