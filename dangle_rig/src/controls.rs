use dangle_ids::NodeID;
use dangle_scene::{
    AttrValue, ConstraintKind, ConstraintSpec, NodeKind, Plug, SceneError, SceneGraph, attrs,
};
use glam::Mat4;
use log::debug;

use crate::error::{RigError, RigResult};
use crate::naming::{NameAllocator, namespace_of, short_name};

/// Artist-facing transform over one control point, owning its cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlProxy {
    pub transform: NodeID,
    pub cluster: NodeID,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlHierarchy {
    pub root_group: NodeID,
    /// In control point order; proxy `i` is parented under proxy `i - 1`.
    pub proxies: Vec<ControlProxy>,
}

impl ControlHierarchy {
    pub fn first(&self) -> Option<&ControlProxy> {
        self.proxies.first()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

/// One hidden cluster and one proxy per control point of `curve`, each proxy
/// nested under the previous one and the first under
/// `<base>_curve_dy_start_cluster_GP`.
pub fn build_control_hierarchy(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    curve: NodeID,
    base: &str,
    namespace: Option<&str>,
    parent: Option<NodeID>,
) -> RigResult<ControlHierarchy> {
    let count = scene
        .node(curve)
        .and_then(|n| n.kind.as_curve())
        .map(|c| c.len())
        .unwrap_or(0);
    if count == 0 {
        return Err(RigError::resolution(base, "control points of the simulation input"));
    }

    let root_name = names.unique_name(
        scene,
        &format!("{base}_curve_dy_start_cluster_GP"),
        namespace,
    );
    let root_group = scene.create_node(&root_name, NodeKind::Group, parent)?;

    let mut proxies: Vec<ControlProxy> = Vec::with_capacity(count);
    for i in 0..count {
        let cluster_name = names.unique_name(scene, &format!("{base}_cluster_{i}"), namespace);
        let cluster = scene.create_cluster(&cluster_name, curve, i)?;
        scene.set_attr(&Plug::new(cluster, attrs::VISIBILITY), AttrValue::Bool(false))?;

        let proxy_name =
            names.unique_name(scene, &format!("{base}_start_con_curve_{i}"), namespace);
        let transform = scene.create_node(&proxy_name, NodeKind::Transform, None)?;
        let placed = scene.world_matrix(cluster).unwrap_or(Mat4::IDENTITY);
        scene.set_world_matrix(transform, placed)?;
        scene.reparent(cluster, Some(transform))?;

        if let Some(previous) = proxies.last() {
            scene.reparent(transform, Some(previous.transform))?;
        }
        proxies.push(ControlProxy { transform, cluster });
    }

    if let Some(first) = proxies.first() {
        let matched = scene.world_matrix(first.transform).unwrap_or(Mat4::IDENTITY);
        scene.set_world_matrix(root_group, matched)?;
        scene.reparent(first.transform, Some(root_group))?;
    }

    debug!("`{base}`: {count} control proxies under `{root_name}`");
    Ok(ControlHierarchy {
        root_group,
        proxies,
    })
}

/// Keep `control_root` following `parent` (offset kept), so controls move
/// with whatever the selected chain hangs from.
pub fn follow_parent(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    parent: NodeID,
    control_root: NodeID,
) -> RigResult<NodeID> {
    let root_name = scene
        .name_of(control_root)
        .map(str::to_string)
        .ok_or(SceneError::NodeNotFound(control_root))?;
    let kind = ConstraintKind::Follow;
    let name = names.unique_name(
        scene,
        &format!("{}_{}", short_name(&root_name), kind.label()),
        namespace_of(&root_name),
    );
    let spec = ConstraintSpec::new(kind, parent, control_root).maintain_offset(true);
    scene
        .create_constraint(&name, spec)
        .map_err(|source| RigError::Constraint {
            node: root_name,
            kind,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dangle_scene::{CurveData, MemoryScene};
    use glam::Vec3;

    fn curve_with(scene: &mut MemoryScene, points: Vec<Vec3>) -> NodeID {
        scene
            .create_node("tail_curve_dy_start", NodeKind::Curve(CurveData::new(points)), None)
            .unwrap()
    }

    #[test]
    fn one_nested_proxy_per_point() {
        let mut scene = MemoryScene::new();
        let points = vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 0.0)];
        let curve = curve_with(&mut scene, points.clone());
        let mut names = NameAllocator::new();

        let controls =
            build_control_hierarchy(&mut scene, &mut names, curve, "tail", None, None).unwrap();
        assert_eq!(controls.len(), 4);
        assert_eq!(
            scene.name_of(controls.root_group),
            Some("tail_curve_dy_start_cluster_GP")
        );
        assert_eq!(scene.parent_of(controls.proxies[0].transform), Some(controls.root_group));

        for (i, proxy) in controls.proxies.iter().enumerate() {
            assert_eq!(
                scene.name_of(proxy.transform).unwrap(),
                format!("tail_start_con_curve_{i}")
            );
            assert_eq!(scene.parent_of(proxy.cluster), Some(proxy.transform));
            assert!(!scene.node(proxy.cluster).unwrap().is_visible());
            let at = scene.world_position(proxy.transform).unwrap();
            assert!(at.abs_diff_eq(points[i], 1e-5));
            if i > 0 {
                assert_eq!(
                    scene.parent_of(proxy.transform),
                    Some(controls.proxies[i - 1].transform)
                );
            }
        }
    }

    #[test]
    fn root_group_matches_first_proxy() {
        let mut scene = MemoryScene::new();
        let curve = curve_with(
            &mut scene,
            vec![Vec3::new(0.0, 4.0, 0.0), Vec3::new(1.0, 4.0, 0.0)],
        );
        let mut names = NameAllocator::new();
        let controls =
            build_control_hierarchy(&mut scene, &mut names, curve, "tail", None, None).unwrap();
        let root = scene.world_position(controls.root_group).unwrap();
        assert!(root.abs_diff_eq(Vec3::new(0.0, 4.0, 0.0), 1e-5));
    }

    #[test]
    fn empty_curve_is_a_resolution_error() {
        let mut scene = MemoryScene::new();
        let curve = curve_with(&mut scene, Vec::new());
        let mut names = NameAllocator::new();
        let err = build_control_hierarchy(&mut scene, &mut names, curve, "tail", None, None)
            .unwrap_err();
        assert!(matches!(err, RigError::Resolution { .. }));
        assert!(!scene.exists("tail_curve_dy_start_cluster_GP"));
    }

    #[test]
    fn follow_parent_constrains_the_control_root() {
        let mut scene = MemoryScene::new();
        let hips = scene.create_node("hips", NodeKind::Joint, None).unwrap();
        let curve = curve_with(&mut scene, vec![Vec3::ZERO, Vec3::X]);
        let mut names = NameAllocator::new();
        let controls =
            build_control_hierarchy(&mut scene, &mut names, curve, "tail", None, None).unwrap();

        let constraint = follow_parent(&mut scene, &mut names, hips, controls.root_group).unwrap();
        let spec = *scene.node(constraint).unwrap().kind.as_constraint().unwrap();
        assert_eq!(spec.kind, ConstraintKind::Follow);
        assert_eq!(spec.driver, hips);
        assert!(spec.maintain_offset);
        assert_eq!(scene.constraints_driving(controls.root_group), vec![constraint]);
    }
}
