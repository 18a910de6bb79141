use dangle_ids::NodeID;
use dangle_scene::{ConstraintKind, ConstraintSpec, SceneGraph};
use glam::Vec3;
use log::{debug, warn};

use crate::chain::CrossLink;
use crate::error::RigError;
use crate::naming::{NameAllocator, namespace_of, short_name};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinderOptions {
    /// Keep the current offset on the position binder.
    pub maintain_offset: bool,
    /// Local axis of the original node aimed at the next working node.
    pub aim_axis: Vec3,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self {
            maintain_offset: false,
            aim_axis: Vec3::X,
        }
    }
}

/// Delete every binder constraint currently driving `node`.
fn clear_binders(scene: &mut dyn SceneGraph, node: NodeID) -> usize {
    let mut removed = 0;
    for constraint in scene.constraints_driving(node) {
        let is_binder = scene
            .node(constraint)
            .and_then(|n| n.kind.as_constraint())
            .is_some_and(|spec| ConstraintKind::ALL.contains(&spec.kind));
        if !is_binder {
            continue;
        }
        match scene.delete(constraint) {
            Ok(()) => removed += 1,
            Err(err) => warn!("could not remove constraint {constraint}: {err}"),
        }
    }
    removed
}

fn add_binder(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    original_name: &str,
    spec: ConstraintSpec,
) -> Result<NodeID, RigError> {
    let name = names.unique_name(
        scene,
        &format!("{}_{}", short_name(original_name), spec.kind.label()),
        namespace_of(original_name),
    );
    scene
        .create_constraint(&name, spec)
        .map_err(|source| RigError::Constraint {
            node: original_name.to_string(),
            kind: spec.kind,
            source,
        })
}

/// Drive each link's original node from its working node. Originals are
/// found by id, so renames in between do not matter. Existing binders are
/// removed first; the last node of a chain gets no orientation binder.
/// Failures are per link and returned, never fatal.
pub fn bind_links(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    links: &[CrossLink],
    options: BinderOptions,
) -> Vec<RigError> {
    let mut errors = Vec::new();

    for link in links {
        let Some(original_name) = scene.name_of(link.source).map(str::to_string) else {
            errors.push(RigError::resolution(link.source.to_string(), "original node"));
            continue;
        };
        if !scene.contains(link.work) {
            errors.push(RigError::resolution(&original_name, "working node"));
            continue;
        }

        let removed = clear_binders(scene, link.source);
        if removed > 0 {
            debug!("`{original_name}`: removed {removed} old binder(s)");
        }

        let position = ConstraintSpec::new(ConstraintKind::Position, link.work, link.source)
            .maintain_offset(options.maintain_offset);
        if let Err(err) = add_binder(scene, names, &original_name, position) {
            warn!("{err}");
            errors.push(err);
        }

        let Some(next) = link.next_work.filter(|n| scene.contains(*n)) else {
            continue;
        };
        let orientation = ConstraintSpec::new(ConstraintKind::Orientation, next, link.source)
            .maintain_offset(true)
            .aim(options.aim_axis);
        if let Err(err) = add_binder(scene, names, &original_name, orientation) {
            warn!("{err}");
            errors.push(err);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{cross_links, walk_chain};
    use dangle_scene::{MemoryScene, NodeKind};

    fn linked_chains(scene: &mut MemoryScene) -> Vec<CrossLink> {
        let original = scene
            .add_joint_chain(&["a", "b", "c"], None, Vec3::ZERO, Vec3::X)
            .unwrap();
        let work = scene
            .add_joint_chain(&["a_work", "b_work", "c_work"], None, Vec3::ZERO, Vec3::X)
            .unwrap();
        cross_links(
            &walk_chain(scene, original[0]).unwrap(),
            &walk_chain(scene, work[0]).unwrap(),
        )
    }

    fn kinds_on(scene: &MemoryScene, node: NodeID) -> Vec<ConstraintKind> {
        let mut kinds: Vec<_> = scene
            .constraints_driving(node)
            .into_iter()
            .filter_map(|c| scene.node(c)?.kind.as_constraint().map(|s| s.kind))
            .collect();
        kinds.sort_by_key(|k| k.label());
        kinds
    }

    #[test]
    fn every_node_gets_position_and_all_but_last_aim() {
        let mut scene = MemoryScene::new();
        let links = linked_chains(&mut scene);
        let errors = bind_links(
            &mut scene,
            &mut NameAllocator::new(),
            &links,
            BinderOptions::default(),
        );
        assert!(errors.is_empty());

        for link in &links[..2] {
            assert_eq!(
                kinds_on(&scene, link.source),
                [ConstraintKind::Orientation, ConstraintKind::Position]
            );
        }
        assert_eq!(kinds_on(&scene, links[2].source), [ConstraintKind::Position]);

        let aim = scene.find("a_aimConstraint").unwrap();
        let spec = scene.node(aim).unwrap().kind.as_constraint().copied().unwrap();
        assert_eq!(spec.driver, links[0].next_work.unwrap());
        assert_eq!(spec.aim_axis, Vec3::X);
        assert!(spec.maintain_offset);
    }

    #[test]
    fn rebinding_does_not_stack() {
        let mut scene = MemoryScene::new();
        let links = linked_chains(&mut scene);
        let driver = scene.create_node("stray", NodeKind::Transform, None).unwrap();
        scene
            .create_constraint(
                "a_scaleConstraint1",
                ConstraintSpec::new(ConstraintKind::Scale, driver, links[0].source),
            )
            .unwrap();

        for _ in 0..2 {
            bind_links(&mut scene, &mut NameAllocator::new(), &links, BinderOptions::default());
        }
        assert_eq!(
            kinds_on(&scene, links[0].source),
            [ConstraintKind::Orientation, ConstraintKind::Position]
        );
        assert!(scene.exists("a_pointConstraint"));
    }

    #[test]
    fn renamed_originals_still_resolve() {
        let mut scene = MemoryScene::new();
        let links = linked_chains(&mut scene);
        scene.rename(links[1].source, "renamed_b").unwrap();

        let errors = bind_links(
            &mut scene,
            &mut NameAllocator::new(),
            &links,
            BinderOptions::default(),
        );
        assert!(errors.is_empty());
        assert!(scene.exists("renamed_b_pointConstraint"));
        assert_eq!(kinds_on(&scene, links[1].source).len(), 2);
    }

    #[test]
    fn rejected_binder_only_fails_its_link() {
        let mut scene = MemoryScene::new();
        let links = linked_chains(&mut scene);
        scene.set_locked(links[0].source, true).unwrap();

        let errors = bind_links(
            &mut scene,
            &mut NameAllocator::new(),
            &links,
            BinderOptions::default(),
        );
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, RigError::Constraint { .. })));
        assert_eq!(kinds_on(&scene, links[2].source), [ConstraintKind::Position]);
    }

    #[test]
    fn deleted_originals_are_reported() {
        let mut scene = MemoryScene::new();
        let links = linked_chains(&mut scene);
        scene.delete(links[2].source).unwrap();

        let errors = bind_links(
            &mut scene,
            &mut NameAllocator::new(),
            &links,
            BinderOptions::default(),
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RigError::Resolution { .. }));
    }
}
