use dangle_ids::NodeID;
use dangle_scene::SceneGraph;
use log::debug;
use thiserror::Error;

use crate::error::{RigResult, ValidationError};
use crate::naming::{NameAllocator, namespace_of, short_name};

/// A chain walk hit a joint with more than one joint child.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("chain `{chain}` branches at `{at_name}` ({children} joint children)")]
pub struct BranchedChainError {
    pub chain: String,
    pub root: NodeID,
    pub at: NodeID,
    pub at_name: String,
    pub children: usize,
}

/// Unbranched root-to-leaf run of joints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain {
    pub nodes: Vec<NodeID>,
}

impl Chain {
    pub fn root(&self) -> Option<NodeID> {
        self.nodes.first().copied()
    }

    pub fn leaf(&self) -> Option<NodeID> {
        self.nodes.last().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Duplicate of a selected chain, with the root it was copied from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkingChain {
    pub source_root: NodeID,
    pub chain: Chain,
}

impl WorkingChain {
    pub fn root(&self) -> Option<NodeID> {
        self.chain.root()
    }
}

/// Pairs an original joint with its working copy, by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossLink {
    pub source: NodeID,
    pub work: NodeID,
    /// Working node after `work` in the same chain; `None` for the last one.
    pub next_work: Option<NodeID>,
}

/// Follow single joint children down from `root`. Only joint children count,
/// so constraints or helpers parented under a joint never branch the chain.
/// A missing root gives an empty chain.
pub fn walk_chain(scene: &dyn SceneGraph, root: NodeID) -> Result<Chain, BranchedChainError> {
    let mut nodes = Vec::new();
    if !scene.contains(root) {
        return Ok(Chain { nodes });
    }

    let mut current = root;
    loop {
        nodes.push(current);
        let children = scene.joint_children(current);
        match children.as_slice() {
            [] => break,
            [next] => current = *next,
            _ => {
                return Err(BranchedChainError {
                    chain: scene.name_of(root).unwrap_or_default().to_string(),
                    root,
                    at: current,
                    at_name: scene.name_of(current).unwrap_or_default().to_string(),
                    children: children.len(),
                });
            }
        }
    }
    Ok(Chain { nodes })
}

/// Pair each node under `original` with its copy under `clone`, root first.
/// Constraint children are skipped since the host does not copy them.
fn pair_subtrees(scene: &dyn SceneGraph, original: NodeID, clone: NodeID) -> Vec<(NodeID, NodeID)> {
    let copied_children = |id: NodeID| -> Vec<NodeID> {
        scene
            .children_of(id)
            .into_iter()
            .filter(|c| scene.node(*c).is_some_and(|n| n.kind.as_constraint().is_none()))
            .collect()
    };

    let mut pairs = Vec::new();
    let mut stack = vec![(original, clone)];
    while let Some((source, copy)) = stack.pop() {
        pairs.push((source, copy));
        let sources = copied_children(source);
        let copies = copied_children(copy);
        stack.extend(sources.into_iter().zip(copies).rev());
    }
    pairs
}

/// Deep-copy the chain at `root` next to it. Every copied node, joints and
/// any helpers under them, is named `<original short name><suffix>` in the
/// original's namespace.
pub fn duplicate_chain(
    scene: &mut dyn SceneGraph,
    names: &mut NameAllocator,
    root: NodeID,
    suffix: &str,
) -> RigResult<WorkingChain> {
    walk_chain(scene, root).map_err(ValidationError::from)?;
    let clones = scene.duplicate(root)?;
    let Some(&clone_root) = clones.first() else {
        return Err(crate::error::RigError::resolution(
            scene.name_of(root).unwrap_or_default(),
            "duplicated chain root",
        ));
    };

    for (source, copy) in pair_subtrees(scene, root, clone_root) {
        let Some(source_name) = scene.name_of(source).map(str::to_string) else {
            continue;
        };
        let base = format!("{}{suffix}", short_name(&source_name));
        names.rename(scene, copy, &base, namespace_of(&source_name));
    }
    let working = walk_chain(scene, clone_root).map_err(ValidationError::from)?;

    debug!(
        "duplicated `{}` into {} working joint(s)",
        scene.name_of(root).unwrap_or_default(),
        working.len()
    );
    Ok(WorkingChain {
        source_root: root,
        chain: working,
    })
}

/// One link per chain position, root to root, truncated to the shorter chain.
pub fn cross_links(original: &Chain, working: &Chain) -> Vec<CrossLink> {
    let n = original.len().min(working.len());
    (0..n)
        .map(|i| CrossLink {
            source: original.nodes[i],
            work: working.nodes[i],
            next_work: (i + 1 < n).then(|| working.nodes[i + 1]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dangle_scene::{ConstraintKind, ConstraintSpec, MemoryScene, NodeKind};
    use glam::Vec3;

    fn scene_with_chain(names: &[&str]) -> (MemoryScene, Vec<NodeID>) {
        let mut scene = MemoryScene::new();
        let ids = scene
            .add_joint_chain(names, None, Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0))
            .unwrap();
        (scene, ids)
    }

    #[test]
    fn walk_follows_single_children() {
        let (scene, ids) = scene_with_chain(&["a", "b", "c"]);
        let chain = walk_chain(&scene, ids[0]).unwrap();
        assert_eq!(chain.nodes, ids);
        assert_eq!(chain.leaf(), Some(ids[2]));
    }

    #[test]
    fn walk_rejects_branches() {
        let (mut scene, ids) = scene_with_chain(&["a", "b", "c"]);
        scene.create_node("b_side", NodeKind::Joint, Some(ids[1])).unwrap();
        let err = walk_chain(&scene, ids[0]).unwrap_err();
        assert_eq!(err.at, ids[1]);
        assert_eq!(err.children, 2);
        assert_eq!(err.to_string(), "chain `a` branches at `b` (2 joint children)");
    }

    #[test]
    fn non_joint_children_do_not_branch() {
        let (mut scene, ids) = scene_with_chain(&["a", "b"]);
        let driver = scene.create_node("drv", NodeKind::Transform, None).unwrap();
        scene
            .create_constraint(
                "a_pointConstraint1",
                ConstraintSpec::new(ConstraintKind::Position, driver, ids[0]),
            )
            .unwrap();
        scene.create_node("a_loc", NodeKind::Transform, Some(ids[0])).unwrap();
        assert_eq!(walk_chain(&scene, ids[0]).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_names_joints_with_suffix() {
        let (mut scene, ids) = scene_with_chain(&["chr:tail1", "chr:tail2", "chr:tail3"]);
        let mut names = NameAllocator::new();
        let working = duplicate_chain(&mut scene, &mut names, ids[0], "_work").unwrap();

        assert_eq!(working.source_root, ids[0]);
        let work_names: Vec<_> = working
            .chain
            .nodes
            .iter()
            .map(|id| scene.name_of(*id).unwrap().to_string())
            .collect();
        assert_eq!(work_names, ["chr:tail1_work", "chr:tail2_work", "chr:tail3_work"]);
        assert_eq!(
            scene.node(working.chain.nodes[1]).unwrap().transform,
            scene.node(ids[1]).unwrap().transform
        );
    }

    #[test]
    fn duplicate_names_helpers_under_joints() {
        let (mut scene, ids) = scene_with_chain(&["tail1", "tail2"]);
        let loc = scene.create_node("tail1_loc", NodeKind::Transform, Some(ids[0])).unwrap();
        scene.create_node("tail1_aim", NodeKind::Transform, Some(loc)).unwrap();
        let driver = scene.create_node("drv", NodeKind::Transform, None).unwrap();
        scene
            .create_constraint(
                "tail2_pointConstraint",
                ConstraintSpec::new(ConstraintKind::Position, driver, ids[1]),
            )
            .unwrap();

        let mut names = NameAllocator::new();
        let working = duplicate_chain(&mut scene, &mut names, ids[0], "_work").unwrap();
        let root = working.root().unwrap();
        assert!(scene.exists("tail1_loc_work"));
        assert!(scene.exists("tail1_aim_work"));
        assert_eq!(scene.parent_of(scene.find("tail1_loc_work").unwrap()), Some(root));
        assert_eq!(scene.name_of(working.chain.nodes[1]), Some("tail2_work"));
        assert!(scene.constraints_driving(working.chain.nodes[1]).is_empty());
    }

    #[test]
    fn second_duplicate_gets_numbered_names() {
        let (mut scene, ids) = scene_with_chain(&["a", "b"]);
        let mut names = NameAllocator::new();
        duplicate_chain(&mut scene, &mut names, ids[0], "_work").unwrap();
        let again = duplicate_chain(&mut scene, &mut names, ids[0], "_work").unwrap();
        assert_eq!(scene.name_of(again.chain.nodes[0]), Some("a_work_1"));
    }

    #[test]
    fn duplicate_refuses_branched_chain() {
        let (mut scene, ids) = scene_with_chain(&["a", "b"]);
        scene.create_node("a_side", NodeKind::Joint, Some(ids[0])).unwrap();
        let before = scene.len();
        let mut names = NameAllocator::new();
        let err = duplicate_chain(&mut scene, &mut names, ids[0], "_work").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(scene.len(), before);
    }

    #[test]
    fn cross_links_truncate_and_chain_next() {
        let original = Chain {
            nodes: (1..=4).map(|i| NodeID::from_parts(i, 0)).collect(),
        };
        let working = Chain {
            nodes: (10..13).map(|i| NodeID::from_parts(i, 0)).collect(),
        };
        let links = cross_links(&original, &working);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].next_work, Some(working.nodes[1]));
        assert_eq!(links[2].source, original.nodes[2]);
        assert_eq!(links[2].next_work, None);
    }
}
