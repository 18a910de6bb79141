//! Identity and name allocation.
//!
//! Stages pass `NodeID`s between each other, never names: a `NodeID` survives
//! renames and reparents, and stops resolving once its node is deleted.
//! Every name the rig generates goes through `NameAllocator::unique_name`.

use ahash::AHashSet;
use dangle_ids::NodeID;
use dangle_scene::{SceneGraph, SceneNode};
use log::warn;

/// Stable id of the node currently called `name`.
pub fn stable_id(scene: &dyn SceneGraph, name: &str) -> Option<NodeID> {
    scene.find(name)
}

/// The node behind `id`, or `None` once it has been deleted.
pub fn resolve(scene: &dyn SceneGraph, id: NodeID) -> Option<&SceneNode> {
    scene.node(id)
}

pub fn short_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, short)| short)
}

pub fn namespace_of(name: &str) -> Option<&str> {
    name.rsplit_once(':').map(|(ns, _)| ns).filter(|ns| !ns.is_empty())
}

pub fn with_namespace(namespace: Option<&str>, short: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{short}"),
        _ => short.to_string(),
    }
}

pub fn strip_trailing_digits(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Prefix for a selection: the first name without namespace or trailing
/// digits, or the bare short name if nothing would be left.
pub fn infer_prefix<S: AsRef<str>>(names: &[S]) -> Option<String> {
    let short = short_name(names.first()?.as_ref());
    let stripped = strip_trailing_digits(short);
    let prefix = if stripped.is_empty() { short } else { stripped };
    (!prefix.is_empty()).then(|| prefix.to_string())
}

/// Hands out scene-unique names.
///
/// A name returned by `unique_name` stays reserved for the life of the
/// allocator even if nothing has been created under it yet.
#[derive(Debug, Default)]
pub struct NameAllocator {
    reserved: AHashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_free(&self, scene: &dyn SceneGraph, name: &str) -> bool {
        !scene.exists(name) && !self.reserved.contains(name)
    }

    /// `base` if free, otherwise `base_N` for the smallest free `N >= 1`,
    /// all scoped to `namespace`.
    pub fn unique_name(
        &mut self,
        scene: &dyn SceneGraph,
        base: &str,
        namespace: Option<&str>,
    ) -> String {
        let mut candidate = with_namespace(namespace, base);
        let mut n = 1usize;
        while !self.is_free(scene, &candidate) {
            candidate = with_namespace(namespace, &format!("{base}_{n}"));
            n += 1;
        }
        self.reserved.insert(candidate.clone());
        candidate
    }

    /// Rename `node` to a unique form of `base`. Never fails: if the host
    /// refuses, `base_x` is tried, and after that the node keeps its name.
    /// Returns the name the node ends up with.
    pub fn rename(
        &mut self,
        scene: &mut dyn SceneGraph,
        node: NodeID,
        base: &str,
        namespace: Option<&str>,
    ) -> String {
        let current = scene.name_of(node).map(str::to_string).unwrap_or_default();
        if current == with_namespace(namespace, base) {
            return current;
        }

        let target = self.unique_name(scene, base, namespace);
        let first = match scene.rename(node, &target) {
            Ok(()) => return target,
            Err(err) => err,
        };

        let fallback = self.unique_name(scene, &format!("{base}_x"), namespace);
        match scene.rename(node, &fallback) {
            Ok(()) => {
                warn!("renamed `{current}` to `{fallback}` after `{target}` failed: {first}");
                fallback
            }
            Err(err) => {
                warn!("could not rename `{current}` to `{target}` or `{fallback}`: {err}");
                current
            }
        }
    }
}
