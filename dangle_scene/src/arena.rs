use dangle_ids::NodeID;

use crate::node::SceneNode;

#[derive(Default)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Generational slot storage for scene nodes. Slot 0 stays empty so the nil
/// id never resolves; a freed slot is reused with its generation bumped.
pub struct NodeArena {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default()],
            vacant: Vec::new(),
            live: 0,
        }
    }

    /// Store `node` and stamp it with the id it is reachable under.
    pub fn insert(&mut self, mut node: SceneNode) -> NodeID {
        let index = match self.vacant.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = NodeID::from_parts(index, slot.generation);
        node.id = id;
        slot.node = Some(node);
        self.live += 1;
        id
    }

    fn slot_of(&self, id: NodeID) -> Option<&Slot> {
        if id.is_nil() {
            return None;
        }
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    pub fn get(&self, id: NodeID) -> Option<&SceneNode> {
        self.slot_of(id)?.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeID) -> Option<&mut SceneNode> {
        self.slot_of(id)?;
        self.slots[id.index() as usize].node.as_mut()
    }

    /// Take the node out. Ids issued for it stop resolving.
    pub fn remove(&mut self, id: NodeID) -> Option<SceneNode> {
        self.slot_of(id)?;
        let slot = &mut self.slots[id.index() as usize];
        let node = slot.node.take()?;
        slot.generation = id.next_generation().generation();
        self.vacant.push(id.index());
        self.live -= 1;
        Some(node)
    }

    pub fn contains(&self, id: NodeID) -> bool {
        self.get(id).is_some()
    }

    /// Live ids in slot order.
    pub fn ids(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeID, &SceneNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let node = slot.node.as_ref()?;
            Some((NodeID::from_parts(index as u32, slot.generation), node))
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn first_id_skips_nil_slot() {
        let mut arena = NodeArena::new();
        let id = arena.insert(SceneNode::new("a", NodeKind::Joint));
        assert_eq!(id.index(), 1);
        assert_eq!(arena.get(id).map(|n| n.id), Some(id));
    }

    #[test]
    fn stale_id_does_not_resolve_after_reuse() {
        let mut arena = NodeArena::new();
        let a = arena.insert(SceneNode::new("a", NodeKind::Joint));
        assert!(arena.remove(a).is_some());
        let b = arena.insert(SceneNode::new("b", NodeKind::Joint));

        assert_eq!(a.index(), b.index());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|n| n.name.as_str()), Some("b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn nil_never_resolves() {
        let mut arena = NodeArena::new();
        arena.insert(SceneNode::new("a", NodeKind::Group));
        assert!(arena.get(NodeID::nil()).is_none());
        assert!(arena.remove(NodeID::nil()).is_none());
    }
}
