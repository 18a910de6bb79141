pub mod ids;

pub use ids::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_nil() {
        let nil = NodeID::nil();
        assert!(nil.is_nil());
        assert_eq!(nil.index(), 0);
        assert_eq!(nil.generation(), 0);
    }

    #[test]
    fn node_id_parts() {
        let id = NodeID::from_parts(5, 2);
        assert_eq!(id.index(), 5);
        assert_eq!(id.generation(), 2);
        assert!(!id.is_nil());
    }

    #[test]
    fn reused_slot_is_a_different_id() {
        let before = NodeID::from_parts(7, 0);
        let after = before.next_generation();
        assert_eq!(after.index(), 7);
        assert_eq!(after.generation(), 1);
        assert_ne!(before, after);
    }

    #[test]
    fn display_is_index_and_generation() {
        assert_eq!(NodeID::from_parts(2, 9).to_string(), "2:9");
        assert_eq!(format!("{:?}", NodeID::from_parts(2, 9)), "NodeID(2:9)");
    }
}
