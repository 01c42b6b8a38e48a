//! Identity of long-lived domain records.

/// A record that keeps its identity while its fields change.
///
/// Two values with the same id are two versions of one record; pairing a
/// pending write with its stored version goes through [`Entity::same_identity`].
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
