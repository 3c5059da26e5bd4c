//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Ledger records and catalog products are both entities: two records with the same
/// identifier are the same record, whatever their other fields say.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
