//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// construct a new one; constructors are where validation lives, so a value
/// object that exists is a valid one.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: no identity (`UnitPrice(2.50)` equals any other `UnitPrice(2.50)`)
/// - **Entity**: has identity (a `StockItem` stays the same item after a rename)
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Actor(String);
///
/// impl ValueObject for Actor {}
///
/// assert_eq!(Actor("alice".into()), Actor("alice".into()));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
