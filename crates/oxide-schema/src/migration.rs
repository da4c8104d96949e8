//! Migration units.

use crate::operation::{inverse, Operation};

/// A migration with typed up/down operations.
///
/// Generated migrations spell out both directions; hand-written ones can
/// rely on the default `down`, which inverts `up`.
///
/// # Example
///
/// ```rust
/// use oxide_schema::prelude::*;
///
/// pub struct Migration0001CreateUsers;
///
/// impl Migration for Migration0001CreateUsers {
///     const ID: &'static str = "0001_create_users";
///
///     fn up() -> Vec<Operation> {
///         vec![TableBuilder::new()
///             .name("users")
///             .column(uuid("id").primary_key().build())
///             .column(string("email", 255).not_null().unique().build())
///             .build()
///             .into()]
///     }
/// }
///
/// let down = Migration0001CreateUsers::down();
/// assert!(matches!(&down[0], Operation::DropTable(t) if t.name == "users"));
/// ```
pub trait Migration {
    /// Unique migration identifier, e.g. `"0002_add_email"`.
    const ID: &'static str;

    /// Operations that apply the migration.
    fn up() -> Vec<Operation>;

    /// Operations that revert the migration.
    fn down() -> Vec<Operation> {
        inverse(&Self::up())
    }
}
