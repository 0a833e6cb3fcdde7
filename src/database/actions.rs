pub mod collections;
pub mod ingredients;
pub mod recipes;
pub mod shopping_list;
pub mod subscriptions;
pub mod tags;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures;

pub use collections::*;
pub use ingredients::*;
pub use recipes::*;
pub use shopping_list::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

use crate::constants::MAX_NAME_LENGTH;

/// Names of catalog entries, recipes and users: non-empty, at most
/// `MAX_NAME_LENGTH` characters.
pub(crate) fn is_valid_name(value: &str) -> bool {
    !value.is_empty() && value.chars().count() <= MAX_NAME_LENGTH
}
