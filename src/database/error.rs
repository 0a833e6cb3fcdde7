use serde::Serialize;
use std::fmt::{self, Display};
use thiserror::Error;

use crate::{
    constants::{MAX_COOKING_TIME, MAX_NAME_LENGTH},
    schema::{CollectionKind, Uuid},
};

/// Failure reported by the storage collaborator.
#[derive(Debug, Error)]
#[error("Query failed: {info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => match e.code() {
                Some(code) => Self::new(format!("{e} ({code})")),
                None => Self::new(format!("{e}")),
            },
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::Migrate(e) => Self::new(format!("Migration failed: {e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for QueryError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::new(format!("Migration failed: {value}"))
    }
}

/// Input rejected before anything is written.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cooking time must be between 1 and {} minutes", MAX_COOKING_TIME)]
    InvalidCookingTime,

    #[error("Pick at least one tag")]
    NoTagsProvided,

    #[error("Each tag can be picked only once")]
    DuplicateTag,

    #[error("Add at least one ingredient")]
    NoIngredientsProvided,

    #[error("Ingredient amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Ingredient amount is too large")]
    AmountOutOfRange,

    #[error("Ingredients can't repeat")]
    DuplicateIngredient,

    #[error("Name must be between 1 and {} characters", MAX_NAME_LENGTH)]
    InvalidName,

    #[error("Color must be a hex value like #RRGGBB")]
    InvalidColor,

    #[error("Slug may only contain latin letters, digits, '-' and '_'")]
    InvalidSlug,

    #[error("Image must be base64 encoded")]
    InvalidImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Ingredient,
    Tag,
    Recipe,
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::User => "user",
            Entity::Ingredient => "ingredient",
            Entity::Tag => "tag",
            Entity::Recipe => "recipe",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No {entity} exists with id {id}")]
    UnknownReference { entity: Entity, id: Uuid },

    #[error("Recipe is already in {0}")]
    AlreadyPresent(CollectionKind),

    #[error("Recipe is not in {0}")]
    NotPresent(CollectionKind),

    #[error("You already follow this author")]
    AlreadyFollowing,

    #[error("Author not found in subscriptions")]
    NotFollowing,

    #[error("You can't follow yourself")]
    SelfFollow,

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CoreError {
    pub fn unknown(entity: Entity, id: Uuid) -> Self {
        Self::UnknownReference { entity, id }
    }

    /// HTTP status a boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::AlreadyPresent(_)
            | CoreError::NotPresent(_)
            | CoreError::AlreadyFollowing
            | CoreError::NotFollowing
            | CoreError::SelfFollow
            | CoreError::EmptyCart
            | CoreError::Conflict(_) => 400,
            CoreError::Unauthorized(_) => 401,
            CoreError::UnknownReference { .. } => 404,
            CoreError::Query(_) => 500,
        }
    }
}

impl warp::reject::Reject for CoreError {}
