use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

/// The two per-user recipe sets.
#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "collection_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Favorite,
    ShoppingCart,
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Favorite => write!(f, "favorites"),
            CollectionKind::ShoppingCart => write!(f, "shopping cart"),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::User
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// One ingredient line of a recipe as it is read back, joined with the catalog.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeImage {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author: User,
    pub name: String,
    pub image: String,
    #[serde(skip)]
    pub image_data: Vec<u8>,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
}

/// Short form used by membership responses and author listings.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IngredientEntry {
    pub id: Uuid,
    pub amount: i64,
}

/// Recipe payload as submitted by an author, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientLine {
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// Validated recipe payload, ready to be persisted in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeContent {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: RecipeImage,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_in_shopping_cart: bool,
}

/// Recipe filter with the viewer already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub kind: CollectionKind,
    pub recipe: RecipeSummary,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub subscriber_id: Uuid,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowedUser {
    #[serde(flatten)]
    pub user: User,
    pub is_followed_by_requester: bool,
    pub recipes: Vec<RecipeSummary>,
    pub recipe_count: i64,
}
