use async_trait::async_trait;

use crate::{
    error::QueryError,
    pagination::Page,
    schema::{
        CartLine, CollectionKind, Ingredient, NewTag, NewUser, Recipe, RecipeContent, RecipeQuery,
        RecipeSummary, Tag, User, Uuid,
    },
};

/// Storage collaborator. Every method that writes more than one row runs as a
/// single transaction, and uniqueness is enforced by the store itself: methods
/// returning `Option`/`bool` report a constraint conflict as `None`/`false`.
#[async_trait]
pub trait Store: Send + Sync {
    /// `None` when the email or username is taken.
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, QueryError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, QueryError>;

    /// `None` when the (name, measurement unit) pair already exists.
    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, QueryError>;

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, QueryError>;

    /// Ingredients whose name contains `fragment`, case-insensitively, in
    /// storage order.
    async fn filter_ingredients(&self, fragment: &str) -> Result<Vec<Ingredient>, QueryError>;

    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError>;

    /// `None` when the name, color or slug is taken.
    async fn create_tag(&self, tag: NewTag) -> Result<Option<Tag>, QueryError>;

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, QueryError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, QueryError>;

    async fn existing_tag_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError>;

    async fn insert_recipe(
        &self,
        author_id: Uuid,
        content: &RecipeContent,
    ) -> Result<Recipe, QueryError>;

    /// Replaces every field, ingredient line and tag link of the recipe.
    /// `None` when the recipe does not exist.
    async fn replace_recipe(
        &self,
        id: Uuid,
        content: &RecipeContent,
    ) -> Result<Option<Recipe>, QueryError>;

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, QueryError>;

    async fn get_recipe_summary(&self, id: Uuid) -> Result<Option<RecipeSummary>, QueryError>;

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, QueryError>;

    /// Newest first, together with the total number of matches.
    async fn list_recipes(
        &self,
        query: &RecipeQuery,
        page: Page,
    ) -> Result<(Vec<Recipe>, i64), QueryError>;

    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeSummary>, QueryError>;

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, QueryError>;

    /// Get-or-create of the per-user collection singleton.
    async fn ensure_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Uuid, QueryError>;

    async fn find_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Option<Uuid>, QueryError>;

    /// `false` when the recipe is already a member.
    async fn insert_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError>;

    /// `false` when the recipe was not a member.
    async fn delete_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError>;

    async fn collection_recipe_ids(&self, collection_id: Uuid) -> Result<Vec<Uuid>, QueryError>;

    async fn collection_contains(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError>;

    /// Every (ingredient name, unit, amount) line of the given recipes.
    async fn ingredient_lines(&self, recipe_ids: &[Uuid]) -> Result<Vec<CartLine>, QueryError>;

    /// `false` when the edge already exists.
    async fn insert_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError>;

    /// `false` when there was no such edge.
    async fn delete_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError>;

    async fn is_following(&self, subscriber_id: Uuid, target_id: Uuid)
        -> Result<bool, QueryError>;

    async fn list_following(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError>;

    async fn list_followers(
        &self,
        target_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError>;
}
