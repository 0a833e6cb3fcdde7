use std::{collections::HashSet, hash::Hash};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, error, warn};

use super::is_valid_name;
use crate::{
    authentication::jwt::Identity,
    constants::{DEFAULT_IMAGE_EXTENSION, IMAGE_DIRECTORY, MAX_COOKING_TIME},
    error::{CoreError, Entity, ValidationError},
    pagination::{Page, PageContext},
    schema::{
        CollectionKind, IngredientLine, Recipe, RecipeContent, RecipeDraft, RecipeFilter,
        RecipeImage, RecipeQuery, RecipeView, Uuid,
    },
    store::Store,
};

fn has_duplicates<T: Eq + Hash>(values: impl IntoIterator<Item = T>) -> bool {
    let mut seen = HashSet::new();
    values.into_iter().any(|value| !seen.insert(value))
}

/// Checks a draft without touching storage. Rules are applied in a fixed
/// order and the first one violated is reported.
pub fn prepare_content(draft: RecipeDraft) -> Result<RecipeContent, ValidationError> {
    let cooking_time = i32::try_from(draft.cooking_time)
        .ok()
        .filter(|minutes| *minutes >= 1 && i64::from(*minutes) <= MAX_COOKING_TIME)
        .ok_or(ValidationError::InvalidCookingTime)?;

    if draft.tags.is_empty() {
        return Err(ValidationError::NoTagsProvided);
    }
    if has_duplicates(draft.tags.iter()) {
        return Err(ValidationError::DuplicateTag);
    }
    if draft.ingredients.is_empty() {
        return Err(ValidationError::NoIngredientsProvided);
    }
    if draft.ingredients.iter().any(|entry| entry.amount <= 0) {
        return Err(ValidationError::NonPositiveAmount);
    }
    if has_duplicates(draft.ingredients.iter().map(|entry| entry.id)) {
        return Err(ValidationError::DuplicateIngredient);
    }

    let name = draft.name.trim();
    if !is_valid_name(name) {
        return Err(ValidationError::InvalidName);
    }

    let ingredients = draft
        .ingredients
        .iter()
        .map(|entry| {
            i32::try_from(entry.amount)
                .map(|amount| IngredientLine {
                    ingredient_id: entry.id,
                    amount,
                })
                .map_err(|_| ValidationError::AmountOutOfRange)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecipeContent {
        name: name.to_owned(),
        text: draft.text,
        cooking_time,
        image: decode_image(&draft.image)?,
        tags: draft.tags,
        ingredients,
    })
}

/// Accepts `data:image/<ext>;base64,<payload>` or a bare base64 payload,
/// which is stored as `DEFAULT_IMAGE_EXTENSION`.
pub fn decode_image(data: &str) -> Result<RecipeImage, ValidationError> {
    let data = data.trim();

    let (extension, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(ValidationError::InvalidImage)?;
            let extension = header
                .strip_suffix(";base64")
                .and_then(|mime| mime.strip_prefix("image/"))
                .ok_or(ValidationError::InvalidImage)?;
            (extension, payload)
        }
        None => (DEFAULT_IMAGE_EXTENSION, data),
    };

    let extension = match extension {
        "jpeg" => "jpg",
        "svg+xml" => "svg",
        other => other,
    };
    if extension.is_empty()
        || extension.len() > 5
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ValidationError::InvalidImage);
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ValidationError::InvalidImage)?;
    if bytes.is_empty() {
        return Err(ValidationError::InvalidImage);
    }

    Ok(RecipeImage {
        name: format!("{IMAGE_DIRECTORY}/{}.{extension}", uuid::Uuid::new_v4()),
        data: bytes,
    })
}

/// Every referenced ingredient and tag must exist. Ingredients are checked
/// first, and the first missing id is reported.
async fn ensure_references<S: Store + ?Sized>(
    content: &RecipeContent,
    store: &S,
) -> Result<(), CoreError> {
    let ingredient_ids: Vec<Uuid> = content
        .ingredients
        .iter()
        .map(|line| line.ingredient_id)
        .collect();
    let known = store.existing_ingredient_ids(&ingredient_ids).await?;
    if let Some(id) = ingredient_ids.iter().find(|id| !known.contains(id)) {
        return Err(CoreError::unknown(Entity::Ingredient, *id));
    }

    let known = store.existing_tag_ids(&content.tags).await?;
    if let Some(id) = content.tags.iter().find(|id| !known.contains(id)) {
        return Err(CoreError::unknown(Entity::Tag, *id));
    }

    Ok(())
}

/// Validates the draft and persists the recipe with its ingredient lines and
/// tag links. Nothing is written when any check fails.
pub async fn compose_recipe<S: Store + ?Sized>(
    author_id: Uuid,
    draft: RecipeDraft,
    store: &S,
) -> Result<Recipe, CoreError> {
    let content = prepare_content(draft).map_err(|e| {
        debug!("Rejected recipe draft from user {author_id}: {e}");
        e
    })?;

    if store.get_user(author_id).await?.is_none() {
        return Err(CoreError::unknown(Entity::User, author_id));
    }
    ensure_references(&content, store).await?;

    let recipe = store
        .insert_recipe(author_id, &content)
        .await
        .map_err(|e| {
            error!("Failed to store recipe {} for user {author_id}: {e}", content.name);
            e
        })?;

    debug!(
        "User {author_id} published recipe {} with {} ingredients",
        recipe.id,
        recipe.ingredients.len()
    );
    Ok(recipe)
}

/// Replaces every field of an existing recipe. Ingredient lines and tag links
/// from the previous version do not survive.
pub async fn update_recipe<S: Store + ?Sized>(
    recipe_id: Uuid,
    draft: RecipeDraft,
    store: &S,
) -> Result<Recipe, CoreError> {
    let content = prepare_content(draft)?;
    ensure_references(&content, store).await?;

    let recipe = store
        .replace_recipe(recipe_id, &content)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::Recipe, recipe_id))?;

    debug!("Updated recipe {recipe_id}");
    Ok(recipe)
}

async fn view<S: Store + ?Sized>(
    recipe: Recipe,
    viewer: &Identity,
    store: &S,
) -> Result<RecipeView, CoreError> {
    let (is_favorited, is_in_shopping_cart) = match viewer.user_id() {
        Some(user_id) => (
            store
                .collection_contains(user_id, CollectionKind::Favorite, recipe.id)
                .await?,
            store
                .collection_contains(user_id, CollectionKind::ShoppingCart, recipe.id)
                .await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        recipe,
        is_favorited,
        is_in_shopping_cart,
    })
}

pub async fn get_recipe<S: Store + ?Sized>(
    recipe_id: Uuid,
    viewer: &Identity,
    store: &S,
) -> Result<RecipeView, CoreError> {
    let recipe = store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::Recipe, recipe_id))?;

    view(recipe, viewer, store).await
}

/// Newest recipes first. The membership filters only apply to
/// authenticated viewers.
pub async fn list_recipes<S: Store + ?Sized>(
    filter: &RecipeFilter,
    viewer: &Identity,
    page: Page,
    store: &S,
) -> Result<PageContext<RecipeView>, CoreError> {
    let viewer_id = viewer.user_id();
    let query = RecipeQuery {
        author: filter.author,
        tags: filter.tags.to_owned(),
        favorited_by: viewer_id.filter(|_| filter.is_favorited),
        in_cart_of: viewer_id.filter(|_| filter.is_in_shopping_cart),
    };

    let (recipes, total) = store.list_recipes(&query, page).await?;

    let mut rows = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        rows.push(view(recipe, viewer, store).await?);
    }

    Ok(PageContext::from_rows(rows, total, page))
}

/// Lines, tag links and memberships of the recipe go with it.
pub async fn delete_recipe<S: Store + ?Sized>(recipe_id: Uuid, store: &S) -> Result<(), CoreError> {
    if !store.delete_recipe(recipe_id).await? {
        warn!("Tried to delete missing recipe {recipe_id}");
        return Err(CoreError::unknown(Entity::Recipe, recipe_id));
    }

    debug!("Deleted recipe {recipe_id}");
    Ok(())
}
