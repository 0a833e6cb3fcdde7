use log::{debug, warn};

use crate::{
    authentication::jwt::Identity,
    error::{CoreError, Entity},
    schema::{CollectionKind, Membership, Uuid},
    store::Store,
};

/// Adds a recipe to the user's favorites or shopping cart, creating the
/// collection on first use. Adding a recipe twice is an error.
pub async fn add_recipe<S: Store + ?Sized>(
    user_id: Uuid,
    kind: CollectionKind,
    recipe_id: Uuid,
    store: &S,
) -> Result<Membership, CoreError> {
    let recipe = store
        .get_recipe_summary(recipe_id)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::Recipe, recipe_id))?;

    let collection_id = store.ensure_collection(user_id, kind).await?;
    if !store.insert_membership(collection_id, recipe_id).await? {
        warn!("Recipe {recipe_id} is already in {kind} of user {user_id}");
        return Err(CoreError::AlreadyPresent(kind));
    }

    debug!("User {user_id} added recipe {recipe_id} to {kind}");
    Ok(Membership {
        user_id,
        kind,
        recipe,
    })
}

pub async fn remove_recipe<S: Store + ?Sized>(
    user_id: Uuid,
    kind: CollectionKind,
    recipe_id: Uuid,
    store: &S,
) -> Result<(), CoreError> {
    let Some(collection_id) = store.find_collection(user_id, kind).await? else {
        return Err(CoreError::NotPresent(kind));
    };

    if !store.delete_membership(collection_id, recipe_id).await? {
        return Err(CoreError::NotPresent(kind));
    }

    debug!("User {user_id} removed recipe {recipe_id} from {kind}");
    Ok(())
}

/// Always `false` for anonymous callers.
pub async fn is_in_collection<S: Store + ?Sized>(
    viewer: &Identity,
    kind: CollectionKind,
    recipe_id: Uuid,
    store: &S,
) -> Result<bool, CoreError> {
    match viewer.user_id() {
        Some(user_id) => Ok(store.collection_contains(user_id, kind, recipe_id).await?),
        None => Ok(false),
    }
}
