use log::{debug, warn};

use crate::{
    authentication::jwt::Identity,
    error::{CoreError, Entity},
    pagination::{Page, PageContext},
    schema::{FollowedUser, Subscription, User, Uuid},
    store::Store,
};

async fn ensure_user<S: Store + ?Sized>(id: Uuid, store: &S) -> Result<(), CoreError> {
    match store.get_user(id).await? {
        Some(_) => Ok(()),
        None => Err(CoreError::unknown(Entity::User, id)),
    }
}

/// Self-follow is checked before anything else, then that both users
/// exist, then uniqueness of the edge.
pub async fn follow<S: Store + ?Sized>(
    subscriber_id: Uuid,
    target_id: Uuid,
    store: &S,
) -> Result<Subscription, CoreError> {
    if subscriber_id == target_id {
        return Err(CoreError::SelfFollow);
    }
    ensure_user(target_id, store).await?;
    ensure_user(subscriber_id, store).await?;

    if !store.insert_subscription(subscriber_id, target_id).await? {
        warn!("User {subscriber_id} already follows {target_id}");
        return Err(CoreError::AlreadyFollowing);
    }

    debug!("User {subscriber_id} followed {target_id}");
    Ok(Subscription {
        subscriber_id,
        target_id,
    })
}

pub async fn unfollow<S: Store + ?Sized>(
    subscriber_id: Uuid,
    target_id: Uuid,
    store: &S,
) -> Result<(), CoreError> {
    ensure_user(target_id, store).await?;

    if !store.delete_subscription(subscriber_id, target_id).await? {
        return Err(CoreError::NotFollowing);
    }

    debug!("User {subscriber_id} unfollowed {target_id}");
    Ok(())
}

/// Recipe previews, counts and the requester's own edge are read fresh for
/// every listed user.
async fn describe<S: Store + ?Sized>(
    users: Vec<User>,
    requester: &Identity,
    recipes_limit: Option<i64>,
    store: &S,
) -> Result<Vec<FollowedUser>, CoreError> {
    let mut rows = Vec::with_capacity(users.len());

    for user in users {
        let is_followed_by_requester = match requester.user_id() {
            Some(requester_id) => store.is_following(requester_id, user.id).await?,
            None => false,
        };
        let recipes = store.author_recipes(user.id, recipes_limit).await?;
        let recipe_count = store.count_recipes(user.id).await?;

        rows.push(FollowedUser {
            user,
            is_followed_by_requester,
            recipes,
            recipe_count,
        });
    }

    Ok(rows)
}

/// Authors `subscriber_id` follows.
pub async fn list_following<S: Store + ?Sized>(
    subscriber_id: Uuid,
    requester: &Identity,
    page: Page,
    recipes_limit: Option<i64>,
    store: &S,
) -> Result<PageContext<FollowedUser>, CoreError> {
    let (users, total) = store.list_following(subscriber_id, page).await?;
    let rows = describe(users, requester, recipes_limit, store).await?;

    Ok(PageContext::from_rows(rows, total, page))
}

/// Users following `target_id`.
pub async fn list_followers<S: Store + ?Sized>(
    target_id: Uuid,
    requester: &Identity,
    page: Page,
    recipes_limit: Option<i64>,
    store: &S,
) -> Result<PageContext<FollowedUser>, CoreError> {
    let (users, total) = store.list_followers(target_id, page).await?;
    let rows = describe(users, requester, recipes_limit, store).await?;

    Ok(PageContext::from_rows(rows, total, page))
}
