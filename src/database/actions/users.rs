use log::{debug, warn};

use super::is_valid_name;
use crate::{
    error::{CoreError, Entity, ValidationError},
    schema::{NewUser, User, Uuid},
    store::Store,
};

/// Registers a user. Email and username must both be unused.
pub async fn create_user<S: Store + ?Sized>(user: NewUser, store: &S) -> Result<User, CoreError> {
    let user = NewUser {
        email: user.email.trim().to_owned(),
        username: user.username.trim().to_owned(),
        first_name: user.first_name.trim().to_owned(),
        last_name: user.last_name.trim().to_owned(),
        role: user.role,
    };

    if !user.email.contains('@') || !is_valid_name(&user.username) {
        return Err(ValidationError::InvalidName.into());
    }

    let username = user.username.to_owned();
    match store.create_user(user).await? {
        Some(user) => {
            debug!("Registered user {} with id {}", user.username, user.id);
            Ok(user)
        }
        None => {
            warn!("Refused to register {username}: email or username taken");
            Err(CoreError::Conflict(String::from(
                "User with this email or username already exists",
            )))
        }
    }
}

pub async fn get_user<S: Store + ?Sized>(id: Uuid, store: &S) -> Result<User, CoreError> {
    store
        .get_user(id)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::User, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, schema::UserRole};

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            username: username.to_owned(),
            first_name: String::from("Ann"),
            last_name: String::from("Baker"),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn registered_user_can_be_fetched() {
        let store = MemoryStore::new();
        let user = create_user(new_user(" ann@example.com ", "ann"), &store)
            .await
            .expect("user");

        assert_eq!(user.email, "ann@example.com");
        assert_eq!(get_user(user.id, &store).await.expect("fetch"), user);
    }

    #[tokio::test]
    async fn taken_username_conflicts() {
        let store = MemoryStore::new();
        create_user(new_user("ann@example.com", "ann"), &store)
            .await
            .expect("user");

        let err = create_user(new_user("other@example.com", "ann"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_user_is_unknown() {
        let store = MemoryStore::new();
        let err = get_user(42, &store).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnknownReference {
                entity: Entity::User,
                id: 42
            }
        ));
    }
}
