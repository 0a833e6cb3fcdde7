use log::{debug, warn};

use super::is_valid_name;
use crate::{
    constants::MAX_NAME_LENGTH,
    error::{CoreError, Entity, ValidationError},
    schema::{NewTag, Tag, Uuid},
    store::Store,
};

/// `#RRGGBB`
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_NAME_LENGTH
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Colors are stored upper-cased so `#ffaa00` and `#FFAA00` collide.
pub async fn create_tag<S: Store + ?Sized>(tag: NewTag, store: &S) -> Result<Tag, CoreError> {
    let tag = NewTag {
        name: tag.name.trim().to_owned(),
        color: tag.color.trim().to_ascii_uppercase(),
        slug: tag.slug.trim().to_owned(),
    };

    if !is_valid_name(&tag.name) {
        return Err(ValidationError::InvalidName.into());
    }
    if !is_hex_color(&tag.color) {
        return Err(ValidationError::InvalidColor.into());
    }
    if !is_slug(&tag.slug) {
        return Err(ValidationError::InvalidSlug.into());
    }

    let slug = tag.slug.to_owned();
    match store.create_tag(tag).await? {
        Some(tag) => {
            debug!("Created tag {} ({})", tag.slug, tag.id);
            Ok(tag)
        }
        None => {
            warn!("Tag {slug} clashes with an existing tag");
            Err(CoreError::Conflict(String::from(
                "Tag with this name, color or slug already exists",
            )))
        }
    }
}

pub async fn get_tag<S: Store + ?Sized>(id: Uuid, store: &S) -> Result<Tag, CoreError> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::Tag, id))
}

pub async fn list_tags<S: Store + ?Sized>(store: &S) -> Result<Vec<Tag>, CoreError> {
    Ok(store.list_tags().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn new_tag(name: &str, color: &str, slug: &str) -> NewTag {
        NewTag {
            name: name.to_owned(),
            color: color.to_owned(),
            slug: slug.to_owned(),
        }
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#FFAA00"));
        assert!(is_hex_color("#0a0b0c"));
        assert!(!is_hex_color("FFAA00"));
        assert!(!is_hex_color("#FFAA0"));
        assert!(!is_hex_color("#GGAA00"));
    }

    #[test]
    fn slugs() {
        assert!(is_slug("quick-dinner_2"));
        assert!(!is_slug(""));
        assert!(!is_slug("quick dinner"));
        assert!(!is_slug("завтрак"));
    }

    #[tokio::test]
    async fn created_tag_is_listed() {
        let store = MemoryStore::new();
        let tag = create_tag(new_tag("Lunch", "#00ff00", "lunch"), &store)
            .await
            .expect("tag");

        assert_eq!(tag.color, "#00FF00");
        assert_eq!(get_tag(tag.id, &store).await.expect("fetch"), tag);
        assert_eq!(list_tags(&store).await.expect("list"), vec![tag]);
    }

    #[tokio::test]
    async fn color_clash_is_a_conflict() {
        let store = MemoryStore::new();
        create_tag(new_tag("Lunch", "#00FF00", "lunch"), &store)
            .await
            .expect("tag");

        let err = create_tag(new_tag("Dinner", "#00ff00", "dinner"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn malformed_tags_are_rejected() {
        let store = MemoryStore::new();

        let err = create_tag(new_tag("Lunch", "green", "lunch"), &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidColor)
        ));

        let err = create_tag(new_tag("Lunch", "#00FF00", "late lunch"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidSlug)));
    }
}
