use log::{debug, warn};

use super::is_valid_name;
use crate::{
    error::{CoreError, Entity, ValidationError},
    schema::{Ingredient, Uuid},
    store::Store,
};

pub async fn create_ingredient<S: Store + ?Sized>(
    name: &str,
    measurement_unit: &str,
    store: &S,
) -> Result<Ingredient, CoreError> {
    let name = name.trim();
    let measurement_unit = measurement_unit.trim();
    if !is_valid_name(name) || !is_valid_name(measurement_unit) {
        return Err(ValidationError::InvalidName.into());
    }

    match store.create_ingredient(name, measurement_unit).await? {
        Some(ingredient) => {
            debug!(
                "Added ingredient {} ({}) with id {}",
                ingredient.name, ingredient.measurement_unit, ingredient.id
            );
            Ok(ingredient)
        }
        None => {
            warn!("Ingredient {name} ({measurement_unit}) is already in the catalog");
            Err(CoreError::Conflict(format!(
                "Ingredient {name} ({measurement_unit}) already exists"
            )))
        }
    }
}

pub async fn get_ingredient<S: Store + ?Sized>(
    id: Uuid,
    store: &S,
) -> Result<Ingredient, CoreError> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| CoreError::unknown(Entity::Ingredient, id))
}

/// Name search for autocompletion. Prefix matches come first, then the
/// remaining substring matches, each group in storage order. An empty
/// query returns the whole catalog.
pub async fn search_ingredients<S: Store + ?Sized>(
    query: &str,
    store: &S,
) -> Result<Vec<Ingredient>, CoreError> {
    let query = query.trim();
    let candidates = store.filter_ingredients(query).await?;

    Ok(rank_by_prefix(query, candidates))
}

/// Case-insensitive for any script, Cyrillic included.
pub fn rank_by_prefix(query: &str, candidates: Vec<Ingredient>) -> Vec<Ingredient> {
    let needle = query.to_lowercase();

    let (mut ranked, contained): (Vec<Ingredient>, Vec<Ingredient>) = candidates
        .into_iter()
        .filter(|ingredient| ingredient.name.to_lowercase().contains(&needle))
        .partition(|ingredient| ingredient.name.to_lowercase().starts_with(&needle));

    ranked.extend(contained);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{actions::fixtures::ingredient, memory::MemoryStore};

    fn names(ingredients: &[Ingredient]) -> Vec<&str> {
        ingredients.iter().map(|i| i.name.as_str()).collect()
    }

    #[tokio::test]
    async fn prefix_matches_rank_first() {
        let store = MemoryStore::new();
        ingredient(&store, "Condensed milk", "ml").await;
        ingredient(&store, "Milk chocolate", "g").await;
        ingredient(&store, "Butter", "g").await;

        let found = search_ingredients("milk", &store).await.expect("search");
        assert_eq!(names(&found), vec!["Milk chocolate", "Condensed milk"]);
    }

    #[tokio::test]
    async fn cyrillic_search_ignores_case() {
        let store = MemoryStore::new();
        ingredient(&store, "Сгущённое молоко", "мл").await;
        ingredient(&store, "Мука", "г").await;
        ingredient(&store, "Миндаль", "г").await;

        let found = search_ingredients("МИ", &store).await.expect("search");
        assert_eq!(names(&found), vec!["Миндаль"]);

        let found = search_ingredients("мо", &store).await.expect("search");
        assert_eq!(names(&found), vec!["Сгущённое молоко"]);
    }

    #[tokio::test]
    async fn empty_query_returns_catalog() {
        let store = MemoryStore::new();
        ingredient(&store, "Salt", "g").await;
        ingredient(&store, "Pepper", "g").await;

        let found = search_ingredients("  ", &store).await.expect("search");
        assert_eq!(names(&found), vec!["Salt", "Pepper"]);
    }

    #[tokio::test]
    async fn same_name_with_other_unit_is_allowed() {
        let store = MemoryStore::new();
        create_ingredient("Sugar", "g", &store).await.expect("grams");
        create_ingredient("Sugar", "kg", &store).await.expect("kilos");

        let err = create_ingredient(" Sugar ", "g", &store).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let store = MemoryStore::new();
        let err = create_ingredient("   ", "g", &store).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidName)));
    }

    #[tokio::test]
    async fn missing_ingredient_is_unknown() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_ingredient(3, &store).await,
            Err(CoreError::UnknownReference {
                entity: Entity::Ingredient,
                id: 3
            })
        ));
    }

    #[test]
    fn ranking_keeps_storage_order_within_groups() {
        let candidates = ["Rice flour", "Flour", "Corn flour", "Flaxseed"]
            .iter()
            .enumerate()
            .map(|(id, name)| Ingredient {
                id: id as Uuid,
                name: name.to_string(),
                measurement_unit: String::from("g"),
            })
            .collect();

        let ranked = rank_by_prefix("FL", candidates);
        assert_eq!(
            names(&ranked),
            vec!["Flour", "Flaxseed", "Rice flour", "Corn flour"]
        );
    }
}
