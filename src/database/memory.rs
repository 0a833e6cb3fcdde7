use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::QueryError,
    pagination::Page,
    schema::{
        CartLine, CollectionKind, Ingredient, IngredientLine, NewTag, NewUser, Recipe,
        RecipeContent, RecipeIngredient, RecipeQuery, RecipeSummary, Tag, User, Uuid,
    },
    store::Store,
};

#[derive(Debug, Clone)]
struct RecipeRecord {
    author_id: Uuid,
    name: String,
    image: String,
    image_data: Vec<u8>,
    text: String,
    cooking_time: i32,
    pub_date: DateTime<Utc>,
}

impl RecipeRecord {
    fn summary(&self, id: Uuid) -> RecipeSummary {
        RecipeSummary {
            id,
            name: self.name.to_owned(),
            image: self.image.to_owned(),
            cooking_time: self.cooking_time,
        }
    }
}

#[derive(Default)]
struct Tables {
    last_id: Uuid,
    users: BTreeMap<Uuid, User>,
    ingredients: BTreeMap<Uuid, Ingredient>,
    tags: BTreeMap<Uuid, Tag>,
    recipes: BTreeMap<Uuid, RecipeRecord>,
    // Lines and tag links are keyed by the owning recipe.
    recipe_lines: BTreeMap<Uuid, Vec<IngredientLine>>,
    recipe_tags: BTreeMap<Uuid, Vec<Uuid>>,
    collections: BTreeMap<(Uuid, CollectionKind), Uuid>,
    memberships: BTreeMap<Uuid, Vec<Uuid>>,
    subscriptions: Vec<(Uuid, Uuid)>,
}

impl Tables {
    fn next_id(&mut self) -> Uuid {
        self.last_id += 1;
        self.last_id
    }

    fn assemble(&self, id: Uuid) -> Result<Option<Recipe>, QueryError> {
        let Some(record) = self.recipes.get(&id) else {
            return Ok(None);
        };
        let author = self
            .users
            .get(&record.author_id)
            .cloned()
            .ok_or_else(|| QueryError::new(format!("Recipe {id} has no author row")))?;

        let mut tags: Vec<Tag> = self
            .recipe_tags
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|tag_id| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by_key(|tag| tag.id);

        let ingredients = self
            .recipe_lines
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|line| {
                self.ingredients
                    .get(&line.ingredient_id)
                    .map(|ingredient| RecipeIngredient {
                        id: ingredient.id,
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: line.amount,
                    })
            })
            .collect();

        Ok(Some(Recipe {
            id,
            author,
            name: record.name.to_owned(),
            image: record.image.to_owned(),
            image_data: record.image_data.to_owned(),
            text: record.text.to_owned(),
            cooking_time: record.cooking_time,
            pub_date: record.pub_date,
            tags,
            ingredients,
        }))
    }

    fn write_contents(&mut self, id: Uuid, content: &RecipeContent) {
        self.recipe_lines.insert(id, content.ingredients.to_owned());
        self.recipe_tags.insert(id, content.tags.to_owned());
    }

    fn in_collection(&self, user_id: Uuid, kind: CollectionKind, recipe_id: Uuid) -> bool {
        self.collections
            .get(&(user_id, kind))
            .and_then(|collection_id| self.memberships.get(collection_id))
            .map(|recipes| recipes.contains(&recipe_id))
            .unwrap_or(false)
    }

    fn matches(&self, id: Uuid, record: &RecipeRecord, query: &RecipeQuery) -> bool {
        if query.author.is_some_and(|author| author != record.author_id) {
            return false;
        }
        if !query.tags.is_empty() {
            let tagged = self.recipe_tags.get(&id).into_iter().flatten().any(|tag_id| {
                self.tags
                    .get(tag_id)
                    .is_some_and(|tag| query.tags.contains(&tag.slug))
            });
            if !tagged {
                return false;
            }
        }
        if let Some(user_id) = query.favorited_by {
            if !self.in_collection(user_id, CollectionKind::Favorite, id) {
                return false;
            }
        }
        if let Some(user_id) = query.in_cart_of {
            if !self.in_collection(user_id, CollectionKind::ShoppingCart, id) {
                return false;
            }
        }
        true
    }

    fn newest_first(&self) -> Vec<(Uuid, &RecipeRecord)> {
        let mut recipes: Vec<(Uuid, &RecipeRecord)> =
            self.recipes.iter().map(|(id, record)| (*id, record)).collect();
        recipes.sort_by(|(a_id, a), (b_id, b)| {
            b.pub_date.cmp(&a.pub_date).then_with(|| b_id.cmp(a_id))
        });
        recipes
    }

    fn users_page(&self, ids: Vec<Uuid>, page: Page) -> (Vec<User>, i64) {
        let total = ids.len() as i64;
        let users = ids
            .into_iter()
            .filter_map(|id| self.users.get(&id).cloned())
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        (users, total)
    }
}

/// In-process store holding every table behind one lock, so each call is
/// atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, QueryError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Ok(None);
        }

        let id = tables.next_id();
        let row = User {
            id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        };
        tables.users.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, QueryError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, QueryError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .ingredients
            .values()
            .any(|i| i.name == name && i.measurement_unit == measurement_unit);
        if taken {
            return Ok(None);
        }

        let id = tables.next_id();
        let row = Ingredient {
            id,
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
        };
        tables.ingredients.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, QueryError> {
        Ok(self.tables.lock().await.ingredients.get(&id).cloned())
    }

    async fn filter_ingredients(&self, fragment: &str) -> Result<Vec<Ingredient>, QueryError> {
        let fragment = fragment.to_lowercase();
        let tables = self.tables.lock().await;

        Ok(tables
            .ingredients
            .values()
            .filter(|i| i.name.to_lowercase().contains(&fragment))
            .cloned()
            .collect())
    }

    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.ingredients.contains_key(id))
            .collect())
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Option<Tag>, QueryError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .tags
            .values()
            .any(|t| t.name == tag.name || t.color == tag.color || t.slug == tag.slug);
        if taken {
            return Ok(None);
        }

        let id = tables.next_id();
        let row = Tag {
            id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        };
        tables.tags.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, QueryError> {
        Ok(self.tables.lock().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, QueryError> {
        Ok(self.tables.lock().await.tags.values().cloned().collect())
    }

    async fn existing_tag_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.tags.contains_key(id))
            .collect())
    }

    async fn insert_recipe(
        &self,
        author_id: Uuid,
        content: &RecipeContent,
    ) -> Result<Recipe, QueryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&author_id) {
            return Err(QueryError::new(format!("No user row {author_id}")));
        }

        let id = tables.next_id();
        tables.recipes.insert(
            id,
            RecipeRecord {
                author_id,
                name: content.name.to_owned(),
                image: content.image.name.to_owned(),
                image_data: content.image.data.to_owned(),
                text: content.text.to_owned(),
                cooking_time: content.cooking_time,
                pub_date: Utc::now(),
            },
        );
        tables.write_contents(id, content);

        tables
            .assemble(id)?
            .ok_or_else(|| QueryError::new(format!("Recipe {id} vanished after insert")))
    }

    async fn replace_recipe(
        &self,
        id: Uuid,
        content: &RecipeContent,
    ) -> Result<Option<Recipe>, QueryError> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.recipes.get_mut(&id) else {
            return Ok(None);
        };
        record.name = content.name.to_owned();
        record.image = content.image.name.to_owned();
        record.image_data = content.image.data.to_owned();
        record.text = content.text.to_owned();
        record.cooking_time = content.cooking_time;

        tables.write_contents(id, content);
        tables.assemble(id)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, QueryError> {
        self.tables.lock().await.assemble(id)
    }

    async fn get_recipe_summary(&self, id: Uuid) -> Result<Option<RecipeSummary>, QueryError> {
        let tables = self.tables.lock().await;
        Ok(tables.recipes.get(&id).map(|record| record.summary(id)))
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, QueryError> {
        let mut tables = self.tables.lock().await;
        if tables.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.recipe_lines.remove(&id);
        tables.recipe_tags.remove(&id);
        for recipes in tables.memberships.values_mut() {
            recipes.retain(|recipe_id| *recipe_id != id);
        }
        Ok(true)
    }

    async fn list_recipes(
        &self,
        query: &RecipeQuery,
        page: Page,
    ) -> Result<(Vec<Recipe>, i64), QueryError> {
        let tables = self.tables.lock().await;
        let ids: Vec<Uuid> = tables
            .newest_first()
            .into_iter()
            .filter(|(id, record)| tables.matches(*id, record, query))
            .map(|(id, _)| id)
            .collect();
        let total = ids.len() as i64;

        let mut recipes = Vec::new();
        for id in ids
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
        {
            if let Some(recipe) = tables.assemble(id)? {
                recipes.push(recipe);
            }
        }
        Ok((recipes, total))
    }

    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeSummary>, QueryError> {
        let tables = self.tables.lock().await;
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(tables
            .newest_first()
            .into_iter()
            .filter(|(_, record)| record.author_id == author_id)
            .take(limit)
            .map(|(id, record)| record.summary(id))
            .collect())
    }

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, QueryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .recipes
            .values()
            .filter(|record| record.author_id == author_id)
            .count() as i64)
    }

    async fn ensure_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Uuid, QueryError> {
        let mut tables = self.tables.lock().await;
        if let Some(id) = tables.collections.get(&(user_id, kind)) {
            return Ok(*id);
        }

        let id = tables.next_id();
        tables.collections.insert((user_id, kind), id);
        tables.memberships.insert(id, Vec::new());
        Ok(id)
    }

    async fn find_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Option<Uuid>, QueryError> {
        Ok(self
            .tables
            .lock()
            .await
            .collections
            .get(&(user_id, kind))
            .copied())
    }

    async fn insert_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        let mut tables = self.tables.lock().await;
        let recipes = tables.memberships.entry(collection_id).or_default();
        if recipes.contains(&recipe_id) {
            return Ok(false);
        }
        recipes.push(recipe_id);
        Ok(true)
    }

    async fn delete_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        let mut tables = self.tables.lock().await;
        let Some(recipes) = tables.memberships.get_mut(&collection_id) else {
            return Ok(false);
        };
        let before = recipes.len();
        recipes.retain(|id| *id != recipe_id);
        Ok(recipes.len() < before)
    }

    async fn collection_recipe_ids(&self, collection_id: Uuid) -> Result<Vec<Uuid>, QueryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .memberships
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn collection_contains(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        Ok(self
            .tables
            .lock()
            .await
            .in_collection(user_id, kind, recipe_id))
    }

    async fn ingredient_lines(&self, recipe_ids: &[Uuid]) -> Result<Vec<CartLine>, QueryError> {
        let tables = self.tables.lock().await;
        Ok(recipe_ids
            .iter()
            .filter_map(|id| tables.recipe_lines.get(id))
            .flatten()
            .filter_map(|line| {
                tables
                    .ingredients
                    .get(&line.ingredient_id)
                    .map(|ingredient| CartLine {
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: line.amount,
                    })
            })
            .collect())
    }

    async fn insert_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        let mut tables = self.tables.lock().await;
        if subscriber_id == target_id {
            return Err(QueryError::new(String::from(
                "subscriptions_no_self_follow check violated",
            )));
        }
        if let Some(missing) = [subscriber_id, target_id]
            .into_iter()
            .find(|id| !tables.users.contains_key(id))
        {
            return Err(QueryError::new(format!("No user row {missing}")));
        }
        if tables.subscriptions.contains(&(subscriber_id, target_id)) {
            return Ok(false);
        }
        tables.subscriptions.push((subscriber_id, target_id));
        Ok(true)
    }

    async fn delete_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.subscriptions.len();
        tables
            .subscriptions
            .retain(|edge| *edge != (subscriber_id, target_id));
        Ok(tables.subscriptions.len() < before)
    }

    async fn is_following(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        Ok(self
            .tables
            .lock()
            .await
            .subscriptions
            .contains(&(subscriber_id, target_id)))
    }

    async fn list_following(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError> {
        let tables = self.tables.lock().await;
        let mut ids: Vec<Uuid> = tables
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == subscriber_id)
            .map(|(_, target)| *target)
            .collect();
        ids.sort_unstable();
        Ok(tables.users_page(ids, page))
    }

    async fn list_followers(
        &self,
        target_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError> {
        let tables = self.tables.lock().await;
        let mut ids: Vec<Uuid> = tables
            .subscriptions
            .iter()
            .filter(|(_, target)| *target == target_id)
            .map(|(subscriber, _)| *subscriber)
            .collect();
        ids.sort_unstable();
        Ok(tables.users_page(ids, page))
    }
}
