use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::QueryError,
    pagination::Page,
    schema::{
        CartLine, CollectionKind, Ingredient, NewTag, NewUser, Recipe, RecipeContent,
        RecipeIngredient, RecipeQuery, RecipeSummary, Tag, User, Uuid,
    },
    store::Store,
};

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    author_id: Uuid,
    name: String,
    image: String,
    image_data: Vec<u8>,
    text: String,
    cooking_time: i32,
    pub_date: DateTime<Utc>,
}

impl RecipeRow {
    fn into_recipe(
        self,
        author: User,
        tags: Vec<Tag>,
        ingredients: Vec<RecipeIngredient>,
    ) -> Recipe {
        Recipe {
            id: self.id,
            author,
            name: self.name,
            image: self.image,
            image_data: self.image_data,
            text: self.text,
            cooking_time: self.cooking_time,
            pub_date: self.pub_date,
            tags,
            ingredients,
        }
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), QueryError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

async fn load_recipe(conn: &mut PgConnection, id: Uuid) -> Result<Option<Recipe>, QueryError> {
    let row: Option<RecipeRow> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let author: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(row.author_id)
        .fetch_one(&mut *conn)
        .await?;

    let tags: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let ingredients: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_recipe(author, tags, ingredients)))
}

/// Drops the recipe's ingredient lines and tag links and writes the new ones.
/// Callers run this inside the transaction that also touches the recipe row.
async fn write_contents(
    conn: &mut PgConnection,
    recipe_id: Uuid,
    content: &RecipeContent,
) -> Result<(), QueryError> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if !content.ingredients.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
        );
        query_builder.push_values(content.ingredients.iter(), |mut b, line| {
            b.push_bind(recipe_id)
                .push_bind(line.ingredient_id)
                .push_bind(line.amount);
        });
        query_builder.build().execute(&mut *conn).await?;
    }

    if !content.tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query_builder.push_values(content.tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query_builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

fn push_recipe_filters(query_builder: &mut QueryBuilder<'_, Postgres>, query: &RecipeQuery) {
    query_builder.push(" WHERE TRUE");

    if let Some(author) = query.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !query.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(query.tags.clone())
            .push("))");
    }
    for (user_id, kind) in [
        (query.favorited_by, CollectionKind::Favorite),
        (query.in_cart_of, CollectionKind::ShoppingCart),
    ] {
        if let Some(user_id) = user_id {
            query_builder
                .push(
                    " AND EXISTS (SELECT 1 FROM collection_recipes cr \
                     INNER JOIN collections c ON c.id = cr.collection_id \
                     WHERE cr.recipe_id = r.id AND c.user_id = ",
                )
                .push_bind(user_id)
                .push(" AND c.kind = ")
                .push_bind(kind)
                .push(")");
        }
    }
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, QueryError> {
        let row: Option<User> = sqlx::query_as(
            "
            INSERT INTO users (email, username, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING RETURNING *;
        ",
        )
        .bind(user.email)
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, QueryError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, QueryError> {
        let row: Option<Ingredient> = sqlx::query_as(
            "
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING RETURNING *;
        ",
        )
        .bind(name)
        .bind(measurement_unit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, QueryError> {
        let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn filter_ingredients(&self, fragment: &str) -> Result<Vec<Ingredient>, QueryError> {
        let rows: Vec<Ingredient> =
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY id")
                .bind(like_pattern(fragment))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Option<Tag>, QueryError> {
        let row: Option<Tag> = sqlx::query_as(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
        )
        .bind(tag.name)
        .bind(tag.color)
        .bind(tag.slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, QueryError> {
        let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, QueryError> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn existing_tag_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, QueryError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn insert_recipe(
        &self,
        author_id: Uuid,
        content: &RecipeContent,
    ) -> Result<Recipe, QueryError> {
        let mut tx = self.pool.begin().await?;

        let id: (Uuid,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, image, image_data, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(content.name.as_str())
        .bind(content.image.name.as_str())
        .bind(content.image.data.as_slice())
        .bind(content.text.as_str())
        .bind(content.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        write_contents(&mut tx, id.0, content).await?;

        let recipe = load_recipe(&mut tx, id.0)
            .await?
            .ok_or_else(|| QueryError::new(format!("Recipe {} vanished after insert", id.0)))?;

        tx.commit().await?;

        Ok(recipe)
    }

    async fn replace_recipe(
        &self,
        id: Uuid,
        content: &RecipeContent,
    ) -> Result<Option<Recipe>, QueryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "
            UPDATE recipes SET name = $1, image = $2, image_data = $3, text = $4, cooking_time = $5
            WHERE id = $6
        ",
        )
        .bind(content.name.as_str())
        .bind(content.image.name.as_str())
        .bind(content.image.data.as_slice())
        .bind(content.text.as_str())
        .bind(content.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        write_contents(&mut tx, id, content).await?;
        let recipe = load_recipe(&mut tx, id).await?;

        tx.commit().await?;

        Ok(recipe)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        load_recipe(&mut conn, id).await
    }

    async fn get_recipe_summary(&self, id: Uuid) -> Result<Option<RecipeSummary>, QueryError> {
        let row: Option<RecipeSummary> =
            sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row)
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, QueryError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_recipes(
        &self,
        query: &RecipeQuery,
        page: Page,
    ) -> Result<(Vec<Recipe>, i64), QueryError> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
        push_recipe_filters(&mut count_builder, query);
        let total: (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;

        let mut id_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.id FROM recipes r");
        push_recipe_filters(&mut id_builder, query);
        id_builder
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let ids: Vec<(Uuid,)> = id_builder.build_query_as().fetch_all(&self.pool).await?;

        let mut conn = self.pool.acquire().await?;
        let mut recipes = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(recipe) = load_recipe(&mut conn, id).await? {
                recipes.push(recipe);
            }
        }

        Ok((recipes, total.0))
    }

    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeSummary>, QueryError> {
        let rows: Vec<RecipeSummary> = sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1
            ORDER BY pub_date DESC, id DESC
            LIMIT $2
        ",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, QueryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn ensure_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Uuid, QueryError> {
        sqlx::query(
            "INSERT INTO collections (user_id, kind) VALUES ($1, $2) ON CONFLICT (user_id, kind) DO NOTHING",
        )
        .bind(user_id)
        .bind(kind)
        .execute(&self.pool)
        .await?;

        let id: (Uuid,) =
            sqlx::query_as("SELECT id FROM collections WHERE user_id = $1 AND kind = $2")
                .bind(user_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;

        Ok(id.0)
    }

    async fn find_collection(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
    ) -> Result<Option<Uuid>, QueryError> {
        let id: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM collections WHERE user_id = $1 AND kind = $2")
                .bind(user_id)
                .bind(kind)
                .fetch_optional(&self.pool)
                .await?;

        Ok(id.map(|row| row.0))
    }

    async fn insert_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        let result = sqlx::query(
            "INSERT INTO collection_recipes (collection_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(collection_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_membership(
        &self,
        collection_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        let result =
            sqlx::query("DELETE FROM collection_recipes WHERE collection_id = $1 AND recipe_id = $2")
                .bind(collection_id)
                .bind(recipe_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn collection_recipe_ids(&self, collection_id: Uuid) -> Result<Vec<Uuid>, QueryError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT recipe_id FROM collection_recipes WHERE collection_id = $1")
                .bind(collection_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn collection_contains(
        &self,
        user_id: Uuid,
        kind: CollectionKind,
        recipe_id: Uuid,
    ) -> Result<bool, QueryError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "
            SELECT cr.recipe_id FROM collection_recipes cr
            INNER JOIN collections c ON c.id = cr.collection_id
            WHERE c.user_id = $1 AND c.kind = $2 AND cr.recipe_id = $3
        ",
        )
        .bind(user_id)
        .bind(kind)
        .bind(recipe_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn ingredient_lines(&self, recipe_ids: &[Uuid]) -> Result<Vec<CartLine>, QueryError> {
        let rows: Vec<CartLine> = sqlx::query_as(
            "
            SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
        ",
        )
        .bind(recipe_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (subscriber_id, target_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(subscriber_id)
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_subscription(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND target_id = $2")
                .bind(subscriber_id)
                .bind(target_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(
        &self,
        subscriber_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, QueryError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM subscriptions WHERE subscriber_id = $1 AND target_id = $2",
        )
        .bind(subscriber_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn list_following(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError> {
        let rows: Vec<User> = sqlx::query_as(
            "
            SELECT u.* FROM subscriptions s
            INNER JOIN users u ON u.id = s.target_id
            WHERE s.subscriber_id = $1
            ORDER BY u.id
            LIMIT $2 OFFSET $3
        ",
        )
        .bind(subscriber_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
                .bind(subscriber_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows, total.0))
    }

    async fn list_followers(
        &self,
        target_id: Uuid,
        page: Page,
    ) -> Result<(Vec<User>, i64), QueryError> {
        let rows: Vec<User> = sqlx::query_as(
            "
            SELECT u.* FROM subscriptions s
            INNER JOIN users u ON u.id = s.subscriber_id
            WHERE s.target_id = $1
            ORDER BY u.id
            LIMIT $2 OFFSET $3
        ",
        )
        .bind(target_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE target_id = $1")
                .bind(target_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows, total.0))
    }
}
