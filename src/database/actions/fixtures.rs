use crate::{
    memory::MemoryStore,
    schema::{Ingredient, IngredientEntry, NewTag, NewUser, RecipeDraft, Tag, User, UserRole, Uuid},
    store::Store,
};

/// Eight PNG signature bytes.
pub(crate) const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

pub(crate) struct Kitchen {
    pub store: MemoryStore,
    pub author: User,
    pub reader: User,
    pub flour: Ingredient,
    pub egg: Ingredient,
    pub salt: Ingredient,
    pub sugar_g: Ingredient,
    pub sugar_kg: Ingredient,
    pub breakfast: Tag,
    pub quick: Tag,
}

pub(crate) async fn user(store: &MemoryStore, username: &str) -> User {
    store
        .create_user(NewUser {
            email: format!("{username}@example.com"),
            username: username.to_owned(),
            first_name: username.to_owned(),
            last_name: String::from("Cook"),
            role: UserRole::User,
        })
        .await
        .expect("create user")
        .expect("unique user")
}

pub(crate) async fn ingredient(store: &MemoryStore, name: &str, unit: &str) -> Ingredient {
    store
        .create_ingredient(name, unit)
        .await
        .expect("create ingredient")
        .expect("unique ingredient")
}

async fn tag(store: &MemoryStore, name: &str, color: &str, slug: &str) -> Tag {
    store
        .create_tag(NewTag {
            name: name.to_owned(),
            color: color.to_owned(),
            slug: slug.to_owned(),
        })
        .await
        .expect("create tag")
        .expect("unique tag")
}

pub(crate) async fn kitchen() -> Kitchen {
    let store = MemoryStore::new();

    let author = user(&store, "author").await;
    let reader = user(&store, "reader").await;
    let flour = ingredient(&store, "Flour", "g").await;
    let egg = ingredient(&store, "Egg", "pcs").await;
    let salt = ingredient(&store, "Salt", "g").await;
    let sugar_g = ingredient(&store, "Sugar", "g").await;
    let sugar_kg = ingredient(&store, "Sugar", "kg").await;
    let breakfast = tag(&store, "Breakfast", "#FFAA00", "breakfast").await;
    let quick = tag(&store, "Quick", "#00AAFF", "quick").await;

    Kitchen {
        store,
        author,
        reader,
        flour,
        egg,
        salt,
        sugar_g,
        sugar_kg,
        breakfast,
        quick,
    }
}

pub(crate) fn draft(name: &str, tags: &[Uuid], ingredients: &[(Uuid, i64)]) -> RecipeDraft {
    RecipeDraft {
        name: name.to_owned(),
        text: String::from("Mix everything and bake."),
        cooking_time: 20,
        image: IMAGE.to_owned(),
        tags: tags.to_vec(),
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientEntry {
                id: *id,
                amount: *amount,
            })
            .collect(),
    }
}
