use foodgram_core::{
    actions::{
        add_recipe, aggregate, compose_recipe, create_ingredient, create_tag, create_user,
        follow, get_recipe, remove_recipe, render_shopping_list, search_ingredients,
        update_recipe,
    },
    error::{CoreError, ValidationError},
    jwt::Identity,
    memory::MemoryStore,
    schema::{
        CollectionKind, Ingredient, IngredientEntry, NewTag, NewUser, RecipeDraft, Tag, User,
        UserRole, Uuid,
    },
};

const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

async fn register(store: &MemoryStore, username: &str) -> User {
    create_user(
        NewUser {
            email: format!("{username}@example.com"),
            username: username.to_owned(),
            first_name: String::from("Test"),
            last_name: String::from("Cook"),
            role: UserRole::User,
        },
        store,
    )
    .await
    .expect("user")
}

async fn tag(store: &MemoryStore, name: &str, color: &str) -> Tag {
    create_tag(
        NewTag {
            name: name.to_owned(),
            color: color.to_owned(),
            slug: name.to_lowercase(),
        },
        store,
    )
    .await
    .expect("tag")
}

fn draft(cooking_time: i64, tags: &[&Tag], lines: &[(&Ingredient, i64)]) -> RecipeDraft {
    RecipeDraft {
        name: String::from("Pancakes"),
        text: String::from("Whisk, rest, fry."),
        cooking_time,
        image: IMAGE.to_owned(),
        tags: tags.iter().map(|tag| tag.id).collect(),
        ingredients: lines
            .iter()
            .map(|(ingredient, amount)| IngredientEntry {
                id: ingredient.id,
                amount: *amount,
            })
            .collect(),
    }
}

#[tokio::test]
async fn update_replaces_the_whole_recipe() {
    let store = MemoryStore::new();
    let author = register(&store, "author").await;
    let flour = create_ingredient("Flour", "g", &store).await.expect("flour");
    let egg = create_ingredient("Egg", "pcs", &store).await.expect("egg");
    let breakfast = tag(&store, "Breakfast", "#FFAA00").await;
    let quick = tag(&store, "Quick", "#00AAFF").await;

    let recipe = compose_recipe(
        author.id,
        draft(15, &[&breakfast], &[(&flour, 200), (&egg, 2)]),
        &store,
    )
    .await
    .expect("compose");

    update_recipe(
        recipe.id,
        draft(15, &[&breakfast, &quick], &[(&flour, 150)]),
        &store,
    )
    .await
    .expect("update");

    let view = get_recipe(recipe.id, &Identity::Anonymous, &store)
        .await
        .expect("read");
    assert_eq!(view.recipe.ingredients.len(), 1);
    assert_eq!(view.recipe.ingredients[0].amount, 150);
    assert_eq!(view.recipe.tags.len(), 2);
}

#[tokio::test]
async fn cooking_time_lower_bound() {
    let store = MemoryStore::new();
    let author = register(&store, "author").await;
    let salt = create_ingredient("Salt", "g", &store).await.expect("salt");
    let quick = tag(&store, "Quick", "#00AAFF").await;

    let err = compose_recipe(author.id, draft(0, &[&quick], &[(&salt, 1)]), &store)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::InvalidCookingTime)
    ));

    compose_recipe(author.id, draft(1, &[&quick], &[(&salt, 1)]), &store)
        .await
        .expect("one minute is enough");
}

#[tokio::test]
async fn duplicates_are_rejected() {
    let store = MemoryStore::new();
    let author = register(&store, "author").await;
    let salt = create_ingredient("Salt", "g", &store).await.expect("salt");
    let quick = tag(&store, "Quick", "#00AAFF").await;

    let err = compose_recipe(
        author.id,
        draft(5, &[&quick], &[(&salt, 1), (&salt, 2)]),
        &store,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::DuplicateIngredient)
    ));

    let err = compose_recipe(author.id, draft(5, &[&quick, &quick], &[(&salt, 1)]), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(ValidationError::DuplicateTag)));
}

#[tokio::test]
async fn shopping_list_from_the_cart() {
    let store = MemoryStore::new();
    let author = register(&store, "author").await;
    let shopper = register(&store, "shopper").await;
    let salt = create_ingredient("Salt", "g", &store).await.expect("salt");
    let sugar_g = create_ingredient("Sugar", "g", &store).await.expect("sugar g");
    let sugar_kg = create_ingredient("Sugar", "kg", &store).await.expect("sugar kg");
    let quick = tag(&store, "Quick", "#00AAFF").await;

    assert!(matches!(
        aggregate(shopper.id, &store).await,
        Err(CoreError::EmptyCart)
    ));

    let soup = compose_recipe(
        author.id,
        draft(30, &[&quick], &[(&salt, 5), (&sugar_g, 10)]),
        &store,
    )
    .await
    .expect("soup");
    let stew = compose_recipe(
        author.id,
        draft(40, &[&quick], &[(&salt, 3), (&sugar_kg, 2)]),
        &store,
    )
    .await
    .expect("stew");

    for recipe_id in [soup.id, stew.id] {
        add_recipe(shopper.id, CollectionKind::ShoppingCart, recipe_id, &store)
            .await
            .expect("cart");
    }

    let items = aggregate(shopper.id, &store).await.expect("aggregate");
    assert_eq!(
        render_shopping_list(&items),
        "Salt (g) - 8\nSugar (g) - 10\nSugar (kg) - 2\n"
    );
}

#[tokio::test]
async fn favorites_round_trip() {
    let store = MemoryStore::new();
    let author = register(&store, "author").await;
    let salt = create_ingredient("Salt", "g", &store).await.expect("salt");
    let quick = tag(&store, "Quick", "#00AAFF").await;
    let recipe = compose_recipe(author.id, draft(5, &[&quick], &[(&salt, 1)]), &store)
        .await
        .expect("recipe");

    add_recipe(author.id, CollectionKind::Favorite, recipe.id, &store)
        .await
        .expect("add");
    remove_recipe(author.id, CollectionKind::Favorite, recipe.id, &store)
        .await
        .expect("remove");

    assert!(matches!(
        remove_recipe(author.id, CollectionKind::Favorite, recipe.id, &store).await,
        Err(CoreError::NotPresent(CollectionKind::Favorite))
    ));
}

#[tokio::test]
async fn prefix_matches_come_first() {
    let store = MemoryStore::new();
    for name in ["Тмин", "Мидии", "Кумин", "миндаль"] {
        create_ingredient(name, "г", &store).await.expect("ingredient");
    }

    let found: Vec<String> = search_ingredients("ми", &store)
        .await
        .expect("search")
        .into_iter()
        .map(|ingredient| ingredient.name)
        .collect();
    assert_eq!(found, vec!["Мидии", "миндаль", "Тмин", "Кумин"]);
}

#[tokio::test]
async fn nobody_follows_themselves() {
    let store = MemoryStore::new();
    let ids: Vec<Uuid> = vec![
        register(&store, "first").await.id,
        register(&store, "second").await.id,
        404,
    ];

    for id in ids {
        assert!(matches!(
            follow(id, id, &store).await,
            Err(CoreError::SelfFollow)
        ));
    }
}
