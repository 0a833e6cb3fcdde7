use std::collections::BTreeMap;

use log::debug;
use warp::Reply;

use crate::{
    constants::SHOPPING_LIST_FILENAME,
    error::CoreError,
    schema::{CartLine, CollectionKind, ShoppingListItem, Uuid},
    store::Store,
};

/// Totals every ingredient line of the recipes in the user's shopping cart,
/// grouped by (name, measurement unit). Sorted by name, then unit.
pub async fn aggregate<S: Store + ?Sized>(
    user_id: Uuid,
    store: &S,
) -> Result<Vec<ShoppingListItem>, CoreError> {
    let Some(cart_id) = store
        .find_collection(user_id, CollectionKind::ShoppingCart)
        .await?
    else {
        return Err(CoreError::EmptyCart);
    };

    let recipe_ids = store.collection_recipe_ids(cart_id).await?;
    if recipe_ids.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let lines = store.ingredient_lines(&recipe_ids).await?;
    let items = group_lines(lines);

    debug!(
        "Shopping list of user {user_id}: {} recipes, {} items",
        recipe_ids.len(),
        items.len()
    );
    Ok(items)
}

/// Same name in different units stays separate. Items are ordered by name
/// ignoring case, then by unit.
pub fn group_lines(lines: impl IntoIterator<Item = CartLine>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String, String), i64> = BTreeMap::new();
    for line in lines {
        let key = (line.name.to_lowercase(), line.name, line.measurement_unit);
        *totals.entry(key).or_default() += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((_, name, measurement_unit), total_amount)| ShoppingListItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Plain-text download, one `name (unit) - total` line per item.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{} ({}) - {}\n",
                item.name, item.measurement_unit, item.total_amount
            )
        })
        .collect()
}

/// The rendered list served as a `shopping_cart.txt` attachment.
pub fn shopping_list_reply(items: &[ShoppingListItem]) -> impl Reply {
    warp::reply::with_header(
        render_shopping_list(items),
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
}
