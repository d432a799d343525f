use std::collections::HashMap;

use serde::Serialize;
use warp::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::{
    constants::{SHOPPING_LIST_FILENAME, SHOPPING_LIST_HEADER},
    error::Error,
    repository::{CatalogRepository, RelationRepository},
    schema::{Id, Ingredient, IngredientAmount, RelationKind, ShoppingListLine},
};

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    pub lines: Vec<ShoppingListLine>,
}

impl ShoppingList {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The downloadable report: a header, a blank line, then one numbered
    /// line per ingredient.
    pub fn render_text(&self) -> String {
        let mut text = format!("{SHOPPING_LIST_HEADER}\n\n");
        for (n, line) in self.lines.iter().enumerate() {
            text.push_str(&format!("{}. {line}\n", n + 1));
        }
        text
    }

    pub fn into_reply(self) -> impl warp::Reply {
        let reply = warp::reply::with_header(
            self.render_text(),
            CONTENT_TYPE,
            "text/plain; charset=utf-8",
        );
        warp::reply::with_header(
            reply,
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
        )
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Sums amounts per ingredient and orders the result by lower-cased name,
/// then unit, then id. Amounts for ingredients missing from `ingredients`
/// are dropped.
pub fn consolidate(amounts: &[IngredientAmount], ingredients: &[Ingredient]) -> ShoppingList {
    let mut totals: HashMap<Id, i64> = HashMap::new();
    for row in amounts {
        *totals.entry(row.ingredient_id).or_insert(0) += i64::from(row.amount);
    }

    let mut lines: Vec<(String, &Ingredient, i64)> = ingredients
        .iter()
        .filter_map(|ingredient| {
            totals
                .remove(&ingredient.id)
                .map(|total| (ingredient.name.to_lowercase(), ingredient, total))
        })
        .collect();
    lines.sort_by(|(a_key, a, _), (b_key, b, _)| {
        a_key
            .cmp(b_key)
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
            .then_with(|| a.id.cmp(&b.id))
    });

    ShoppingList {
        lines: lines
            .into_iter()
            .map(|(_, ingredient, total)| ShoppingListLine {
                name: capitalize(&ingredient.name),
                measurement_unit: ingredient.measurement_unit.to_owned(),
                total_amount: total,
            })
            .collect(),
    }
}

/// Consolidated ingredient totals over every recipe in the user's cart.
pub async fn aggregate_shopping_list<S: RelationRepository + CatalogRepository + ?Sized>(
    user_id: Id,
    store: &S,
) -> Result<ShoppingList, Error> {
    let recipe_ids = store
        .all_related_recipe_ids(RelationKind::ShoppingCart, user_id)
        .await?;
    if recipe_ids.is_empty() {
        return Ok(ShoppingList::default());
    }

    let amounts = store.ingredient_amounts(&recipe_ids).await?;

    let mut ingredient_ids: Vec<Id> = amounts.iter().map(|row| row.ingredient_id).collect();
    ingredient_ids.sort_unstable();
    ingredient_ids.dedup();
    let ingredients = store.get_ingredients(&ingredient_ids).await?;

    let list = consolidate(&amounts, &ingredients);
    log::trace!(
        "> Shopping list for user {user_id}: {} recipes, {} lines",
        recipe_ids.len(),
        list.lines.len()
    );
    Ok(list)
}
