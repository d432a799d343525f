mod utils;

use recipe_box_sdk::{
    actions::{add_to_shopping_cart, aggregate_shopping_list, remove_from_shopping_cart},
    repository::RecipeRepository,
    schema::ShoppingListLine,
};
use utils::world;

fn line(name: &str, unit: &str, total: i64) -> ShoppingListLine {
    ShoppingListLine {
        name: name.to_string(),
        measurement_unit: unit.to_string(),
        total_amount: total,
    }
}

#[tokio::test]
async fn test_cart_amounts_are_consolidated_per_ingredient() {
    let w = world().await;
    let r1 = w
        .recipe(&w.bob, "Syrup", &[(w.sugar.id, 2)], &[w.breakfast.id])
        .await;
    let r2 = w
        .recipe(
            &w.bob,
            "Meringue",
            &[(w.sugar.id, 3), (w.egg.id, 1)],
            &[w.dinner.id],
        )
        .await;

    add_to_shopping_cart(r1.recipe.id, &w.alice, &w.store)
        .await
        .unwrap();
    add_to_shopping_cart(r2.recipe.id, &w.alice, &w.store)
        .await
        .unwrap();

    let list = aggregate_shopping_list(w.alice.user_id, &w.store)
        .await
        .unwrap();
    assert_eq!(
        list.lines,
        vec![line("Egg", "pcs", 1), line("Sugar", "g", 5)]
    );
    assert_eq!(
        list.render_text(),
        "Shopping list:\n\n1. Egg (pcs) - 1\n2. Sugar (g) - 5\n"
    );
}

#[tokio::test]
async fn test_sorting_ignores_case() {
    let w = world().await;
    let r = w
        .recipe(
            &w.bob,
            "Cake",
            &[(w.sugar.id, 100), (w.flour.id, 250), (w.egg.id, 3)],
            &[w.dinner.id],
        )
        .await;
    add_to_shopping_cart(r.recipe.id, &w.alice, &w.store)
        .await
        .unwrap();

    let list = aggregate_shopping_list(w.alice.user_id, &w.store)
        .await
        .unwrap();
    let names: Vec<&str> = list.lines.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Egg", "Flour", "Sugar"]);
}

#[tokio::test]
async fn test_empty_cart_gives_empty_report() {
    let w = world().await;

    let list = aggregate_shopping_list(w.alice.user_id, &w.store)
        .await
        .unwrap();
    assert!(list.is_empty());
    assert_eq!(list.render_text(), "Shopping list:\n\n");
}

#[tokio::test]
async fn test_only_the_users_own_cart_counts() {
    let w = world().await;
    let r = w
        .recipe(&w.bob, "Omelette", &[(w.egg.id, 2)], &[w.breakfast.id])
        .await;
    add_to_shopping_cart(r.recipe.id, &w.bob, &w.store)
        .await
        .unwrap();

    let list = aggregate_shopping_list(w.alice.user_id, &w.store)
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_removed_and_deleted_recipes_drop_out() {
    let w = world().await;
    let kept = w
        .recipe(&w.bob, "Omelette", &[(w.egg.id, 2)], &[w.breakfast.id])
        .await;
    let removed = w
        .recipe(&w.bob, "Syrup", &[(w.sugar.id, 2)], &[w.breakfast.id])
        .await;
    let deleted = w
        .recipe(&w.bob, "Bread", &[(w.flour.id, 500)], &[w.dinner.id])
        .await;

    for recipe in [&kept, &removed, &deleted] {
        add_to_shopping_cart(recipe.recipe.id, &w.alice, &w.store)
            .await
            .unwrap();
    }
    remove_from_shopping_cart(removed.recipe.id, &w.alice, &w.store)
        .await
        .unwrap();
    w.store.delete_recipe(deleted.recipe.id).await.unwrap();

    let list = aggregate_shopping_list(w.alice.user_id, &w.store)
        .await
        .unwrap();
    assert_eq!(list.lines, vec![line("Egg", "pcs", 2)]);
}
