use recipe_box_sdk::{
    actions::{create_tag, import_ingredients, list_tags, search_ingredients},
    error::{Conflict, Error},
    memory::MemoryStore,
    schema::{NewIngredient, NewTag},
};

fn ingredient(name: &str, unit: &str) -> NewIngredient {
    NewIngredient {
        name: name.to_string(),
        measurement_unit: unit.to_string(),
    }
}

#[tokio::test]
async fn test_import_skips_known_ingredients() {
    let store = MemoryStore::new();

    let inserted = import_ingredients(
        vec![ingredient("Milk", "ml"), ingredient("milk", "ml"), ingredient("Mint", "g")],
        &store,
    )
    .await
    .unwrap();
    assert_eq!(inserted, 3);

    let inserted = import_ingredients(
        vec![ingredient("Milk", "ml"), ingredient("Milk", "cup")],
        &store,
    )
    .await
    .unwrap();
    assert_eq!(inserted, 1);

    let err = import_ingredients(vec![ingredient("Salt", " ")], &store)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "ingredients", .. }));
}

#[tokio::test]
async fn test_search_is_a_case_insensitive_prefix_match() {
    let store = MemoryStore::new();
    import_ingredients(
        vec![
            ingredient("Milk", "ml"),
            ingredient("mint", "g"),
            ingredient("Almond milk", "ml"),
        ],
        &store,
    )
    .await
    .unwrap();

    let found = search_ingredients("MI", &store).await.unwrap();
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Milk", "mint"]);
}

#[tokio::test]
async fn test_tags_are_unique_and_slugs_validated() {
    let store = MemoryStore::new();
    let tag = |name: &str, slug: &str| NewTag {
        name: name.to_string(),
        slug: slug.to_string(),
    };

    create_tag(tag("Lunch", "lunch"), &store).await.unwrap();
    create_tag(tag("Breakfast", "breakfast"), &store)
        .await
        .unwrap();

    let err = create_tag(tag("Lunch", "midday"), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(Conflict::Tag)));

    let err = create_tag(tag("Brunch", "late breakfast"), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "slug", .. }));

    let names: Vec<String> = list_tags(&store)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["Breakfast", "Lunch"]);
}
