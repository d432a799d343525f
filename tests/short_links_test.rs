mod utils;

use std::collections::HashSet;

use recipe_box_sdk::{
    actions::{recipe_link, resolve_short_link, ShortCodeGenerator},
    error::{Error, Missing},
    repository::RecipeRepository,
    schema::NewRecipe,
    Config, SHORT_CODE_ALPHABET,
};
use utils::{draft, world};

#[tokio::test]
async fn test_generated_codes_never_repeat() {
    let w = world().await;
    let generator = ShortCodeGenerator::new(2).unwrap();

    let mut seen = HashSet::new();
    for n in 0..150 {
        let code = generator.generate(&w.store).await.unwrap();
        assert!(seen.insert(code.clone()), "{code} handed out twice");

        w.store
            .create_recipe(NewRecipe {
                author_id: w.alice.user_id,
                short_code: code,
                draft: draft(&format!("Dish {n}"), &[(w.egg.id, 1)], &[w.dinner.id]),
            })
            .await
            .unwrap();
    }
    assert_eq!(w.store.short_code_count(2).await.unwrap(), 150);
}

#[tokio::test]
async fn test_exhausted_space_fails_with_capacity_error() {
    let w = world().await;
    let generator = ShortCodeGenerator::new(1).unwrap();

    for symbol in SHORT_CODE_ALPHABET {
        w.store
            .create_recipe(NewRecipe {
                author_id: w.alice.user_id,
                short_code: (*symbol as char).to_string(),
                draft: draft("Filler", &[(w.egg.id, 1)], &[w.dinner.id]),
            })
            .await
            .unwrap();
    }

    let err = generator.generate(&w.store).await.unwrap_err();
    assert!(matches!(err, Error::Capacity { .. }));
    assert_eq!(err.code(), 503);
}

#[tokio::test]
async fn test_codes_of_other_lengths_leave_the_space_free() {
    let w = world().await;
    for n in 0..SHORT_CODE_ALPHABET.len() {
        w.recipe(&w.alice, &format!("Dish {n}"), &[(w.egg.id, 1)], &[w.dinner.id])
            .await;
    }
    assert_eq!(w.store.short_code_count(6).await.unwrap(), 62);
    assert_eq!(w.store.short_code_count(1).await.unwrap(), 0);

    let generator = ShortCodeGenerator::new(1).unwrap();
    let code = generator.generate(&w.store).await.unwrap();
    assert_eq!(code.len(), 1);
}

#[tokio::test]
async fn test_taken_code_is_rejected_by_the_store() {
    let w = world().await;
    let row = w
        .recipe(&w.alice, "Toast", &[(w.flour.id, 1)], &[w.breakfast.id])
        .await;

    let err = w
        .store
        .create_recipe(NewRecipe {
            author_id: w.bob.user_id,
            short_code: row.recipe.short_code.clone(),
            draft: draft("Copy", &[(w.egg.id, 1)], &[w.dinner.id]),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Short code is already taken");
}

#[tokio::test]
async fn test_codes_resolve_to_their_recipe() {
    let w = world().await;
    let row = w
        .recipe(&w.alice, "Toast", &[(w.flour.id, 1)], &[w.breakfast.id])
        .await;

    let id = w
        .generator
        .resolve(&row.recipe.short_code, &w.store)
        .await
        .unwrap();
    assert_eq!(id, row.recipe.id);

    let err = resolve_short_link("zzzzzzzz", &w.store).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(Missing::ShortLink)));
}

#[tokio::test]
async fn test_recipe_link_uses_configured_base() {
    let w = world().await;
    let row = w
        .recipe(&w.alice, "Toast", &[(w.flour.id, 1)], &[w.breakfast.id])
        .await;
    let config = Config {
        short_link_base: String::from("https://recipes.example/"),
        ..Config::default()
    };

    let link = recipe_link(row.recipe.id, &config, &w.store).await.unwrap();
    assert_eq!(
        link,
        format!("https://recipes.example/s/{}", row.recipe.short_code)
    );

    assert!(recipe_link(404, &config, &w.store).await.is_err());
}
