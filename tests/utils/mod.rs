//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use recipe_box_sdk::{
    actions::{create_recipe, ShortCodeGenerator},
    jwt::SessionData,
    memory::MemoryStore,
    repository::{CatalogRepository, UserRepository},
    schema::{Id, Ingredient, IngredientInput, NewIngredient, NewTag, NewUser, RecipeDraft, RecipeRow, Tag, User, UserRole},
};

/// A store seeded with three users and a small catalog.
pub struct World {
    pub store: MemoryStore,
    pub generator: ShortCodeGenerator,
    pub alice: SessionData,
    pub bob: SessionData,
    pub admin: SessionData,
    pub sugar: Ingredient,
    pub flour: Ingredient,
    pub egg: Ingredient,
    pub breakfast: Tag,
    pub dinner: Tag,
}

pub fn session(user: &User) -> SessionData {
    SessionData {
        user_id: user.id,
        username: user.username.to_owned(),
        role: user.role,
        is_admin: user.role == UserRole::Admin,
    }
}

pub async fn user(store: &MemoryStore, username: &str, role: UserRole) -> User {
    store
        .insert_user(NewUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: String::from("Tester"),
            password: String::from("not-a-real-hash"),
            role,
        })
        .await
        .unwrap()
}

async fn ingredient(store: &MemoryStore, name: &str, unit: &str) -> Ingredient {
    store
        .insert_ingredients(vec![NewIngredient {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }])
        .await
        .unwrap();
    store
        .search_ingredients(name)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.name == name && i.measurement_unit == unit)
        .unwrap()
}

async fn tag(store: &MemoryStore, name: &str) -> Tag {
    store
        .insert_tag(NewTag {
            name: name.to_string(),
            slug: name.to_lowercase(),
        })
        .await
        .unwrap()
}

pub async fn world() -> World {
    let store = MemoryStore::new();

    let alice = session(&user(&store, "alice", UserRole::User).await);
    let bob = session(&user(&store, "bob", UserRole::User).await);
    let admin = session(&user(&store, "root", UserRole::Admin).await);

    let sugar = ingredient(&store, "sugar", "g").await;
    let flour = ingredient(&store, "Flour", "g").await;
    let egg = ingredient(&store, "egg", "pcs").await;

    let breakfast = tag(&store, "Breakfast").await;
    let dinner = tag(&store, "Dinner").await;

    World {
        store,
        generator: ShortCodeGenerator::new(6).unwrap(),
        alice,
        bob,
        admin,
        sugar,
        flour,
        egg,
        breakfast,
        dinner,
    }
}

pub fn draft(name: &str, ingredients: &[(Id, i32)], tags: &[Id]) -> RecipeDraft {
    RecipeDraft {
        name: name.to_string(),
        image: format!("recipes/images/{}.png", name.to_lowercase()),
        text: String::from("Mix everything together."),
        cooking_time: 15,
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientInput {
                id: *id,
                amount: *amount,
            })
            .collect(),
        tags: tags.to_vec(),
    }
}

impl World {
    pub async fn recipe(
        &self,
        author: &SessionData,
        name: &str,
        ingredients: &[(Id, i32)],
        tags: &[Id],
    ) -> RecipeRow {
        create_recipe(
            draft(name, ingredients, tags),
            &self.generator,
            author,
            &self.store,
        )
        .await
        .unwrap()
    }
}
