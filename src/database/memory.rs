//! In-process [`Store`](super::repository::Store) with the same semantics as
//! the Postgres one. Used by the test-suite and by local tooling.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use chrono::Utc;

use super::{
    error::{Conflict, Error, Missing},
    repository::{
        CatalogRepository, RecipeRepository, RelationRepository, SubscriptionRepository,
        UserRepository,
    },
    schema::{
        Id, Ingredient, IngredientAmount, IngredientInput, LinkedRecipeTag, NewIngredient,
        NewRecipe, NewTag, NewUser, Recipe, RecipeDraft, RecipeFilter, RecipePart, RelationKind,
        Subscription, Tag, User,
    },
};

#[derive(Clone, Default)]
struct State {
    last_id: Id,
    users: BTreeMap<Id, User>,
    ingredients: BTreeMap<Id, Ingredient>,
    tags: BTreeMap<Id, Tag>,
    recipes: BTreeMap<Id, Recipe>,
    parts: Vec<(Id, IngredientInput)>,
    recipe_tags: Vec<(Id, Id)>,
    relations: BTreeSet<(RelationKind, Id, Id)>,
    subscriptions: Vec<Subscription>,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.last_id += 1;
        self.last_id
    }

    fn add_parts(&mut self, recipe_id: Id, parts: &[IngredientInput]) -> Result<(), Error> {
        for part in parts {
            if !self.ingredients.contains_key(&part.id) {
                return Err(Error::validation(
                    "ingredients",
                    format!("Ingredient {} doesn't exist", part.id),
                ));
            }
            if self
                .parts
                .iter()
                .any(|(r, p)| *r == recipe_id && p.id == part.id)
            {
                return Err(Error::validation(
                    "ingredients",
                    format!("Ingredient {} is listed twice", part.id),
                ));
            }
            self.parts.push((recipe_id, *part));
        }
        Ok(())
    }

    fn add_tags(&mut self, recipe_id: Id, tags: &[Id]) -> Result<(), Error> {
        for tag in tags {
            if !self.tags.contains_key(tag) {
                return Err(Error::validation(
                    "tags",
                    format!("Tag {tag} doesn't exist"),
                ));
            }
            if self.recipe_tags.contains(&(recipe_id, *tag)) {
                return Err(Error::validation("tags", format!("Tag {tag} is listed twice")));
            }
            self.recipe_tags.push((recipe_id, *tag));
        }
        Ok(())
    }

    fn has_relation(&self, kind: RelationKind, user: Id, recipe: Id) -> bool {
        self.relations.contains(&(kind, user, recipe))
    }
}

fn newest_first(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    relation_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many relation membership queries have been served so far.
    pub fn relation_lookups(&self) -> usize {
        self.relation_lookups.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` against a copy of the state and publishes it only on success.
    fn transaction<T>(&self, f: impl FnOnce(&mut State) -> Result<T, Error>) -> Result<T, Error> {
        let mut state = self.state();
        let mut working = state.clone();
        let value = f(&mut working)?;
        *state = working;
        Ok(value)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, Error> {
        self.transaction(|state| {
            if state.users.values().any(|u| u.username == user.username) {
                return Err(Error::Conflict(Conflict::Username));
            }
            if state.users.values().any(|u| u.email == user.email) {
                return Err(Error::Conflict(Conflict::Email));
            }
            let id = state.next_id();
            let row = User {
                id,
                email: user.email,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                password: user.password,
                role: user.role,
                avatar: None,
            };
            state.users.insert(id, row.clone());
            Ok(row)
        })
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_users(&self, ids: &[Id]) -> Result<Vec<User>, Error> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn set_avatar(&self, id: Id, avatar: Option<String>) -> Result<(), Error> {
        self.transaction(|state| match state.users.get_mut(&id) {
            Some(user) => {
                user.avatar = avatar;
                Ok(())
            }
            None => Err(Error::NotFound(Missing::User)),
        })
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error> {
        self.transaction(|state| {
            let mut inserted = 0;
            for ingredient in ingredients {
                let exists = state.ingredients.values().any(|i| {
                    i.name == ingredient.name && i.measurement_unit == ingredient.measurement_unit
                });
                if exists {
                    continue;
                }
                let id = state.next_id();
                state.ingredients.insert(
                    id,
                    Ingredient {
                        id,
                        name: ingredient.name,
                        measurement_unit: ingredient.measurement_unit,
                    },
                );
                inserted += 1;
            }
            Ok(inserted)
        })
    }

    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.ingredients.get(id).cloned())
            .collect())
    }

    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, Error> {
        let prefix = prefix.to_lowercase();
        let mut rows: Vec<Ingredient> = self
            .state()
            .ingredients
            .values()
            .filter(|i| i.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn insert_tag(&self, tag: NewTag) -> Result<Tag, Error> {
        self.transaction(|state| {
            if state
                .tags
                .values()
                .any(|t| t.name == tag.name || t.slug == tag.slug)
            {
                return Err(Error::Conflict(Conflict::Tag));
            }
            let id = state.next_id();
            let row = Tag {
                id,
                name: tag.name,
                slug: tag.slug,
            };
            state.tags.insert(id, row.clone());
            Ok(row)
        })
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let mut tags: Vec<Tag> = self.state().tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn create_recipe(&self, recipe: NewRecipe) -> Result<Recipe, Error> {
        self.transaction(|state| {
            if !state.users.contains_key(&recipe.author_id) {
                return Err(Error::NotFound(Missing::User));
            }
            if state
                .recipes
                .values()
                .any(|r| r.short_code == recipe.short_code)
            {
                return Err(Error::Conflict(Conflict::ShortCode));
            }

            let id = state.next_id();
            let draft = recipe.draft;
            let row = Recipe {
                id,
                author_id: recipe.author_id,
                name: draft.name,
                image: draft.image,
                text: draft.text,
                cooking_time: draft.cooking_time,
                short_code: recipe.short_code,
                pub_date: Utc::now(),
            };
            state.recipes.insert(id, row.clone());
            state.add_parts(id, &draft.ingredients)?;
            state.add_tags(id, &draft.tags)?;
            Ok(row)
        })
    }

    async fn replace_recipe(&self, id: Id, draft: RecipeDraft) -> Result<Recipe, Error> {
        self.transaction(|state| {
            let row = match state.recipes.get_mut(&id) {
                Some(row) => row,
                None => return Err(Error::NotFound(Missing::Recipe)),
            };
            row.name = draft.name;
            row.image = draft.image;
            row.text = draft.text;
            row.cooking_time = draft.cooking_time;
            let row = row.clone();

            state.parts.retain(|(recipe_id, _)| *recipe_id != id);
            state.add_parts(id, &draft.ingredients)?;
            state.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
            state.add_tags(id, &draft.tags)?;
            Ok(row)
        })
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        self.transaction(|state| {
            if state.recipes.remove(&id).is_none() {
                return Ok(false);
            }
            state.parts.retain(|(recipe_id, _)| *recipe_id != id);
            state.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
            state.relations.retain(|(_, _, recipe_id)| *recipe_id != id);
            Ok(true)
        })
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        Ok(self.state().recipes.get(&id).cloned())
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, Error> {
        let state = self.state();
        let tag_ids: HashSet<Id> = state
            .tags
            .values()
            .filter(|t| filter.tags.contains(&t.slug))
            .map(|t| t.id)
            .collect();

        let mut rows: Vec<Recipe> = state
            .recipes
            .values()
            .filter(|r| filter.author.map_or(true, |author| r.author_id == author))
            .filter(|r| {
                filter.tags.is_empty()
                    || state
                        .recipe_tags
                        .iter()
                        .any(|(recipe_id, tag)| *recipe_id == r.id && tag_ids.contains(tag))
            })
            .filter(|r| match (viewer, filter.is_favorited) {
                (Some(viewer), Some(flag)) => {
                    state.has_relation(RelationKind::Favorite, viewer, r.id) == flag
                }
                _ => true,
            })
            .filter(|r| match (viewer, filter.is_in_shopping_cart) {
                (Some(viewer), Some(flag)) => {
                    state.has_relation(RelationKind::ShoppingCart, viewer, r.id) == flag
                }
                _ => true,
            })
            .cloned()
            .collect();

        newest_first(&mut rows);
        Ok(rows)
    }

    async fn list_recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, Error> {
        let state = self.state();
        Ok(state
            .parts
            .iter()
            .filter(|(recipe_id, _)| recipe_ids.contains(recipe_id))
            .filter_map(|(recipe_id, part)| {
                state.ingredients.get(&part.id).map(|i| RecipePart {
                    recipe_id: *recipe_id,
                    ingredient_id: i.id,
                    name: i.name.to_owned(),
                    measurement_unit: i.measurement_unit.to_owned(),
                    amount: part.amount,
                })
            })
            .collect())
    }

    async fn list_recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedRecipeTag>, Error> {
        let state = self.state();
        Ok(state
            .recipe_tags
            .iter()
            .filter(|(recipe_id, _)| recipe_ids.contains(recipe_id))
            .filter_map(|(recipe_id, tag)| {
                state.tags.get(tag).map(|t| LinkedRecipeTag {
                    recipe_id: *recipe_id,
                    id: t.id,
                    name: t.name.to_owned(),
                    slug: t.slug.to_owned(),
                })
            })
            .collect())
    }

    async fn short_code_exists(&self, code: &str) -> Result<bool, Error> {
        Ok(self.state().recipes.values().any(|r| r.short_code == code))
    }

    async fn short_code_count(&self, length: usize) -> Result<u64, Error> {
        Ok(self
            .state()
            .recipes
            .values()
            .filter(|r| r.short_code.chars().count() == length)
            .count() as u64)
    }

    async fn find_by_short_code(&self, code: &str) -> Result<Option<Id>, Error> {
        Ok(self
            .state()
            .recipes
            .values()
            .find(|r| r.short_code == code)
            .map(|r| r.id))
    }

    async fn recipes_by_authors(
        &self,
        authors: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        let mut rows: Vec<Recipe> = self
            .state()
            .recipes
            .values()
            .filter(|r| authors.contains(&r.author_id))
            .cloned()
            .collect();
        newest_first(&mut rows);

        if let Some(limit) = limit {
            let mut taken: HashMap<Id, i64> = HashMap::new();
            rows.retain(|r| {
                let count = taken.entry(r.author_id).or_insert(0);
                *count += 1;
                *count <= limit
            });
        }
        Ok(rows)
    }

    async fn recipe_counts_by_authors(&self, authors: &[Id]) -> Result<HashMap<Id, i64>, Error> {
        let mut counts = HashMap::new();
        for recipe in self.state().recipes.values() {
            if authors.contains(&recipe.author_id) {
                *counts.entry(recipe.author_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RelationRepository for MemoryStore {
    async fn insert_relation(
        &self,
        kind: RelationKind,
        user: Id,
        recipe: Id,
    ) -> Result<bool, Error> {
        self.transaction(|state| {
            if !state.recipes.contains_key(&recipe) {
                return Err(Error::NotFound(Missing::Recipe));
            }
            Ok(state.relations.insert((kind, user, recipe)))
        })
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        user: Id,
        recipe: Id,
    ) -> Result<bool, Error> {
        self.transaction(|state| Ok(state.relations.remove(&(kind, user, recipe))))
    }

    async fn related_recipe_ids(
        &self,
        kind: RelationKind,
        user: Id,
        among: &[Id],
    ) -> Result<HashSet<Id>, Error> {
        self.relation_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        Ok(among
            .iter()
            .copied()
            .filter(|recipe| state.has_relation(kind, user, *recipe))
            .collect())
    }

    async fn all_related_recipe_ids(&self, kind: RelationKind, user: Id) -> Result<Vec<Id>, Error> {
        self.relation_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state()
            .relations
            .iter()
            .filter(|(k, u, _)| *k == kind && *u == user)
            .map(|(_, _, recipe)| *recipe)
            .collect())
    }

    async fn ingredient_amounts(&self, recipe_ids: &[Id]) -> Result<Vec<IngredientAmount>, Error> {
        Ok(self
            .state()
            .parts
            .iter()
            .filter(|(recipe_id, _)| recipe_ids.contains(recipe_id))
            .map(|(_, part)| IngredientAmount {
                ingredient_id: part.id,
                amount: part.amount,
            })
            .collect())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn insert_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error> {
        self.transaction(|state| {
            if follower == followee {
                return Err(Error::SelfReference);
            }
            if !state.users.contains_key(&follower) || !state.users.contains_key(&followee) {
                return Err(Error::NotFound(Missing::User));
            }
            if state
                .subscriptions
                .iter()
                .any(|s| s.follower_id == follower && s.followee_id == followee)
            {
                return Ok(false);
            }
            state.subscriptions.push(Subscription {
                follower_id: follower,
                followee_id: followee,
                created_at: Utc::now(),
            });
            Ok(true)
        })
    }

    async fn delete_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error> {
        self.transaction(|state| {
            let before = state.subscriptions.len();
            state
                .subscriptions
                .retain(|s| !(s.follower_id == follower && s.followee_id == followee));
            Ok(state.subscriptions.len() < before)
        })
    }

    async fn followed_ids(&self, follower: Id, among: &[Id]) -> Result<HashSet<Id>, Error> {
        let state = self.state();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.follower_id == follower && among.contains(&s.followee_id))
            .map(|s| s.followee_id)
            .collect())
    }

    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, Error> {
        let state = self.state();
        Ok(state
            .subscriptions
            .iter()
            .rev()
            .filter(|s| s.follower_id == follower)
            .filter_map(|s| state.users.get(&s.followee_id).cloned())
            .collect())
    }
}
