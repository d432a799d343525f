use std::{collections::HashMap, str::FromStr};

use super::{
    error::Error,
    schema::{Id, RecipeFilter},
};

pub type QueryData = HashMap<String, String>;

/// Typed access to query string parameters.
pub struct Form {
    inner: QueryData,
}

impl Form {
    pub fn from_data(data: QueryData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn get_number<T>(&self, key: &'static str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| Error::validation(key, "Must be a whole number")),
            None => Ok(None),
        }
    }

    /// Accepts `1`/`0` as well as `true`/`false`.
    pub fn get_flag(&self, key: &'static str) -> Result<Option<bool>, Error> {
        match self.get_str(key) {
            Some("1") | Some("true") => Ok(Some(true)),
            Some("0") | Some("false") => Ok(Some(false)),
            Some(_) => Err(Error::validation(key, "Must be 0 or 1")),
            None => Ok(None),
        }
    }

    pub fn recipes_limit(&self) -> Result<Option<i64>, Error> {
        parse_recipes_limit(self.get_str("recipes_limit"))
    }

    pub fn recipe_filter(&self) -> Result<RecipeFilter, Error> {
        let tags = self
            .get_str("tags")
            .map(|tags| {
                tags.split(',')
                    .map(|slug| slug.trim().to_string())
                    .filter(|slug| !slug.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(RecipeFilter {
            author: self.get_number::<Id>("author")?,
            tags,
            is_favorited: self.get_flag("is_favorited")?,
            is_in_shopping_cart: self.get_flag("is_in_shopping_cart")?,
        })
    }
}

/// `recipes_limit` must be a non-negative integer when present.
pub fn parse_recipes_limit(value: Option<&str>) -> Result<Option<i64>, Error> {
    let value = match value {
        Some(value) => value.trim(),
        None => return Ok(None),
    };

    match value.parse::<i64>() {
        Ok(limit) if limit >= 0 => Ok(Some(limit)),
        _ => Err(Error::validation(
            "recipes_limit",
            "Must be a non-negative integer",
        )),
    }
}
