use rand::Rng;
use redis::aio::MultiplexedConnection;

use crate::{
    cache::cache::{cached_or_fetch, CacheKey},
    config::Config,
    constants::{
        SHORT_CODE_ALPHABET, SHORT_CODE_MAX_ATTEMPTS, SHORT_CODE_MAX_LENGTH,
        SHORT_CODE_MIN_ATTEMPTS,
    },
    error::{Error, Missing},
    repository::RecipeRepository,
    schema::Id,
};

/// Draws fixed-length codes from the 62 symbol alphabet and checks them
/// against the codes already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCodeGenerator {
    length: usize,
}

impl ShortCodeGenerator {
    pub fn new(length: usize) -> Result<Self, Error> {
        if !(1..=SHORT_CODE_MAX_LENGTH).contains(&length) {
            return Err(Error::validation(
                "short_code_length",
                format!("Must be between 1 and {SHORT_CODE_MAX_LENGTH}"),
            ));
        }
        Ok(Self { length })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(config.short_code_length)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of distinct codes of this length.
    pub fn space(&self) -> u64 {
        (SHORT_CODE_ALPHABET.len() as u64).pow(self.length as u32)
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        (0..self.length)
            .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
            .collect()
    }

    pub fn sample(&self) -> String {
        self.sample_with(&mut rand::thread_rng())
    }

    /// How many draws to make with `existing` codes taken: ten times the
    /// expected number of draws for the current fill ratio, within
    /// `SHORT_CODE_MIN_ATTEMPTS..=SHORT_CODE_MAX_ATTEMPTS`.
    pub fn attempt_budget(&self, existing: u64) -> Result<u64, Error> {
        let space = self.space();
        if existing >= space {
            return Err(Error::Capacity { attempts: 0 });
        }

        // ceil(MIN / (1 - existing / space)) without going through floats
        let expected = (SHORT_CODE_MIN_ATTEMPTS * space).div_ceil(space - existing);

        Ok(expected.clamp(SHORT_CODE_MIN_ATTEMPTS, SHORT_CODE_MAX_ATTEMPTS))
    }

    /// Returns a code no recipe carries at the time of the check. The store's
    /// uniqueness constraint stays the final arbiter under concurrency.
    pub async fn generate<S: RecipeRepository + ?Sized>(&self, store: &S) -> Result<String, Error> {
        let budget = self.attempt_budget(store.short_code_count(self.length).await?)?;

        for attempt in 1..=budget {
            let code = self.sample();
            if !store.short_code_exists(&code).await? {
                log::trace!("> Short code found on attempt {attempt}");
                return Ok(code);
            }
            log::warn!("Short code collision on {code:?} ({attempt}/{budget})");
        }

        Err(Error::Capacity { attempts: budget })
    }

    pub async fn resolve<S: RecipeRepository + ?Sized>(
        &self,
        code: &str,
        store: &S,
    ) -> Result<Id, Error> {
        resolve_short_link(code, store).await
    }
}

pub async fn resolve_short_link<S: RecipeRepository + ?Sized>(
    code: &str,
    store: &S,
) -> Result<Id, Error> {
    match store.find_by_short_code(code).await? {
        Some(id) => Ok(id),
        None => Err(Error::NotFound(Missing::ShortLink)),
    }
}

pub async fn resolve_short_link_cached<S: RecipeRepository + ?Sized>(
    code: &str,
    store: &S,
    cache: &mut MultiplexedConnection,
) -> Result<Id, Error> {
    let key = CacheKey::ShortLink(code.to_owned());
    match cached_or_fetch(&key, cache, || store.find_by_short_code(code)).await? {
        Some(id) => Ok(id),
        None => Err(Error::NotFound(Missing::ShortLink)),
    }
}

/// Shareable URL of a recipe, `{short_link_base}/s/{code}`.
pub async fn recipe_link<S: RecipeRepository + ?Sized>(
    id: Id,
    config: &Config,
    store: &S,
) -> Result<String, Error> {
    let recipe = match store.get_recipe(id).await? {
        Some(recipe) => recipe,
        None => return Err(Error::NotFound(Missing::Recipe)),
    };

    Ok(format!(
        "{}/s/{}",
        config.short_link_base.trim_end_matches('/'),
        recipe.short_code
    ))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn length_is_bounded() {
        assert!(ShortCodeGenerator::new(0).is_err());
        assert!(ShortCodeGenerator::new(9).is_err());
        assert_eq!(ShortCodeGenerator::new(6).unwrap().length(), 6);
    }

    #[test]
    fn samples_have_fixed_length_and_alphabet() {
        let generator = ShortCodeGenerator::new(6).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let code = generator.sample_with(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn budget_grows_with_fill_ratio() {
        let generator = ShortCodeGenerator::new(1).unwrap();
        assert_eq!(generator.space(), 62);

        assert_eq!(generator.attempt_budget(0).unwrap(), 10);
        assert_eq!(generator.attempt_budget(31).unwrap(), 20);
        assert_eq!(generator.attempt_budget(61).unwrap(), 620);
        assert!(matches!(
            generator.attempt_budget(62),
            Err(Error::Capacity { .. })
        ));
    }

    #[test]
    fn budget_is_clamped() {
        let generator = ShortCodeGenerator::new(2).unwrap();
        assert_eq!(generator.attempt_budget(3843).unwrap(), SHORT_CODE_MAX_ATTEMPTS);
        assert_eq!(
            ShortCodeGenerator::new(8).unwrap().attempt_budget(0).unwrap(),
            SHORT_CODE_MIN_ATTEMPTS
        );
        assert_eq!(
            ShortCodeGenerator::new(6).unwrap().attempt_budget(1_000).unwrap(),
            11
        );
    }
}
