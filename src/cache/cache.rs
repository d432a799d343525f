use std::{fmt, future::Future};

use rand::{distributions::Alphanumeric, Rng};
use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Holds the token every recipe-bound entry was written under.
const RECIPE_BIND_KEY: &str = "recipe-cache-key";
const BIND_TOKEN_LENGTH: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
    /// Short code to recipe id.
    ShortLink(String),
}

impl CacheKey {
    pub fn name(&self) -> String {
        match self {
            CacheKey::ShortLink(code) => format!("short-link-{code}"),
        }
    }

    pub fn binding(&self) -> CacheBinding {
        match self {
            CacheKey::ShortLink(_) => CacheBinding::Recipes,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What an entry's validity is tied to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBinding {
    /// Valid until deleted.
    Unbound,
    /// Valid until the recipe bind token rotates.
    Recipes,
}

impl CacheBinding {
    async fn current_token(
        self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, Error> {
        match self {
            CacheBinding::Unbound => Ok(None),
            CacheBinding::Recipes => get_cache_value::<_, String>(RECIPE_BIND_KEY, cache).await,
        }
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct CachedEntry<T: Serialize + Send + Sync + Clone> {
    pub value: T,
    binding: CacheBinding,
    token: Option<String>,
}

impl<T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> CachedEntry<T> {
    async fn is_current(&self, cache: &mut MultiplexedConnection) -> Result<bool, Error> {
        Ok(self.token == self.binding.current_token(cache).await?)
    }
}

/// Serves `key` from redis while its binding is current. Otherwise runs
/// `fetch` and caches the value when there is one; misses are not cached.
pub async fn cached_or_fetch<T, F, Fut>(
    key: &CacheKey,
    cache: &mut MultiplexedConnection,
    fetch: F,
) -> Result<Option<T>, Error>
where
    T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    if let Some(entry) = read_entry::<T>(key, cache).await {
        if entry.is_current(cache).await? {
            log::trace!("> Cache hit {key}");
            return Ok(Some(entry.value));
        }
        log::trace!("> Stale {key}");
    }

    log::trace!("> Fetching {key}");
    let Some(value) = fetch().await? else {
        return Ok(None);
    };

    let binding = key.binding();
    let entry = CachedEntry {
        value,
        binding,
        token: binding.current_token(cache).await?,
    };
    if let Err(e) = set_cache_value(key.name(), entry.clone(), cache).await {
        log::error!("> Failed to cache {key}: {e}");
    }

    Ok(Some(entry.value))
}

/// Unreadable entries are removed in the background and treated as absent.
async fn read_entry<T>(key: &CacheKey, cache: &mut MultiplexedConnection) -> Option<CachedEntry<T>>
where
    T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>,
{
    match get_cache_value::<_, CachedEntry<T>>(key.name(), cache).await {
        Ok(entry) => entry,
        Err(e) => {
            let mut connection = cache.clone();
            let name = key.name();
            tokio::spawn(async move {
                log::error!("> Unreadable cache entry {name} ({e}), deleting");
                if let Err(e) = delete_cache_value(name, &mut connection).await {
                    log::error!("> Failed to delete cache entry: {e}");
                }
            });
            None
        }
    }
}

/// Invalidates every entry bound to recipes.
pub async fn rotate_recipe_binding(cache: &mut MultiplexedConnection) -> Result<(), Error> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BIND_TOKEN_LENGTH)
        .map(char::from)
        .collect();

    log::trace!("> Rotating {RECIPE_BIND_KEY}");
    set_cache_value(RECIPE_BIND_KEY, token, cache).await
}

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.set(key, value).await?;
    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.del(key).await?;
    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    Ok(cache.get(key).await?)
}
