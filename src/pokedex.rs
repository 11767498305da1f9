//! Pokédex: keyed, expiring resources for pokemon data and sprites.
//!
//! Data and sprite images are two independent caches. A pokemon's sprite is
//! requested by URL once its data resource is ready, so the composite
//! "data + image" view is built by the consumer from two keyed resources.

use crate::cache::{CacheConfig, CacheError, KeyedResourceCache};
use crate::pokeapi::{FetchError, PokeApiClient, Pokemon, Sprite};
use crate::producer::maybe_delayed;
use crate::resource::PollableResource;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub type PokemonResource = PollableResource<Pokemon, FetchError>;
pub type SpriteResource = PollableResource<Sprite, FetchError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pokemon name must not be empty")]
pub struct EmptyName;

/// Case-normalized pokemon name, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PokemonName(String);

impl PokemonName {
    pub fn new(raw: &str) -> Result<Self, EmptyName> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(EmptyName);
        }
        Ok(Self(name.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PokemonName {
    type Err = EmptyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PokemonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where pokemon data and sprites come from.
///
/// Futures are boxed and `'static` so they can be handed to the cache, which
/// runs them on their own task.
pub trait PokemonSource: Send + Sync + 'static {
    fn pokemon(&self, name: &PokemonName) -> BoxFuture<'static, Result<Pokemon, FetchError>>;

    fn sprite(&self, url: &str) -> BoxFuture<'static, Result<Sprite, FetchError>>;
}

impl PokemonSource for PokeApiClient {
    fn pokemon(&self, name: &PokemonName) -> BoxFuture<'static, Result<Pokemon, FetchError>> {
        let client = self.clone();
        let name = name.clone();
        async move { client.fetch_pokemon(name.as_str()).await }.boxed()
    }

    fn sprite(&self, url: &str) -> BoxFuture<'static, Result<Sprite, FetchError>> {
        let client = self.clone();
        let url = url.to_owned();
        async move { client.fetch_sprite(&url).await }.boxed()
    }
}

pub struct Pokedex<S = PokeApiClient> {
    source: S,
    pokemon: KeyedResourceCache<PokemonName, Pokemon, FetchError>,
    sprites: KeyedResourceCache<String, Sprite, FetchError>,
    fetch_delay: Option<Duration>,
}

impl<S: PokemonSource> Pokedex<S> {
    /// Both caches share `config`. `fetch_delay` slows every fetch down, which
    /// makes the pending state visible.
    pub fn new(
        source: S,
        config: CacheConfig,
        fetch_delay: Option<Duration>,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            source,
            pokemon: KeyedResourceCache::new(config)?,
            sprites: KeyedResourceCache::new(config)?,
            fetch_delay,
        })
    }

    pub fn pokemon(&self, name: &PokemonName) -> Result<PokemonResource, CacheError> {
        self.pokemon.get(name.clone(), || {
            maybe_delayed(self.fetch_delay, self.source.pokemon(name))
        })
    }

    pub fn sprite(&self, url: &str) -> Result<SpriteResource, CacheError> {
        self.sprites.get(url.to_owned(), || {
            maybe_delayed(self.fetch_delay, self.source.sprite(url))
        })
    }

    /// The sprite resource for a loaded pokemon, if it has one.
    pub fn sprite_for(&self, pokemon: &Pokemon) -> Result<Option<SpriteResource>, CacheError> {
        pokemon
            .sprite_url
            .as_deref()
            .map(|url| self.sprite(url))
            .transpose()
    }

    /// Forget a pokemon so the next lookup fetches it again.
    pub fn invalidate(&self, name: &PokemonName) -> Result<bool, CacheError> {
        self.pokemon.invalidate(name)
    }

    pub fn cached_pokemon(&self) -> usize {
        self.pokemon.len()
    }

    pub fn cached_sprites(&self) -> usize {
        self.sprites.len()
    }

    /// Tear down both caches. Both are attempted even if the first fails.
    pub fn teardown(&self) -> Result<(), CacheError> {
        let pokemon = self.pokemon.teardown();
        let sprites = self.sprites.teardown();
        pokemon.and(sprites)
    }
}
