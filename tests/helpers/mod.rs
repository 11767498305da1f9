#![allow(dead_code)]

use futures::FutureExt;
use futures::future::BoxFuture;
use pokecache::pokeapi::{FetchError, Pokemon, Sprite};
use pokecache::pokedex::{PokemonName, PokemonSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Build a `Pokemon` with a sprite URL derived from its id.
pub fn make_pokemon(id: u32, name: &str, abilities: &[&str]) -> Pokemon {
    Pokemon {
        id,
        name: name.to_owned(),
        height: id,
        weight: id * 10,
        abilities: abilities.iter().map(|a| (*a).to_owned()).collect(),
        sprite_url: Some(sprite_url(id)),
    }
}

pub fn sprite_url(id: u32) -> String {
    format!("https://sprites.test/pokemon/{id}.png")
}

/// In-memory `PokemonSource` that counts every fetch it starts.
#[derive(Clone, Default)]
pub struct FakeSource {
    pokemon: Arc<HashMap<String, Pokemon>>,
    latency: Duration,
    pokemon_calls: Arc<AtomicUsize>,
    sprite_calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(pokemon: Vec<Pokemon>, latency: Duration) -> Self {
        Self {
            pokemon: Arc::new(pokemon.into_iter().map(|p| (p.name.clone(), p)).collect()),
            latency,
            ..Default::default()
        }
    }

    pub fn pokemon_calls(&self) -> usize {
        self.pokemon_calls.load(Ordering::SeqCst)
    }

    pub fn sprite_calls(&self) -> usize {
        self.sprite_calls.load(Ordering::SeqCst)
    }
}

impl PokemonSource for FakeSource {
    fn pokemon(&self, name: &PokemonName) -> BoxFuture<'static, Result<Pokemon, FetchError>> {
        self.pokemon_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.pokemon.get(name.as_str()).cloned();
        let name = name.to_string();
        let latency = self.latency;
        async move {
            tokio::time::sleep(latency).await;
            found.ok_or(FetchError::NotFound(name))
        }
        .boxed()
    }

    fn sprite(&self, url: &str) -> BoxFuture<'static, Result<Sprite, FetchError>> {
        self.sprite_calls.fetch_add(1, Ordering::SeqCst);
        let url = url.to_owned();
        let latency = self.latency;
        async move {
            tokio::time::sleep(latency).await;
            Ok(Sprite {
                bytes: url.as_bytes().to_vec(),
                url,
                content_type: Some("image/png".to_owned()),
            })
        }
        .boxed()
    }
}
