//! Pokédex and app behaviour against an in-memory source.

mod helpers;

use helpers::{FakeSource, make_pokemon, sprite_url};
use pokecache::app::{App, Lookup};
use pokecache::config::Config;
use pokecache::pokedex::{Pokedex, PokemonName};
use pokecache::{CacheConfig, CacheError, PollableResource, Polled, Suspense};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(5);
const LATENCY: Duration = Duration::from_millis(200);

fn source() -> FakeSource {
    FakeSource::new(
        vec![
            make_pokemon(25, "pikachu", &["static", "lightning-rod"]),
            make_pokemon(1, "bulbasaur", &["overgrow"]),
        ],
        LATENCY,
    )
}

fn test_config() -> Config {
    Config {
        log_level: "debug".to_owned(),
        cache_ttl: TTL,
        sweep_interval: Duration::from_secs(1),
        suspense_timeout: Duration::from_millis(50),
        fetch_delay: None,
        pokeapi_url: "http://localhost:0/".to_owned(),
    }
}

fn name(raw: &str) -> PokemonName {
    PokemonName::new(raw).unwrap()
}

#[tokio::test(start_paused = true)]
async fn data_then_sprite_composition() {
    let source = source();
    let pokedex = Pokedex::new(source.clone(), CacheConfig::new(TTL), None).unwrap();

    let data = pokedex.pokemon(&name("Pikachu")).unwrap();
    assert!(data.poll().is_not_ready());

    let pikachu = match Suspense::default().read(&data).await {
        Polled::Ready(pokemon) => pokemon,
        other => panic!("expected pikachu, got {other:?}"),
    };
    assert_eq!(pikachu.id, 25);

    let sprite = pokedex.sprite_for(pikachu).unwrap().expect("has a sprite");
    sprite.settled().await;
    match sprite.poll() {
        Polled::Ready(sprite) => {
            assert_eq!(sprite.url, sprite_url(25));
            assert_eq!(sprite.content_type.as_deref(), Some("image/png"));
        }
        other => panic!("expected sprite, got {other:?}"),
    }

    // Same name in a different case hits the same entry.
    let again = pokedex.pokemon(&name("PIKACHU")).unwrap();
    assert!(PollableResource::ptr_eq(&data, &again));
    assert_eq!(source.pokemon_calls(), 1);
    assert_eq!(source.sprite_calls(), 1);
    assert_eq!(pokedex.cached_pokemon(), 1);
    assert_eq!(pokedex.cached_sprites(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_pokemon_fails_with_not_found() {
    let pokedex = Pokedex::new(source(), CacheConfig::new(TTL), None).unwrap();

    let missing = pokedex.pokemon(&name("missingno")).unwrap();
    missing.settled().await;

    match missing.poll() {
        Polled::Failed(failure) => {
            assert!(failure.producer_error().is_some_and(|e| e.is_not_found()));
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_delay_holds_resources_pending() {
    let pokedex = Pokedex::new(
        source(),
        CacheConfig::new(TTL),
        Some(Duration::from_secs(2)),
    )
    .unwrap();

    let data = pokedex.pokemon(&name("bulbasaur")).unwrap();
    let suspense = Suspense::new(Duration::from_secs(1));
    assert!(suspense.read(&data).await.is_not_ready());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(data.poll().is_ready());
}

#[tokio::test(start_paused = true)]
async fn teardown_closes_both_caches() {
    let pokedex = Pokedex::new(source(), CacheConfig::new(TTL), None).unwrap();
    pokedex.pokemon(&name("pikachu")).unwrap();

    pokedex.teardown().unwrap();
    assert_eq!(pokedex.cached_pokemon(), 0);
    assert_eq!(
        pokedex.pokemon(&name("pikachu")).unwrap_err(),
        CacheError::Closed
    );
    assert_eq!(
        pokedex.sprite(&sprite_url(25)).unwrap_err(),
        CacheError::Closed
    );
    assert_eq!(pokedex.teardown(), Err(CacheError::Closed));
}

#[tokio::test(start_paused = true)]
async fn app_lookups_report_outcomes() {
    let source = source();
    let app = App::with_source(source.clone(), &test_config()).unwrap();

    assert_eq!(app.lookup("  Pikachu ").await, Lookup::Found);
    assert_eq!(app.lookup("missingno").await, Lookup::Missing);
    assert_eq!(app.lookup("   ").await, Lookup::Failed);

    // Misses are dropped from the cache so they can be retried.
    assert_eq!(app.pokedex().cached_pokemon(), 1);
    assert_eq!(app.pokedex().cached_sprites(), 1);

    assert_eq!(app.lookup("pikachu").await, Lookup::Found);
    assert_eq!(source.pokemon_calls(), 2);
}
