use crate::config::Config;
use crate::pokeapi::{FetchError, PokeApiClient, Pokemon, Sprite};
use crate::pokedex::{Pokedex, PokemonName, PokemonSource};
use crate::resource::{Failure, PollableResource, Polled};
use crate::suspense::Suspense;
use crate::utils::{fmt_duration, timed};
use anyhow::Context;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

const SLOW_LOOKUP_THRESHOLD: Duration = Duration::from_secs(2);

/// Outcome of a single lookup, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    Missing,
    Failed,
}

/// Main application struct: owns the Pokédex caches and the suspense boundary.
pub struct App<S = PokeApiClient> {
    pokedex: Pokedex<S>,
    suspense: Suspense,
}

impl App {
    /// Create the app against the configured PokeAPI. Must run inside a tokio runtime.
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let client = PokeApiClient::new(&config.pokeapi_url)
            .with_context(|| format!("Invalid PokeAPI URL {:?}", config.pokeapi_url))?;
        let app = Self::with_source(client, config)?;

        info!(
            pokeapi_url = %config.pokeapi_url,
            fetch_delay = ?config.fetch_delay,
            "Pokedex ready"
        );
        Ok(app)
    }
}

impl<S: PokemonSource> App<S> {
    pub fn with_source(source: S, config: &Config) -> Result<Self, anyhow::Error> {
        let pokedex = Pokedex::new(source, config.cache_config(), config.fetch_delay)
            .context("Failed to create pokedex caches")?;
        Ok(Self {
            pokedex,
            suspense: Suspense::new(config.suspense_timeout),
        })
    }

    pub fn pokedex(&self) -> &Pokedex<S> {
        &self.pokedex
    }

    /// Look up `names`, or stdin lines when empty, then tear the caches down.
    pub async fn run(self, names: Vec<String>) -> ExitCode {
        let result = if names.is_empty() {
            self.run_interactive().await
        } else {
            let mut failures = 0;
            for name in &names {
                if self.lookup(name).await != Lookup::Found {
                    failures += 1;
                }
            }
            Ok(failures)
        };

        if let Err(e) = self.pokedex.teardown() {
            warn!(error = %e, "Failed to tear down pokedex caches");
        }

        match result {
            Ok(0) => ExitCode::SUCCESS,
            Ok(failures) => {
                debug!(failures, "Some lookups did not succeed");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!(error = ?e, "Lookup session failed");
                ExitCode::FAILURE
            }
        }
    }

    /// Read names line by line until EOF or Ctrl-C.
    async fn run_interactive(&self) -> Result<usize, anyhow::Error> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut failures = 0;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read stdin")? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if self.lookup(&line).await != Lookup::Found {
                        failures += 1;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        Ok(failures)
    }

    /// Resolve and print one pokemon, followed by its sprite.
    pub async fn lookup(&self, raw_name: &str) -> Lookup {
        let name = match PokemonName::new(raw_name) {
            Ok(name) => name,
            Err(e) => {
                println!("{e}");
                return Lookup::Failed;
            }
        };

        let resource = match self.pokedex.pokemon(&name) {
            Ok(resource) => resource,
            Err(e) => {
                error!(error = %e, %name, "Pokedex unavailable");
                return Lookup::Failed;
            }
        };

        let (lookup, elapsed) = timed(
            "pokemon lookup",
            SLOW_LOOKUP_THRESHOLD,
            self.show(&name, &resource),
        )
        .await;
        debug!(%name, ?lookup, elapsed = fmt_duration(elapsed), "Lookup finished");
        lookup
    }

    async fn show(
        &self,
        name: &PokemonName,
        resource: &PollableResource<Pokemon, FetchError>,
    ) -> Lookup {
        let pokemon = match self.resolve(name.as_str(), resource).await {
            Ok(pokemon) => pokemon,
            Err(Failure::Producer(e)) if e.is_not_found() => {
                println!("No pokemon named {name}.");
                // A miss may be a typo or a pokemon added later; don't pin it in the cache.
                self.forget(name);
                return Lookup::Missing;
            }
            Err(failure) => {
                println!("Failed to load {name}: {failure}");
                self.forget(name);
                return Lookup::Failed;
            }
        };
        println!("{}", render_pokemon(pokemon));

        match self.pokedex.sprite_for(pokemon) {
            Ok(Some(sprite)) => match self.resolve("sprite", &sprite).await {
                Ok(sprite) => println!("  {}", render_sprite(sprite)),
                Err(failure) => println!("  sprite unavailable: {failure}"),
            },
            Ok(None) => println!("  no sprite"),
            Err(e) => warn!(error = %e, "Sprite cache unavailable"),
        }

        Lookup::Found
    }

    /// Drop `name` from the cache. Returns whether an entry was removed.
    fn forget(&self, name: &PokemonName) -> bool {
        match self.pokedex.invalidate(name) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, %name, "Failed to invalidate cached pokemon");
                false
            }
        }
    }

    /// Read through the suspense boundary, printing a fallback once while pending.
    async fn resolve<'r, T, E>(
        &self,
        label: &str,
        resource: &'r PollableResource<T, E>,
    ) -> Result<&'r T, &'r Failure<E>> {
        let mut announced = false;
        loop {
            match self.suspense.read(resource).await {
                Polled::Ready(value) => return Ok(value),
                Polled::Failed(failure) => return Err(failure),
                Polled::NotReady => {
                    if !announced {
                        println!("Loading {label}...");
                        announced = true;
                    }
                }
            }
        }
    }
}

fn render_pokemon(pokemon: &Pokemon) -> String {
    let abilities = if pokemon.abilities.is_empty() {
        "none".to_owned()
    } else {
        pokemon.abilities.join(", ")
    };
    format!(
        "#{id} {name}\n  height: {height} dm  weight: {weight} hg\n  abilities: {abilities}",
        id = pokemon.id,
        name = pokemon.name,
        height = pokemon.height,
        weight = pokemon.weight,
    )
}

fn render_sprite(sprite: &Sprite) -> String {
    format!(
        "sprite: {} bytes ({}) from {}",
        sprite.bytes.len(),
        sprite.content_type.as_deref().unwrap_or("unknown type"),
        sprite.url
    )
}
