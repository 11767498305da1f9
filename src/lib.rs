//! Poll-based async resources with a single-flight, sliding-TTL keyed cache,
//! and a Pokédex lookup tool built on top of them.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod pokeapi;
pub mod pokedex;
pub mod producer;
pub mod resource;
pub mod suspense;
pub mod utils;

pub use cache::{CacheConfig, CacheError, KeyedResourceCache};
pub use resource::{Deferred, DeferredState, Failure, PollableResource, Polled};
pub use suspense::Suspense;
