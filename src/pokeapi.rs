//! PokeAPI REST client: the concrete producer behind the Pokédex caches.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2/";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no pokemon named {0:?}")]
    NotFound(String),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// The subset of a PokeAPI `pokemon` record the app displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    /// Decimetres.
    pub height: u32,
    /// Hectograms.
    pub weight: u32,
    pub abilities: Vec<String>,
    pub sprite_url: Option<String>,
}

/// A fully downloaded sprite image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RawPokemon {
    id: u32,
    name: String,
    height: u32,
    weight: u32,
    #[serde(default)]
    abilities: Vec<RawAbilitySlot>,
    sprites: RawSprites,
}

#[derive(Debug, Deserialize)]
struct RawAbilitySlot {
    ability: NamedResource,
    slot: u8,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawSprites {
    front_default: Option<String>,
}

impl From<RawPokemon> for Pokemon {
    fn from(mut raw: RawPokemon) -> Self {
        raw.abilities.sort_by_key(|slot| slot.slot);
        Self {
            id: raw.id,
            name: raw.name,
            height: raw.height,
            weight: raw.weight,
            abilities: raw.abilities.into_iter().map(|s| s.ability.name).collect(),
            sprite_url: raw.sprites.front_default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PokeApiClient {
    http: reqwest::Client,
    base: Url,
}

impl PokeApiClient {
    /// Create a client rooted at `base_url`. A trailing slash is added if missing
    /// so relative joins keep the full path.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/pokemon/{name}`, with `name` percent-encoded as a single path segment.
    pub fn pokemon_url(&self, name: &str) -> Result<Url, FetchError> {
        // Dot segments would be dropped and resolve to another endpoint.
        if matches!(name, "" | "." | "..") {
            return Err(FetchError::NotFound(name.to_owned()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("pokemon")
            .push(name);
        Ok(url)
    }

    /// Fetch a pokemon by (already normalized) name.
    pub async fn fetch_pokemon(&self, name: &str) -> Result<Pokemon, FetchError> {
        let url = self.pokemon_url(name)?;
        debug!(%url, "Fetching pokemon");

        let resp = self.http.get(url.clone()).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(name.to_owned())),
            status if !status.is_success() => Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            _ => {
                let raw: RawPokemon = resp.json().await?;
                trace!(id = raw.id, name = %raw.name, "Pokemon fetched");
                Ok(raw.into())
            }
        }
    }

    /// Download a sprite image completely, so it is ready to display once resolved.
    pub async fn fetch_sprite(&self, url: &str) -> Result<Sprite, FetchError> {
        let parsed = Url::parse(url)?;
        debug!(url = %parsed, "Preloading sprite");

        let resp = self.http.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = resp.bytes().await?.to_vec();

        Ok(Sprite {
            url: url.to_owned(),
            content_type,
            bytes,
        })
    }
}
