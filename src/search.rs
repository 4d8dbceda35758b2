//! Place search boundary: provider contract, normalization and fallback.
//!
//! Providers answer with loosely shaped records. [`normalize_place`] is the one
//! place where missing fields get their defaults:
//!
//! | field         | when missing                          |
//! |---------------|---------------------------------------|
//! | `id`          | fresh UUID                            |
//! | `name`        | the search query                      |
//! | `location`    | the search origin, else default origin|
//! | `address`     | none                                  |
//! | `rating`      | none                                  |
//! | `reviews`     | none                                  |
//! | `externalUri` | none                                  |
//!
//! An empty answer (or a provider error) is replaced by exactly one synthetic
//! place built by [`fallback_place`], flagged through its address.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_response::AppResponse;
use crate::local_db_model::{Coordinates, Place};

/// Address carried by every synthetic result. Real results never use it.
pub const SIMULATED_ADDRESS: &str = "Simulated result (search unavailable)";

/// Link attached to synthetic results.
pub const FALLBACK_URI: &str = "https://www.google.com/maps";

/// Maximum per-axis offset applied to a synthetic result, in degrees.
pub const FALLBACK_JITTER_DEGREES: f64 = 0.005;

/// External place lookup.
///
/// Implementations may fail; [`resolve_search`] turns failures into the fallback.
pub trait PlaceSearchClient {
    fn search(&self, query: &str, origin: Option<Coordinates>)
        -> Result<Vec<RawPlace>, AppResponse>;
}

/// Provider record before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPlace {
    #[serde(alias = "placeId")]
    pub id: Option<String>,
    #[serde(alias = "title", alias = "displayName")]
    pub name: Option<String>,
    #[serde(alias = "formattedAddress")]
    pub address: Option<String>,
    pub location: Option<RawCoordinates>,
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    #[serde(alias = "userRatingCount", alias = "reviewCount")]
    pub reviews: Option<u32>,
    #[serde(alias = "uri", alias = "googleMapsUri", alias = "url")]
    pub external_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCoordinates {
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
}

impl RawPlace {
    fn coordinates(&self) -> Option<Coordinates> {
        let (lat, lng) = match self.location {
            Some(RawCoordinates {
                latitude: Some(lat),
                longitude: Some(lng),
            }) => (lat, lng),
            _ => (self.latitude?, self.longitude?),
        };
        if lat.is_finite() && lng.is_finite() {
            Some(Coordinates::new(lat, lng))
        } else {
            None
        }
    }
}

/// Turns a provider record into a [`Place`] using the default table above.
pub fn normalize_place(raw: RawPlace, query: &str, origin: Coordinates) -> Place {
    let location = raw.coordinates().unwrap_or(origin);
    Place {
        id: non_blank(raw.id).unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: non_blank(raw.name).unwrap_or_else(|| query.to_string()),
        address: non_blank(raw.address),
        location,
        rating: raw.rating,
        reviews: raw.reviews,
        external_uri: non_blank(raw.external_uri),
    }
}

/// The single synthetic result used when search yields nothing.
pub fn fallback_place(query: &str, origin: Coordinates) -> Place {
    let mut rng = rand::thread_rng();
    let jitter = FALLBACK_JITTER_DEGREES;
    Place {
        id: Uuid::new_v4().to_string(),
        name: query.to_string(),
        address: Some(SIMULATED_ADDRESS.to_string()),
        location: Coordinates::new(
            (origin.latitude + rng.gen_range(-jitter..=jitter)).clamp(-90.0, 90.0),
            wrap_longitude(origin.longitude + rng.gen_range(-jitter..=jitter)),
        ),
        rating: None,
        reviews: None,
        external_uri: Some(FALLBACK_URI.to_string()),
    }
}

pub fn is_simulated(place: &Place) -> bool {
    place.address.as_deref() == Some(SIMULATED_ADDRESS)
}

/// Normalizes a provider answer, substituting the fallback when it is empty.
///
/// `origin` is the search origin if the host supplied one; `default_origin`
/// covers the case where it did not.
pub fn normalize_results(
    raw: Vec<RawPlace>,
    query: &str,
    origin: Option<Coordinates>,
    default_origin: Coordinates,
) -> Vec<Place> {
    let origin = origin.unwrap_or(default_origin);
    if raw.is_empty() {
        debug!("No results for '{query}', using simulated place");
        return vec![fallback_place(query, origin)];
    }
    raw.into_iter()
        .map(|r| normalize_place(r, query, origin))
        .collect()
}

/// Runs `client` and never propagates its failure.
pub fn resolve_search<C: PlaceSearchClient + ?Sized>(
    client: &C,
    query: &str,
    origin: Option<Coordinates>,
    default_origin: Coordinates,
) -> Vec<Place> {
    let raw = match client.search(query, origin) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Place search for '{query}' failed: {e}");
            Vec::new()
        }
    };
    normalize_results(raw, query, origin, default_origin)
}

/// Folds a longitude back into [-180, 180).
fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
