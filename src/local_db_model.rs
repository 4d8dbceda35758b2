//! Data model for places, check-ins and the saved-place collection.
//!
//! Everything here serializes in camelCase so the persisted array and the FFI
//! payloads keep the shape the host UI already speaks (`placeId`,
//! `externalUri`, `checkIns`).
//!
//! A [`Place`] is a transient search result. It becomes a [`SavedPlace`] the
//! first time a [`CheckIn`] is recorded against it; from then on the store owns
//! it and appends further check-ins to the same entry.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Lowest accepted check-in rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted check-in rating.
pub const MAX_RATING: u8 = 5;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Largest per-axis difference to `other`, in degrees.
    pub fn max_axis_delta(&self, other: &Coordinates) -> f64 {
        (self.latitude - other.latitude)
            .abs()
            .max((self.longitude - other.longitude).abs())
    }
}

/// A venue as returned by search, before anyone has checked in to it.
///
/// `id` is the only identity: two places may share a name or a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub location: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_uri: Option<String>,
}

/// A recorded visit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: String,
    pub place_id: String,
    /// Creation instant, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub rating: u8,
    pub text: String,
    /// Photo encoded as text (base64 or data URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// What the user submits; the store fills in id, place id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInDraft {
    /// Missing or `null` means the user never picked a rating.
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CheckInDraft {
    pub fn new(rating: i64, text: impl Into<String>) -> Self {
        Self {
            rating: Some(rating),
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// A place with at least one check-in.
///
/// Every entry of `check_ins` carries `place_id == place.id`, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlace {
    #[serde(flatten)]
    pub place: Place,
    pub check_ins: Vec<CheckIn>,
}

impl SavedPlace {
    pub fn id(&self) -> &str {
        &self.place.id
    }

    pub fn check_in_count(&self) -> usize {
        self.check_ins.len()
    }
}

impl Deref for SavedPlace {
    type Target = Place;

    fn deref(&self) -> &Place {
        &self.place
    }
}

/// Whatever the detail panel is currently focused on.
///
/// Saved places are shared with the store; a later check-in replaces the
/// store's entry and leaves this handle untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "place", rename_all = "camelCase")]
pub enum Selection {
    Result(Place),
    Saved(Arc<SavedPlace>),
}

impl Selection {
    pub fn id(&self) -> &str {
        match self {
            Selection::Result(place) => &place.id,
            Selection::Saved(saved) => saved.id(),
        }
    }

    pub fn place(&self) -> &Place {
        match self {
            Selection::Result(place) => place,
            Selection::Saved(saved) => &saved.place,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Selection::Saved(_))
    }

    pub fn check_in_count(&self) -> usize {
        match self {
            Selection::Result(_) => 0,
            Selection::Saved(saved) => saved.check_in_count(),
        }
    }
}

/// One row of the cross-place timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub place_id: String,
    pub place_name: String,
    pub check_in: CheckIn,
}
