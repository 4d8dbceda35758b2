//! Saved places and their check-in histories.
//!
//! The store is the single writer of the saved collection. Entries are held as
//! `Arc<SavedPlace>` and replaced wholesale on every check-in, so a handle
//! taken before a mutation keeps showing the old state. After each mutation
//! the full collection is rewritten under one storage key.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::app_response::AppResponse;
use crate::config::DEFAULT_STORAGE_KEY;
use crate::local_db_model::{
    CheckIn, CheckInDraft, Place, SavedPlace, TimelineEntry, MAX_RATING, MIN_RATING,
};
use crate::local_db_state::KeyValueStorage;

pub struct PlaceStore<S: KeyValueStorage> {
    storage: S,
    key: String,
    saved: Vec<Arc<SavedPlace>>,
    dirty: bool,
}

impl<S: KeyValueStorage> PlaceStore<S> {
    /// Hydrates from `storage` under the default key.
    pub fn open(storage: S) -> Self {
        Self::open_with_key(storage, DEFAULT_STORAGE_KEY)
    }

    /// Hydrates from `storage` under `key`.
    ///
    /// Never fails: unreadable or malformed data leaves the store empty.
    pub fn open_with_key(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let saved = match storage.read(&key) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<SavedPlace>>(&json) {
                Ok(places) => sanitize(places),
                Err(e) => {
                    warn!("Discarding malformed saved places under '{key}': {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read saved places under '{key}': {e}");
                Vec::new()
            }
        };

        info!("Place store hydrated with {} saved places", saved.len());
        Self {
            storage,
            key,
            saved: saved.into_iter().map(Arc::new).collect(),
            dirty: false,
        }
    }

    pub fn find_saved(&self, id: &str) -> Option<Arc<SavedPlace>> {
        self.saved.iter().find(|p| p.id() == id).cloned()
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.saved.iter().any(|p| p.id() == id)
    }

    /// Saved places in first-saved-first order.
    pub fn saved_places(&self) -> &[Arc<SavedPlace>] {
        &self.saved
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// True when the last write to storage failed and nothing has succeeded since.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a check-in against `target`, promoting it to a saved place on
    /// first use, and returns the canonical post-merge entry.
    ///
    /// Rejects ratings outside 1..=5 before touching any state. A failed write
    /// to storage is logged and leaves the in-memory collection updated.
    pub fn add_check_in(
        &mut self,
        target: &Place,
        draft: CheckInDraft,
    ) -> Result<Arc<SavedPlace>, AppResponse> {
        let rating = validate_rating(draft.rating)?;

        let check_in = CheckIn {
            id: Uuid::new_v4().to_string(),
            place_id: target.id.clone(),
            timestamp: Utc::now().timestamp_millis(),
            rating,
            text: draft.text,
            image: draft.image,
        };

        let updated = match self.saved.iter().position(|p| p.id() == target.id) {
            Some(index) => {
                let mut next = SavedPlace::clone(&self.saved[index]);
                next.check_ins.push(check_in);
                let next = Arc::new(next);
                self.saved[index] = Arc::clone(&next);
                debug!(
                    "Appended check-in to '{}' ({} total)",
                    target.id,
                    next.check_in_count()
                );
                next
            }
            None => {
                let next = Arc::new(SavedPlace {
                    place: target.clone(),
                    check_ins: vec![check_in],
                });
                self.saved.push(Arc::clone(&next));
                debug!("Saved new place '{}'", target.id);
                next
            }
        };

        self.persist();
        Ok(updated)
    }

    /// Every check-in across all saved places, newest first.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = self
            .saved
            .iter()
            .flat_map(|saved| {
                saved.check_ins.iter().map(move |check_in| TimelineEntry {
                    place_id: saved.place.id.clone(),
                    place_name: saved.place.name.clone(),
                    check_in: check_in.clone(),
                })
            })
            .collect();
        // stable: equal timestamps keep store order
        entries.sort_by(|a, b| b.check_in.timestamp.cmp(&a.check_in.timestamp));
        entries
    }

    /// Serialized form of the whole collection, as written to storage.
    pub fn to_json(&self) -> Result<String, AppResponse> {
        Ok(serde_json::to_string(&self.saved)?)
    }

    /// Retries the full write; used after a failed persist.
    pub fn flush(&mut self) -> Result<(), AppResponse> {
        let json = self.to_json()?;
        match self.storage.write(&self.key, &json) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn persist(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Saved places kept in memory only, write failed: {e}");
        }
    }
}

pub(crate) fn validate_rating(rating: Option<i64>) -> Result<u8, AppResponse> {
    let Some(rating) = rating else {
        return Err(AppResponse::ValidationError(
            "Invalid check-in: a rating is required".to_string(),
        ));
    };
    if (MIN_RATING as i64..=MAX_RATING as i64).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(AppResponse::ValidationError(format!(
            "Invalid check-in: rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )))
    }
}

/// Drops duplicate ids (first wins) and check-ins filed under the wrong place.
fn sanitize(places: Vec<SavedPlace>) -> Vec<SavedPlace> {
    let mut seen = HashSet::new();
    let mut clean = Vec::with_capacity(places.len());

    for mut saved in places {
        if !seen.insert(saved.place.id.clone()) {
            warn!("Ignoring duplicate saved place '{}'", saved.place.id);
            continue;
        }
        let before = saved.check_ins.len();
        let id = saved.place.id.clone();
        saved.check_ins.retain(|c| c.place_id == id);
        if saved.check_ins.len() != before {
            warn!(
                "Dropped {} misfiled check-ins from '{}'",
                before - saved.check_ins.len(),
                id
            );
        }
        clean.push(saved);
    }
    clean
}
