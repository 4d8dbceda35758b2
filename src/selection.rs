//! Tracks the focused place and the latest search results.

use std::sync::Arc;

use log::debug;

use crate::local_db_model::{Place, SavedPlace, Selection};
use crate::local_db_state::KeyValueStorage;
use crate::place_store::PlaceStore;

/// Handle for one issued search. Only the most recently issued ticket may
/// replace the result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchTicket(pub u64);

#[derive(Debug, Default)]
pub struct SelectionController {
    selected: Option<Selection>,
    search_results: Vec<Place>,
    last_issued: u64,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focuses `place`, preferring the store's canonical saved entry when one exists.
    pub fn select<S: KeyValueStorage>(&mut self, place: Place, store: &PlaceStore<S>) -> &Selection {
        let selection = match store.find_saved(&place.id) {
            Some(saved) => Selection::Saved(saved),
            None => Selection::Result(place),
        };
        debug!("Selected '{}'", selection.id());
        self.selected.insert(selection)
    }

    /// Focuses a place by id, looking in saved places first and then in the
    /// current results.
    pub fn select_by_id<S: KeyValueStorage>(&mut self, id: &str, store: &PlaceStore<S>) -> Option<&Selection> {
        let selection = match store.find_saved(id) {
            Some(saved) => Selection::Saved(saved),
            None => Selection::Result(self.search_results.iter().find(|p| p.id == id)?.clone()),
        };
        let selected: &Selection = self.selected.insert(selection);
        Some(selected)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    /// Replaces the selection with the value a check-in just returned.
    ///
    /// Must be called after every successful check-in on the selected place.
    pub fn refresh(&mut self, saved: Arc<SavedPlace>) {
        self.selected = Some(Selection::Saved(saved));
    }

    /// Like [`refresh`](Self::refresh), but only if `saved` is the focused place.
    pub fn refresh_if_selected(&mut self, saved: &Arc<SavedPlace>) -> bool {
        match &self.selected {
            Some(current) if current.id() == saved.id() => {
                self.refresh(Arc::clone(saved));
                true
            }
            _ => false,
        }
    }

    pub fn search_results(&self) -> &[Place] {
        &self.search_results
    }

    pub fn begin_search(&mut self) -> SearchTicket {
        self.last_issued += 1;
        SearchTicket(self.last_issued)
    }

    /// Installs `results` if `ticket` is the latest issued search; otherwise
    /// the response is stale (or was never issued) and dropped. Returns whether it was applied.
    pub fn apply_search_results(&mut self, ticket: SearchTicket, results: Vec<Place>) -> bool {
        if ticket.0 == 0 || ticket.0 != self.last_issued {
            debug!(
                "Dropping stale search response #{} (latest #{})",
                ticket.0, self.last_issued
            );
            return false;
        }
        self.search_results = results;
        true
    }
}
