//! # Check-in Core
//!
//! Local store for a map-based personal review app. Users search for nearby
//! venues, look at them on a map, and record check-ins (rating, note, photo)
//! against the ones they visit. This crate owns the part with real contracts:
//! the saved-place collection, its merge rules, the current selection and the
//! normalization of search answers. Map rendering, forms and the AI-backed
//! search/caption services stay in the host and talk to the crate through
//! JSON over a C-compatible FFI.
//!
//! ## Features
//!
//! - **LMDB persistence**: the saved collection is rewritten in full under one key after every check-in
//! - **Merge, not duplicate**: one saved entry per place id, check-ins appended in order
//! - **Copy-on-write entries**: handles taken before a check-in keep their old value
//! - **Fail-soft startup**: corrupt or missing data yields an empty store
//! - **Last-issued-wins search**: stale search responses are dropped
//!
//! ## Quick Start
//!
//! ```no_run
//! use checkin_core::{create_store_with_name, add_check_in, free_response};
//! use std::ffi::CString;
//!
//! let name = CString::new("reviews").unwrap();
//! let state = create_store_with_name(name.as_ptr());
//!
//! let request = CString::new(r#"{
//!     "place": {"id": "p1", "name": "Blue Bottle", "location": {"latitude": 37.77, "longitude": -122.42}},
//!     "checkIn": {"rating": 5, "text": "Great pour-over"}
//! }"#).unwrap();
//! let response = add_check_in(state, request.as_ptr());
//! free_response(response);
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_store`] / [`create_store_with_name`] - open the store and hydrate it
//! - [`get_saved_places`], [`find_saved`], [`get_timeline`] - read saved data
//! - [`add_check_in`] - record a check-in, refreshing the selection if it targets it
//! - [`select_place`], [`clear_selection`], [`get_selection`] - selection state
//! - [`set_origin`] - hand over the startup location fix
//! - [`begin_search`], [`apply_search_results`] - search result bookkeeping
//! - [`flush_store`] - retry a failed write
//! - [`close_store`] - release the store
//! - [`free_response`] - release a string returned by any function above

pub mod app_response;
pub mod config;
pub mod local_db_model;
pub mod local_db_state;
pub mod place_store;
pub mod search;
pub mod selection;
pub mod services;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::config::StoreConfig;
use crate::local_db_model::{CheckInDraft, Coordinates, Place, SavedPlace, Selection, TimelineEntry};
use crate::local_db_state::{AppDbState, KeyValueStorage};
use crate::place_store::PlaceStore;
use crate::search::{normalize_results, resolve_search, PlaceSearchClient, RawPlace};
use crate::selection::{SearchTicket, SelectionController};
use crate::services::{resolve_origin, valid_position, GeoLocationProvider};

/// Everything the host holds on to: the store, the selection and the origin
/// used to bias searches.
pub struct AppState<S: KeyValueStorage = AppDbState> {
    store: PlaceStore<S>,
    selection: SelectionController,
    origin: Coordinates,
    config: StoreConfig,
}

impl AppState<AppDbState> {
    /// Opens the LMDB environment named by `config` and hydrates the store.
    pub fn open(config: StoreConfig) -> Result<Self, AppResponse> {
        let storage = AppDbState::open(config.db_path(), config.map_size)?;
        Ok(Self::with_storage(storage, config))
    }
}

impl<S: KeyValueStorage> AppState<S> {
    pub fn with_storage(storage: S, config: StoreConfig) -> Self {
        let store = PlaceStore::open_with_key(storage, config.storage_key.clone());
        Self {
            store,
            selection: SelectionController::new(),
            origin: config.default_origin,
            config,
        }
    }

    pub fn store(&self) -> &PlaceStore<S> {
        &self.store
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn origin(&self) -> Coordinates {
        self.origin
    }

    /// Queries `provider` once; on failure the current origin stays.
    pub fn locate<P: GeoLocationProvider + ?Sized>(&mut self, provider: &P) -> Coordinates {
        self.origin = resolve_origin(provider, self.origin);
        self.origin
    }

    /// Takes a position fix handed over by the host. Out-of-range or
    /// non-finite positions are ignored and the current origin stays.
    pub fn set_origin(&mut self, position: Coordinates) -> Coordinates {
        if valid_position(&position) {
            self.origin = position;
        } else {
            warn!("Ignoring out-of-range position {position:?}, keeping origin");
        }
        self.origin
    }

    /// Records a check-in and keeps the selection pointing at the canonical entry.
    pub fn check_in(&mut self, place: &Place, draft: CheckInDraft) -> Result<Arc<SavedPlace>, AppResponse> {
        let saved = self.store.add_check_in(place, draft)?;
        self.selection.refresh_if_selected(&saved);
        Ok(saved)
    }

    pub fn select(&mut self, place: Place) -> &Selection {
        self.selection.select(place, &self.store)
    }

    pub fn select_by_id(&mut self, id: &str) -> Option<&Selection> {
        self.selection.select_by_id(id, &self.store)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.store.timeline()
    }

    pub fn begin_search(&mut self) -> SearchTicket {
        self.selection.begin_search()
    }

    /// Normalizes a provider answer for `ticket` and installs it if still current.
    pub fn apply_search(
        &mut self,
        ticket: SearchTicket,
        query: &str,
        origin: Option<Coordinates>,
        raw: Vec<RawPlace>,
    ) -> bool {
        let places = normalize_results(raw, query, origin.or(Some(self.origin)), self.origin);
        self.selection.apply_search_results(ticket, places)
    }

    /// Runs a whole search through `client` and returns the installed results.
    pub fn search<C: PlaceSearchClient + ?Sized>(&mut self, client: &C, query: &str) -> &[Place] {
        let ticket = self.begin_search();
        let places = resolve_search(client, query, Some(self.origin), self.origin);
        self.selection.apply_search_results(ticket, places);
        self.selection.search_results()
    }

    pub fn flush(&mut self) -> Result<(), AppResponse> {
        self.store.flush()
    }

    pub fn into_store(self) -> PlaceStore<S> {
        self.store
    }
}

/// Body of [`add_check_in`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub place: Place,
    pub check_in: CheckInDraft,
}

/// Body of [`apply_search_results`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultsRequest {
    pub ticket: u64,
    pub query: String,
    #[serde(default)]
    pub origin: Option<Coordinates>,
    #[serde(default)]
    pub results: Vec<RawPlace>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultsReply<'a> {
    applied: bool,
    results: &'a [Place],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionReply<'a> {
    selection: Option<&'a Selection>,
    is_saved: bool,
    check_in_count: usize,
}

impl<'a> SelectionReply<'a> {
    fn from_selection(selection: Option<&'a Selection>) -> Self {
        Self {
            selection,
            is_saved: selection.map_or(false, Selection::is_saved),
            check_in_count: selection.map_or(0, Selection::check_in_count),
        }
    }
}

/// Opens the store described by a JSON [`StoreConfig`].
///
/// # Parameters
///
/// * `config_json` - Null-terminated JSON object; every field is optional
///
/// # Returns
///
/// Pointer to the [`AppState`], or null if the pointer, the JSON or the
/// environment could not be used. Release it with [`close_store`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use checkin_core::create_store;
///
/// let config = CString::new(r#"{"name":"reviews","defaultOrigin":{"latitude":40.4168,"longitude":-3.7038}}"#).unwrap();
/// let state = create_store(config.as_ptr());
/// assert!(!state.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(config_json: *const c_char) -> *mut AppState {
    if config_json.is_null() {
        warn!("Null config pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let json = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config: StoreConfig = match serde_json::from_str(json) {
        Ok(c) => c,
        Err(e) => {
            warn!("Invalid store config: {e}");
            return std::ptr::null_mut();
        }
    };

    open_state(config)
}

/// Opens the store at `<name>.lmdb` with default settings.
///
/// Shorthand for [`create_store`] with only `name` set.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_with_name(name: *const c_char) -> *mut AppState {
    if name.is_null() {
        warn!("Null name pointer passed to create_store_with_name");
        return std::ptr::null_mut();
    }

    match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => open_state(StoreConfig::with_name(s)),
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            std::ptr::null_mut()
        }
    }
}

fn open_state(config: StoreConfig) -> *mut AppState {
    let path = config.db_path();
    info!("Attempting to open store at: {}", path);

    match AppState::open(config) {
        Ok(state) => {
            info!("✅ Store opened with {} saved places", state.store().len());
            Box::into_raw(Box::new(state))
        }
        Err(e) => {
            warn!("❌ Failed to open store at {}: {}", path, e);
            std::ptr::null_mut()
        }
    }
}

/// Returns every saved place, in first-saved-first order, as a JSON array.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_saved_places(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "get_saved_places") {
        Ok(s) => s,
        Err(err) => return err,
    };
    json_response(&state.store().saved_places())
}

/// Looks up a saved place by id.
///
/// # Returns
///
/// `Ok` with the saved place JSON, or `NotFound` if no check-in was ever
/// recorded for that id.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn find_saved(state: *mut AppState, id: *const c_char) -> *const c_char {
    let state = match state_mut(state, "find_saved") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let id_str = match c_ptr_to_string(id, "id") {
        Ok(id) => id,
        Err(err) => return err,
    };

    match state.store().find_saved(&id_str) {
        Some(saved) => json_response(&saved),
        None => {
            let error = AppResponse::NotFound(format!("No saved place with id: {id_str}"));
            response_to_c_string(&error)
        }
    }
}

/// Records a check-in.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_store`]
/// * `json_ptr` - [`CheckInRequest`] JSON: `{"place": Place, "checkIn": {"rating", "text", "image"?}}`
///
/// # Returns
///
/// `Ok` with the resulting saved place. The host should use this value from
/// now on; if the place was selected, the selection already points at it.
/// Ratings outside 1..=5 give `ValidationError` and change nothing.
///
/// # JSON Format
///
/// ```json
/// {
///   "place": { "id": "p1", "name": "Cafe", "location": { "latitude": 1.0, "longitude": 2.0 } },
///   "checkIn": { "rating": 4, "text": "Nice", "image": "data:image/jpeg;base64,..." }
/// }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_check_in(state: *mut AppState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_mut(state, "add_check_in") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let request: CheckInRequest = match serde_json::from_str(&json_str) {
        Ok(r) => r,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid check-in JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match state.check_in(&request.place, request.check_in) {
        Ok(saved) => json_response(&saved),
        Err(e) => response_to_c_string(&e),
    }
}

/// Returns all check-ins across saved places, newest first.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_timeline(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "get_timeline") {
        Ok(s) => s,
        Err(err) => return err,
    };
    json_response(&state.timeline())
}

/// Focuses a place. Saved places are swapped for their canonical entry.
///
/// `json_ptr` is a [`Place`] JSON object. The reply has the same shape as
/// [`get_selection`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn select_place(state: *mut AppState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_mut(state, "select_place") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let place: Place = match serde_json::from_str(&json_str) {
        Ok(p) => p,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid place JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let selected = state.select(place);
    json_response(&SelectionReply::from_selection(Some(selected)))
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_selection(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "clear_selection") {
        Ok(s) => s,
        Err(err) => return err,
    };
    state.clear_selection();
    response_to_c_string(&AppResponse::success("Selection cleared"))
}

/// Current selection as `{"selection": ..|null, "isSaved": bool, "checkInCount": n}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_selection(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "get_selection") {
        Ok(s) => s,
        Err(err) => return err,
    };
    json_response(&SelectionReply::from_selection(state.selection().selected()))
}

/// Issues a ticket for a search the host is about to run.
///
/// The `Ok` payload is the ticket number; hand it back to
/// [`apply_search_results`] with the provider's answer.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn begin_search(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "begin_search") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let ticket = state.begin_search();
    response_to_c_string(&AppResponse::success(ticket.0.to_string()))
}

/// Normalizes a provider answer and installs it if its ticket is still the latest.
///
/// # Parameters
///
/// * `json_ptr` - [`SearchResultsRequest`] JSON: `{"ticket", "query", "origin"?, "results": [..]}`
///
/// # Returns
///
/// `Ok` with `{"applied": bool, "results": [Place]}`; `results` is whatever is
/// installed afterwards, so a stale answer returns the newer list untouched.
/// An empty `results` array installs the single simulated place.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn apply_search_results(state: *mut AppState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_mut(state, "apply_search_results") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let request: SearchResultsRequest = match serde_json::from_str(&json_str) {
        Ok(r) => r,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid search results JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let applied = state.apply_search(
        SearchTicket(request.ticket),
        &request.query,
        request.origin,
        request.results,
    );
    json_response(&SearchResultsReply {
        applied,
        results: state.selection().search_results(),
    })
}

/// Hands over the host's one-shot location fix.
///
/// # Parameters
///
/// * `json_ptr` - [`Coordinates`] JSON: `{"latitude": 40.41, "longitude": -3.70}`
///
/// # Returns
///
/// `Ok` with the origin now in effect. An out-of-range fix is ignored, so the
/// reply then carries the previous (default) origin. Later searches without
/// an explicit origin are biased, and fall back, around this point.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn set_origin(state: *mut AppState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_mut(state, "set_origin") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let position: Coordinates = match serde_json::from_str(&json_str) {
        Ok(p) => p,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid coordinates JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let origin = state.set_origin(position);
    json_response(&origin)
}

/// Rewrites the saved collection to storage, e.g. after a failed write.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn flush_store(state: *mut AppState) -> *const c_char {
    let state = match state_mut(state, "flush_store") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.flush() {
        Ok(()) => response_to_c_string(&AppResponse::success("Saved places written")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Syncs and releases the store. The pointer must not be used afterwards.
///
/// # Notes
///
/// Useful before a Flutter hot restart, where the old environment has to be
/// gone before [`create_store`] opens the same path again.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut AppState) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { Box::from_raw(state) };
    match state.into_store().into_storage().close() {
        Ok(()) => response_to_c_string(&AppResponse::success("Store closed successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a string returned by any function of this crate.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Serializes `value` into an `Ok` response string.
fn json_response<T: Serialize + ?Sized>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Error serializing result: {e}"));
            response_to_c_string(&error)
        }
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller.
///
/// Returns null if the response cannot be serialized.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

fn state_mut<'a>(state: *mut AppState, fn_name: &str) -> Result<&'a mut AppState, *const c_char> {
    match unsafe { state.as_mut() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {fn_name}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Converts a C string pointer to a Rust `String`.
///
/// # Returns
///
/// * `Ok(String)` - If conversion was successful
/// * `Err(*const c_char)` - A ready-made `BadRequest` response for null pointers or invalid UTF-8
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
