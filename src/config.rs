//! Store configuration handed over by the host at startup.

use serde::{Deserialize, Serialize};

use crate::local_db_model::Coordinates;

/// Key under which the whole saved-place array is stored.
pub const DEFAULT_STORAGE_KEY: &str = "saved_places";

/// LMDB map size used when the host does not ask for one (10 MiB).
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

/// City-center point used until (or instead of) a geolocation fix.
pub const DEFAULT_ORIGIN: Coordinates = Coordinates {
    latitude: 37.7749,
    longitude: -122.4194,
};

/// Configuration for [`crate::AppState`].
///
/// Every field is optional in JSON; missing ones take the defaults above.
///
/// ```json
/// { "name": "reviews", "storageKey": "saved_places", "mapSize": 10485760,
///   "defaultOrigin": { "latitude": 40.4168, "longitude": -3.7038 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Database name; the environment lives in `<name>.lmdb`.
    pub name: String,
    pub storage_key: String,
    pub map_size: usize,
    pub default_origin: Coordinates,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "checkin_store".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            map_size: DEFAULT_MAP_SIZE,
            default_origin: DEFAULT_ORIGIN,
        }
    }
}

impl StoreConfig {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Directory the LMDB environment is opened in.
    pub fn db_path(&self) -> String {
        format!("{}.lmdb", self.name)
    }
}
