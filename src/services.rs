//! Thin contracts for the photo captioning and geolocation collaborators.
//!
//! Neither ever surfaces an error to the caller: captioning falls back to a
//! fixed string and geolocation falls back to the configured default origin.

use log::{info, warn};

use crate::app_response::AppResponse;
use crate::local_db_model::Coordinates;

/// Caption returned whenever the describer cannot produce one.
pub const FALLBACK_CAPTION: &str = "A memorable moment.";

/// External image describer.
pub trait PhotoDescriptionClient {
    fn describe(&self, image_base64: &str) -> Result<String, AppResponse>;
}

/// One-shot position source queried at startup.
pub trait GeoLocationProvider {
    fn current_position(&self) -> Result<Coordinates, AppResponse>;
}

/// Short caption for `image_base64`; [`FALLBACK_CAPTION`] on any failure.
pub fn describe_photo<C: PhotoDescriptionClient + ?Sized>(client: &C, image_base64: &str) -> String {
    if image_base64.trim().is_empty() {
        return FALLBACK_CAPTION.to_string();
    }
    match client.describe(strip_data_url(image_base64)) {
        Ok(caption) if !caption.trim().is_empty() => caption.trim().to_string(),
        Ok(_) => {
            warn!("Photo describer returned an empty caption");
            FALLBACK_CAPTION.to_string()
        }
        Err(e) => {
            warn!("Photo description failed: {e}");
            FALLBACK_CAPTION.to_string()
        }
    }
}

/// Position from `provider`, or `default` if it fails. No retry.
pub fn resolve_origin<P: GeoLocationProvider + ?Sized>(provider: &P, default: Coordinates) -> Coordinates {
    match provider.current_position() {
        Ok(position) if valid_position(&position) => {
            info!(
                "Using device position {:.5},{:.5}",
                position.latitude, position.longitude
            );
            position
        }
        Ok(position) => {
            warn!("Ignoring out-of-range position {position:?}, keeping default origin");
            default
        }
        Err(e) => {
            warn!("Geolocation unavailable ({e}), keeping default origin");
            default
        }
    }
}

pub(crate) fn valid_position(position: &Coordinates) -> bool {
    (-90.0..=90.0).contains(&position.latitude) && (-180.0..=180.0).contains(&position.longitude)
}

/// `data:image/jpeg;base64,AAAA` -> `AAAA`; plain base64 passes through.
fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => image,
    }
}
