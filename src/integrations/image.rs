//! Species image lookup contract.

use serde::Serialize;

/// Image metadata attached to published detections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageDescriptor {
    /// Image URL.
    pub url: String,
    /// Photographer name.
    pub author_name: String,
    /// Photographer profile URL.
    pub author_url: String,
    /// License short name.
    pub license_name: String,
    /// License URL.
    pub license_url: String,
}

/// Cache-backed species image lookup.
///
/// Lookup failures are not detection failures; a missing image simply
/// leaves the published payload without one.
pub trait ImageProvider: Send + Sync {
    /// Image descriptor for a scientific name, if one is known.
    fn get(&self, scientific_name: &str) -> Option<ImageDescriptor>;
}
