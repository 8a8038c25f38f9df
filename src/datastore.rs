//! Persistent storage contract.

use crate::detection::SpeciesScore;
use crate::error::Result;
use crate::observation::Note;

/// Opaque datastore the persist action saves detections through.
///
/// Implementations (SQLite, MySQL) live outside the core; the pipeline only
/// needs this contract.
pub trait Datastore: Send + Sync {
    /// Save a note and its full prediction result vector.
    ///
    /// # Errors
    ///
    /// Returns an error when the save fails; the pipeline logs it, skips
    /// the dependent clip export, and continues.
    fn save(&self, note: &Note, results: &[SpeciesScore]) -> Result<()>;
}
