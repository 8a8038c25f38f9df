//! Remote upload contract.

use crate::error::Result;
use crate::observation::Note;

/// Client for a remote detection-sharing service.
///
/// Uploads are best-effort: a failure is logged and the detection is not
/// retried within the pipeline.
pub trait UploadClient: Send + Sync {
    /// Upload a note together with its audio clip.
    ///
    /// # Errors
    ///
    /// Returns an error when the upload fails.
    fn publish(&self, note: &Note, pcm_data: &[u8]) -> Result<()>;
}
