//! Contracts for external services the pipeline fans out to.
//!
//! Implementations live outside the core; actions only see these traits.

mod bus;
mod image;
mod range;
mod upload;

pub use bus::{MessageBus, NotePayload};
pub use image::{ImageDescriptor, ImageProvider};
pub use range::{RangeFilterState, RangeProvider};
pub use upload::UploadClient;
