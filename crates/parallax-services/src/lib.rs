//! Outbound collaborator adapters
//!
//! Typed HTTP clients for the inference service and the external media
//! library, plus a small image-dimension probe. Neither client retries;
//! retry policy belongs to the worker and the model manager.

pub mod inference;
pub mod library;
pub mod probe;

pub use inference::{HealthStatus, InferenceClient, RemoteModel};
pub use library::{LibraryAsset, LibraryAssetInfo, LibraryClient, TimelineBucket};
pub use probe::probe_dimensions;
