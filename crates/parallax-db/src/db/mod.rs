//! Repository implementations, one per domain entity.

mod artifact;
mod job;
mod media;
mod model;
mod settings;

pub use artifact::{ArtifactRepository, UpsertArtifact};
pub use job::JobRepository;
pub use media::MediaRepository;
pub use model::ModelCatalogRepository;
pub use settings::SettingsRepository;
