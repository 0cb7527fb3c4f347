//! Application services behind the REST facade.

mod cache_writer;
mod orchestrator;

pub use cache_writer::{spawn_cache_writer, CacheWrite};
pub use orchestrator::{GenerateTarget, GeneratedArtifact, Orchestrator};
