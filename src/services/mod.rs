pub mod gemini;
pub mod null;
pub mod provider;
pub mod scheduler;

pub use gemini::GeminiEmbeddingProvider;
pub use null::NullEmbeddingProvider;
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use scheduler::{RequestScheduler, SchedulerConfig};
