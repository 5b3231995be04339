pub mod openai;
pub mod traits;

pub use openai::OpenAiEmbedder;
pub use traits::{normalize, Embedder, EmbeddingError};
