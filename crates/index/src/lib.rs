pub mod cache;
pub mod embeddings;
pub mod file_store;
pub mod qdrant_index;

pub use cache::EmbeddingCache;
pub use embeddings::EmbeddingClient;
pub use file_store::FileResponseStore;
pub use qdrant_index::{QdrantCollection, QdrantResponseStore, QdrantRetriever, parse_search_response};
