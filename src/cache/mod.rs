pub mod catalog;
pub mod embedding;

pub use catalog::{CatalogCache, CatalogSource, JsonFileCatalog, StaticCatalog};
pub use embedding::EmbeddingCache;
