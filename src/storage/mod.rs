pub mod catalog_store;

pub use catalog_store::{decode_catalog, CatalogSource, CatalogStore, SourceStat};
