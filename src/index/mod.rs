pub mod catalog;
pub mod live;

pub use catalog::{CatalogEntry, CatalogIndex, Level0, Level1, Level2};
pub use live::LiveCatalog;
