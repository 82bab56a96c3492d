pub mod stream;
pub mod watcher;

pub use stream::CatalogWatcher;
pub use watcher::EventWatcher;
