pub mod fuse;
pub mod listing;
pub mod path;
pub mod resolver;

pub use fuse::{mount, CatalogFs};
pub use listing::ListingConfig;
pub use path::{depth, PathKind};
pub use resolver::{Attributes, EntryKind, MutatingOp, Resolver};
