#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod fs;
pub mod index;
pub mod query;
pub mod stats;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
