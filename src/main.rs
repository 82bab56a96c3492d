use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dcfs::config::Config;
use dcfs::event::CatalogWatcher;
use dcfs::fs::{CatalogFs, Resolver};
use dcfs::index::LiveCatalog;
use dcfs::storage::CatalogStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mount a frame-file catalog as a read-only directory tree
#[derive(Debug, Parser)]
#[command(name = "dcfs", version, about)]
struct Cli {
    /// Directory to mount on
    mountpoint: PathBuf,
    /// Catalog file produced by dcfs-pack
    catalog: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 参数缺失时 clap 打印 usage 并以非零状态退出
    let cli = Cli::parse();
    let config = Config::load_from_env()?;

    info!("Starting dcfs: {:?} -> {:?}", cli.catalog, cli.mountpoint);

    let store = Arc::new(CatalogStore::new(cli.catalog.clone()));
    let catalog = Arc::new(LiveCatalog::open(store)?);

    if config.watch {
        let watcher = CatalogWatcher::new(catalog.clone(), cli.catalog.clone());
        let channel_size = config.watch_channel_size;
        tokio::spawn(async move {
            if let Err(e) = watcher.run(channel_size).await {
                tracing::warn!("catalog watcher stopped: {}", e);
            }
        });
    }

    let resolver = Resolver::new(catalog, config.listing());
    let fs = CatalogFs::new(resolver, Duration::from_secs(config.attr_ttl_secs));

    // FUSE 会话是阻塞循环，放到 blocking 线程里，卸载后返回
    let mountpoint = cli.mountpoint.clone();
    tokio::task::spawn_blocking(move || dcfs::fs::mount(fs, &mountpoint, &config)).await??;

    info!("Unmounted {:?}", cli.mountpoint);
    Ok(())
}
