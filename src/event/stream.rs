use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::EventKind;
use tokio::sync::mpsc;

use crate::event::watcher::{watch_catalog, EventWatcher};
use crate::index::LiveCatalog;

/// catalog 变更流：文件被替换时主动刷新，不必等下一次列目录
pub struct CatalogWatcher {
    pub catalog: Arc<LiveCatalog>,
    pub catalog_path: PathBuf,
}

impl CatalogWatcher {
    pub fn new(catalog: Arc<LiveCatalog>, catalog_path: PathBuf) -> Self {
        Self {
            catalog,
            catalog_path,
        }
    }

    /// 持有 watcher 并循环消费事件，直到 channel 关闭
    pub async fn run(self, channel_size: usize) -> anyhow::Result<()> {
        if self.catalog_path.file_name().is_none() {
            anyhow::bail!("catalog path has no file name: {:?}", self.catalog_path);
        }
        let (rx, mut watcher) = EventWatcher::start(channel_size, self.catalog.clone())?;
        watch_catalog(&mut watcher, &self.catalog_path)?;
        tracing::info!("Watching catalog {:?}", self.catalog_path);
        self.consume(rx).await;
        drop(watcher);
        Ok(())
    }

    async fn consume(&self, mut rx: mpsc::Receiver<notify::Event>) {
        while let Some(event) = rx.recv().await {
            if !is_catalog_event(&event, &self.catalog_path) {
                continue;
            }
            // 合并同一批次的后续事件（tmp 写入 + rename 通常成串到达）
            while rx.try_recv().is_ok() {}

            let catalog = self.catalog.clone();
            let res = tokio::task::spawn_blocking(move || catalog.refresh(false)).await;
            match res {
                Ok(Ok(true)) => tracing::debug!("catalog refreshed after change event"),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => tracing::warn!("catalog refresh after change failed: {}", e),
                Err(e) => tracing::warn!("catalog refresh task failed: {}", e),
            }
        }
    }
}

/// 只认 catalog 文件名本身（tmp 文件、访问事件都忽略）
pub(crate) fn is_catalog_event(event: &notify::Event, catalog_path: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    let Some(name) = catalog_path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}
