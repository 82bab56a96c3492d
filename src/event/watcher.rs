use std::path::Path;
use std::sync::Arc;

use notify::{Config, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::index::LiveCatalog;

/// catalog 文件系统事件监听器
/// 使用 bounded channel 做背压，避免无限堆积
pub struct EventWatcher;

impl EventWatcher {
    /// 启动监听，返回事件接收端
    pub fn start(
        channel_size: usize,
        catalog: Arc<LiveCatalog>,
    ) -> anyhow::Result<(mpsc::Receiver<notify::Event>, notify::RecommendedWatcher)> {
        let (tx, rx) = mpsc::channel(channel_size);

        let watcher = notify::RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    // 非阻塞发送：队列满时丢弃并计数（下一次列目录仍会按 mtime 刷新）
                    if tx.try_send(event).is_err() {
                        let drops = catalog.record_overflow_drop();
                        if drops % 1000 == 1 {
                            tracing::warn!("catalog event channel overflow, total drops: {}", drops);
                        }
                    }
                }
                Err(e) => tracing::warn!("catalog watch error: {}", e),
            },
            Config::default(),
        )?;

        // 注意：watcher 必须由调用方持有，否则会被 drop
        Ok((rx, watcher))
    }
}

/// 监听 catalog 所在目录（而不是文件本身）：
/// 原子替换是 rename，文件 inode 会变
pub fn watch_catalog(
    watcher: &mut notify::RecommendedWatcher,
    catalog_path: &Path,
) -> anyhow::Result<()> {
    let dir = match catalog_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(())
}
