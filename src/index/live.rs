use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::CatalogLoadError;
use crate::index::catalog::CatalogIndex;
use crate::stats::RefreshStats;
use crate::storage::{CatalogSource, SourceStat};

/// 当前生效的 catalog 快照 + 基于 mtime 的惰性刷新
///
/// - 读路径：`snapshot()` 取一次 `Arc`，整个操作期间只看这一份，永远不会混读新旧 level。
/// - 写路径：新快照在锁外完整构建，最后一次 `store` 原子发布；失败时旧快照保持不变。
/// - `refresh_gate` 串行化刷新，避免并发刷新互相覆盖 last_loaded。
pub struct LiveCatalog {
    source: Arc<dyn CatalogSource>,
    current: ArcSwap<CatalogIndex>,
    refresh_gate: Mutex<Option<SystemTime>>,
    stats: Mutex<RefreshStats>,
}

impl LiveCatalog {
    /// 挂载时的强制加载；来源不可读时直接失败（没有可服务的旧快照）
    pub fn open(source: Arc<dyn CatalogSource>) -> Result<Self, CatalogLoadError> {
        let live = Self {
            source,
            current: ArcSwap::from_pointee(CatalogIndex::default()),
            refresh_gate: Mutex::new(None),
            stats: Mutex::new(RefreshStats::default()),
        };
        live.refresh(true)?;
        Ok(live)
    }

    pub fn snapshot(&self) -> Arc<CatalogIndex> {
        self.current.load_full()
    }

    pub fn source_stat(&self) -> Result<SourceStat, CatalogLoadError> {
        self.source.stat()
    }

    /// 最近一次成功加载时观测到的来源 mtime
    pub fn last_loaded(&self) -> Option<SystemTime> {
        *self.refresh_gate.lock()
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats.lock().clone()
    }

    pub fn record_overflow_drop(&self) -> u64 {
        let mut st = self.stats.lock();
        st.overflow_drops += 1;
        st.overflow_drops
    }

    /// `force` 或来源 mtime 超过上次加载值时重新加载。
    ///
    /// 返回 `Ok(true)` 表示发布了新快照，`Ok(false)` 表示无需刷新。
    /// last_loaded 记录的是读取之前观测到的 mtime：加载期间若来源再次变化，下次刷新仍会触发。
    pub fn refresh(&self, force: bool) -> Result<bool, CatalogLoadError> {
        let mut last_loaded = self.refresh_gate.lock();

        let stat = match self.source.stat() {
            Ok(s) => s,
            Err(e) => {
                self.stats.lock().failures += 1;
                return Err(e);
            }
        };

        if !force {
            if let Some(last) = *last_loaded {
                if last >= stat.mtime {
                    self.stats.lock().skipped += 1;
                    return Ok(false);
                }
            }
        }

        let next = match self.source.load() {
            Ok(idx) => idx,
            Err(e) => {
                self.stats.lock().failures += 1;
                tracing::warn!("Catalog reload failed, keeping previous index: {}", e);
                return Err(e);
            }
        };

        let summary = next.stats();
        self.current.store(Arc::new(next));
        *last_loaded = Some(stat.mtime);

        {
            let mut st = self.stats.lock();
            st.loads += 1;
            st.catalog_bytes = stat.len;
        }
        tracing::info!("Catalog loaded: {}", summary);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_index, MemorySource};
    use std::time::Duration;

    #[test]
    fn open_loads_immediately() {
        let src = Arc::new(MemorySource::new(sample_index()));
        let live = LiveCatalog::open(src.clone()).unwrap();
        assert_eq!(*live.snapshot(), sample_index());
        assert_eq!(live.last_loaded(), Some(src.mtime()));
        assert_eq!(src.load_count(), 1);
    }

    #[test]
    fn unchanged_mtime_skips_reload() {
        let src = Arc::new(MemorySource::new(sample_index()));
        let live = LiveCatalog::open(src.clone()).unwrap();
        assert!(!live.refresh(false).unwrap());
        assert!(!live.refresh(false).unwrap());
        assert_eq!(src.load_count(), 1);
        assert_eq!(live.stats().skipped, 2);

        assert!(live.refresh(true).unwrap());
        assert_eq!(src.load_count(), 2);
    }

    #[test]
    fn advanced_mtime_publishes_new_snapshot() {
        let src = Arc::new(MemorySource::new(sample_index()));
        let live = LiveCatalog::open(src.clone()).unwrap();
        let before = live.snapshot();

        src.replace(Some(CatalogIndex::default()), Duration::from_secs(5));
        assert!(live.refresh(false).unwrap());
        assert!(live.snapshot().l0.is_empty());
        // 旧 Arc 仍然完整可读
        assert_eq!(*before, sample_index());
        assert!(live.last_loaded().unwrap() >= src.mtime());
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let src = Arc::new(MemorySource::new(sample_index()));
        let live = LiveCatalog::open(src.clone()).unwrap();
        let loaded_at = live.last_loaded();

        src.replace(None, Duration::from_secs(5));
        assert!(live.refresh(false).is_err());
        assert_eq!(*live.snapshot(), sample_index());
        assert_eq!(live.last_loaded(), loaded_at);
        assert_eq!(live.stats().failures, 1);

        // 仍然 stale：下次刷新会重试
        assert!(live.refresh(false).is_err());
        assert_eq!(live.stats().failures, 2);
    }

    #[test]
    fn open_fails_on_corrupt_source() {
        let src = Arc::new(MemorySource::corrupt());
        assert!(LiveCatalog::open(src).is_err());
    }
}
