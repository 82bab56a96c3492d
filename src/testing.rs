//! 测试用 catalog 来源与固定样本

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::CatalogLoadError;
use crate::index::catalog::{CatalogEntry, CatalogIndex};
use crate::storage::{CatalogSource, SourceStat};

fn entry(
    ext: &str,
    ty: &str,
    site: &str,
    dir: &str,
    duration: i64,
    intervals: &[(i64, i64)],
) -> CatalogEntry {
    CatalogEntry {
        ext: ext.into(),
        frame_type: ty.into(),
        site: site.into(),
        directory: dir.into(),
        duration,
        intervals: intervals.to_vec(),
    }
}

/// gwf/H1_R/H1 两段记录 + 同前缀的 H1_RDS + L1 + hdf5
pub(crate) fn sample_index() -> CatalogIndex {
    CatalogIndex::from_entries(vec![
        entry(
            "gwf",
            "H1_R",
            "H1",
            "/data/H1",
            4096,
            &[(1_000_000_000, 1_000_008_192)],
        ),
        entry(
            "gwf",
            "H1_R",
            "H1",
            "/archive/H1",
            4096,
            &[(1_000_090_112, 1_000_106_496)],
        ),
        entry("gwf", "H1_RDS", "H1", "/data/H1_RDS", 64, &[(1_000_000_000, 1_000_000_128)]),
        entry("gwf", "L1_R", "L1", "/data/L1", 4096, &[(999_999_000, 1_000_003_096)]),
        entry("hdf5", "H1_HOFT", "H1", "/data/hoft", 4096, &[(1_000_000_000, 1_000_004_096)]),
    ])
}

/// 内存 catalog 来源：`index = None` 表示内容损坏
pub(crate) struct MemorySource {
    state: Mutex<(SystemTime, Option<CatalogIndex>)>,
    ctime: SystemTime,
    loads: AtomicU64,
}

impl MemorySource {
    pub(crate) fn new(index: CatalogIndex) -> Self {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        Self {
            state: Mutex::new((t, Some(index))),
            ctime: t,
            loads: AtomicU64::new(0),
        }
    }

    pub(crate) fn corrupt() -> Self {
        let s = Self::new(CatalogIndex::default());
        s.state.lock().1 = None;
        s
    }

    /// 替换内容并把 mtime 向前推进
    pub(crate) fn replace(&self, index: Option<CatalogIndex>, advance: Duration) {
        let mut st = self.state.lock();
        st.0 += advance;
        st.1 = index;
    }

    pub(crate) fn mtime(&self) -> SystemTime {
        self.state.lock().0
    }

    pub(crate) fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl CatalogSource for MemorySource {
    fn stat(&self) -> Result<SourceStat, CatalogLoadError> {
        Ok(SourceStat {
            mtime: self.state.lock().0,
            ctime: self.ctime,
            len: 0,
        })
    }

    fn load(&self) -> Result<CatalogIndex, CatalogLoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.state
            .lock()
            .1
            .clone()
            .ok_or_else(|| CatalogLoadError::Header("corrupt test catalog".into()))
    }
}
