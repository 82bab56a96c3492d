use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::{CatalogRecord, Interval, IntervalList};
use crate::error::FsError;
use crate::stats::IndexStats;

/// L0: ext -> 类型标识集合
pub type Level0 = BTreeMap<String, BTreeSet<String>>;
/// L1: (ext, type) -> 站点集合
pub type Level1 = BTreeMap<(String, String), BTreeSet<String>>;
/// L2: (ext, type, site) -> 真实目录记录（权威数据）
pub type Level2 = BTreeMap<(String, String, String), Vec<CatalogRecord>>;

/// 三级 catalog 索引快照。加载后不可变，刷新时整体替换。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogIndex {
    pub l0: Level0,
    pub l1: Level1,
    pub l2: Level2,
}

/// 扁平的 catalog 条目（dcfs-pack 的输入格式）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub ext: String,
    #[serde(rename = "type")]
    pub frame_type: String,
    pub site: String,
    pub directory: String,
    pub duration: i64,
    pub intervals: Vec<(i64, i64)>,
}

impl CatalogIndex {
    pub fn from_levels(l0: Level0, l1: Level1, l2: Level2) -> Self {
        Self { l0, l1, l2 }
    }

    /// 从扁平条目推导三级映射
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut idx = Self::default();
        for e in entries {
            idx.l0
                .entry(e.ext.clone())
                .or_default()
                .insert(e.frame_type.clone());
            idx.l1
                .entry((e.ext.clone(), e.frame_type.clone()))
                .or_default()
                .insert(e.site.clone());
            let intervals: IntervalList = e
                .intervals
                .iter()
                .map(|&(s, t)| Interval::new(s, t))
                .collect();
            idx.l2
                .entry((e.ext, e.frame_type, e.site))
                .or_default()
                .push(CatalogRecord::new(e.directory, e.duration, intervals));
        }
        idx
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.l0.keys().map(String::as_str)
    }

    pub fn lookup_l0(&self, ext: &str) -> Result<&BTreeSet<String>, FsError> {
        self.l0
            .get(ext)
            .ok_or_else(|| FsError::not_found(format!("extension {ext}")))
    }

    pub fn lookup_l1(&self, ext: &str, frame_type: &str) -> Result<&BTreeSet<String>, FsError> {
        self.l1
            .get(&(ext.to_string(), frame_type.to_string()))
            .ok_or_else(|| FsError::not_found(format!("{ext}/{frame_type}")))
    }

    pub fn lookup_l2(
        &self,
        ext: &str,
        frame_type: &str,
        site: &str,
    ) -> Result<&[CatalogRecord], FsError> {
        self.l2
            .get(&(ext.to_string(), frame_type.to_string(), site.to_string()))
            .map(Vec::as_slice)
            .ok_or_else(|| FsError::not_found(format!("{ext}/{frame_type}/{site}")))
    }

    pub fn stats(&self) -> IndexStats {
        let records = self.l2.values().map(Vec::len).sum();
        let intervals = self
            .l2
            .values()
            .flat_map(|v| v.iter())
            .map(|r| r.intervals.len())
            .sum();
        IndexStats {
            extensions: self.l0.len(),
            types: self.l0.values().map(BTreeSet::len).sum(),
            sites: self.l1.values().map(BTreeSet::len).sum(),
            records,
            intervals,
        }
    }
}
