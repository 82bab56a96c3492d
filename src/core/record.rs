use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::interval::IntervalList;

/// 一个真实磁盘目录：其中文件按固定 `duration` 切段，覆盖 `intervals`。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub directory: String,
    pub duration: i64,
    pub intervals: IntervalList,
}

impl CatalogRecord {
    pub fn new(directory: impl Into<String>, duration: i64, intervals: IntervalList) -> Self {
        Self {
            directory: directory.into(),
            duration,
            intervals,
        }
    }

    /// 该记录是否持有起点为 `start` 的文件。
    ///
    /// 先用首尾区间做快速排除，再逐个区间判定成员关系。
    pub fn covers(&self, start: i64) -> bool {
        match self.intervals.span() {
            Some((lo, hi)) if start >= lo && start < hi => self.intervals.contains(start),
            _ => false,
        }
    }
}

/// 叶子文件名：`SITE-TYPE-START-DURATION.EXT`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafName {
    pub site: String,
    pub frame_type: String,
    pub start: i64,
    pub duration: i64,
    pub ext: String,
}

/// 文件名不符合 `SITE-TYPE-START-DURATION.EXT`
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid leaf name: {0}")]
pub struct InvalidLeafName(pub String);

fn leaf_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // 四个以 '-' 分隔的字段，最后一个字段恰好含一个 '.'
        Regex::new(r"^([^-/]+)-([^-/]+)-(-?[0-9]+)-([0-9]+)\.([^-./]+)$")
            .expect("leaf name pattern is valid")
    })
}

impl FromStr for LeafName {
    type Err = InvalidLeafName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidLeafName(s.to_string());
        let caps = leaf_pattern().captures(s).ok_or_else(invalid)?;
        let start = caps[3].parse::<i64>().map_err(|_| invalid())?;
        let duration = caps[4].parse::<i64>().map_err(|_| invalid())?;
        let leaf = Self {
            site: caps[1].to_string(),
            frame_type: caps[2].to_string(),
            start,
            duration,
            ext: caps[5].to_string(),
        };
        // 只接受规范写法：补零或 "-0" 指向的文件不可能存在
        if leaf.to_string() != s {
            return Err(invalid());
        }
        Ok(leaf)
    }
}

impl fmt::Display for LeafName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}.{}",
            self.site, self.frame_type, self.start, self.duration, self.ext
        )
    }
}
