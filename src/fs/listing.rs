//! 每种目录深度一个列目录规则，外加叶子名 → 真实路径的解析。
//!
//! 这里的函数都是对某个不可变 [`CatalogIndex`] 快照的纯计算；
//! 刷新与错误统一由 [`crate::fs::resolver`] 负责。

use std::collections::{BTreeSet, HashSet};

use crate::core::{Interval, LeafName};
use crate::error::FsError;
use crate::index::CatalogIndex;
use crate::query::matcher::{truncate_prefix, PrefixMatcher};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListingConfig {
    pub bucket_size: i64,
    pub prefix_len: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            bucket_size: 100_000,
            prefix_len: 5,
        }
    }
}

/// 桶 `b` 覆盖的时间范围 `[b*B, (b+1)*B)`
pub fn bucket_range(bucket: i64, bucket_size: i64) -> Option<Interval> {
    let start = bucket.checked_mul(bucket_size)?;
    let end = start.checked_add(bucket_size)?;
    Some(Interval::new(start, end))
}

pub fn bucket_of(t: i64, bucket_size: i64) -> i64 {
    t.div_euclid(bucket_size)
}

/// depth 0：所有扩展名
pub fn list_root(idx: &CatalogIndex) -> Vec<String> {
    idx.extensions().map(str::to_string).collect()
}

/// depth 1：类型标识截断后的去重前缀
pub fn list_extension(
    idx: &CatalogIndex,
    ext: &str,
    cfg: &ListingConfig,
) -> Result<Vec<String>, FsError> {
    let prefixes: BTreeSet<&str> = idx
        .lookup_l0(ext)?
        .iter()
        .map(|t| truncate_prefix(t, cfg.prefix_len))
        .collect();
    Ok(prefixes.into_iter().map(str::to_string).collect())
}

/// depth 2：截断前缀匹配 `prefix` 的完整类型标识
pub fn list_prefix(
    idx: &CatalogIndex,
    ext: &str,
    prefix: &str,
    cfg: &ListingConfig,
) -> Result<Vec<String>, FsError> {
    let m = PrefixMatcher::new(prefix);
    Ok(idx
        .lookup_l0(ext)?
        .iter()
        .filter(|t| m.matches(truncate_prefix(t, cfg.prefix_len)))
        .cloned()
        .collect())
}

/// depth 3：持有该类型数据的站点
pub fn list_type(idx: &CatalogIndex, ext: &str, frame_type: &str) -> Result<Vec<String>, FsError> {
    Ok(idx.lookup_l1(ext, frame_type)?.iter().cloned().collect())
}

/// depth 4：至少含一个文件起点的时间桶编号
pub fn list_site(
    idx: &CatalogIndex,
    ext: &str,
    frame_type: &str,
    site: &str,
    cfg: &ListingConfig,
) -> Result<Vec<String>, FsError> {
    let b = cfg.bucket_size;
    let mut buckets: BTreeSet<i64> = BTreeSet::new();

    for rec in idx.lookup_l2(ext, frame_type, site)? {
        if rec.duration <= 0 {
            tracing::debug!(
                "skip record {} with non-positive duration {}",
                rec.directory,
                rec.duration
            );
            continue;
        }
        for iv in &rec.intervals {
            // 沿步长起点跳桶：每次直接跳到下一个桶内的第一个起点，
            // 迭代次数等于非空桶数而不是区间跨越的桶数
            let mut next = iv.stride_starts(rec.duration, *iv).next();
            while let Some(t) = next {
                let bucket = bucket_of(t, b);
                buckets.insert(bucket);
                let Some(after) = bucket.checked_add(1).and_then(|n| n.checked_mul(b)) else {
                    break;
                };
                if after >= iv.end {
                    break;
                }
                next = iv
                    .stride_starts(rec.duration, Interval::new(after, iv.end))
                    .next();
            }
        }
    }

    Ok(buckets.into_iter().map(|n| n.to_string()).collect())
}

/// depth 5：桶内所有文件的叶子名 `SITE-TYPE-START-DURATION.EXT`
pub fn list_bucket(
    idx: &CatalogIndex,
    ext: &str,
    frame_type: &str,
    site: &str,
    bucket: &str,
    cfg: &ListingConfig,
) -> Result<Vec<String>, FsError> {
    let bucket: i64 = bucket
        .parse()
        .map_err(|_| FsError::not_found(format!("bucket {bucket}")))?;
    let range = bucket_range(bucket, cfg.bucket_size)
        .ok_or_else(|| FsError::not_found(format!("bucket {bucket} out of range")))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for rec in idx.lookup_l2(ext, frame_type, site)? {
        if !rec.intervals.intersects(&range) {
            continue;
        }
        for iv in rec.intervals.iter().filter(|iv| iv.intersects(&range)) {
            for start in iv.stride_starts(rec.duration, range) {
                let name = LeafName {
                    site: site.to_string(),
                    frame_type: frame_type.to_string(),
                    start,
                    duration: rec.duration,
                    ext: ext.to_string(),
                }
                .to_string();
                if seen.insert(name.clone()) {
                    out.push(name);
                }
            }
        }
    }
    Ok(out)
}

/// 叶子名 → 真实文件路径（`directory/name`）
pub fn resolve_leaf(idx: &CatalogIndex, ext: &str, name: &str) -> Result<String, FsError> {
    let leaf: LeafName = name.parse()?;
    if leaf.ext != ext {
        return Err(FsError::not_found(format!(
            "{name}: extension does not match /{ext}"
        )));
    }

    idx.lookup_l2(&leaf.ext, &leaf.frame_type, &leaf.site)?
        .iter()
        .filter(|rec| rec.duration == leaf.duration)
        .find(|rec| rec.covers(leaf.start))
        .map(|rec| format!("{}/{}", rec.directory, name))
        .ok_or_else(|| FsError::not_found(name.to_string()))
}
