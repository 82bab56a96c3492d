use std::fmt;

/// 单个 catalog 快照的规模统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// L0 扩展名数量
    pub extensions: usize,
    /// L0 中 (ext, type) 总数
    pub types: usize,
    /// L1 中 (ext, type, site) 总数
    pub sites: usize,
    /// L2 记录总数
    pub records: usize,
    /// 所有记录的区间总数
    pub intervals: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} extensions, {} types, {} sites, {} records, {} intervals",
            self.extensions, self.types, self.sites, self.records, self.intervals
        )
    }
}

/// 刷新管道计数
#[derive(Clone, Debug, Default)]
pub struct RefreshStats {
    /// 成功加载次数（含挂载时的强制加载）
    pub loads: u64,
    /// 加载失败次数（旧快照继续生效）
    pub failures: u64,
    /// 因 mtime 未前进而跳过的刷新
    pub skipped: u64,
    /// watcher channel 溢出丢弃次数
    pub overflow_drops: u64,
    /// 最近一次成功加载的 catalog 文件大小
    pub catalog_bytes: u64,
}

pub(crate) fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl fmt::Display for RefreshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════╗")?;
        writeln!(f, "║ dcfs Catalog Refresh                 ║")?;
        writeln!(f, "╠──────────────────────────────────────╣")?;
        writeln!(f, "║   loads:        {:>10}           ║", self.loads)?;
        writeln!(f, "║   failures:     {:>10}           ║", self.failures)?;
        writeln!(f, "║   skipped:      {:>10}           ║", self.skipped)?;
        writeln!(f, "║   overflow:     {:>10}           ║", self.overflow_drops)?;
        writeln!(
            f,
            "║   catalog:      {:>10}           ║",
            human_bytes(self.catalog_bytes)
        )?;
        writeln!(f, "╚══════════════════════════════════════╝")?;
        Ok(())
    }
}
