use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::fs::listing::ListingConfig;

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_ENV: &str = "DCFS_CONFIG";

/// 运行时配置；未设置的字段取默认值
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 时间桶宽度（秒）
    pub bucket_size: i64,
    /// 类型前缀截断长度（字符）
    pub prefix_len: usize,
    /// 内核属性/目录项缓存 TTL
    pub attr_ttl_secs: u64,
    /// 是否监听 catalog 文件替换并主动刷新
    pub watch: bool,
    /// watcher channel 容量（满时丢弃并计数）
    pub watch_channel_size: usize,
    /// 挂载名（/proc/mounts 中可见）
    pub fsname: String,
    pub allow_other: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_size: 100_000,
            prefix_len: 5,
            attr_ttl_secs: 1,
            watch: true,
            watch_channel_size: 64,
            fsname: "dcfs".to_string(),
            allow_other: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// `DCFS_CONFIG` 指向的文件；未设置时用默认值
    pub fn load_from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) => Self::from_file(Path::new(&p)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.bucket_size > 0, "bucket_size must be positive");
        anyhow::ensure!(self.prefix_len > 0, "prefix_len must be positive");
        anyhow::ensure!(
            self.watch_channel_size > 0,
            "watch_channel_size must be positive"
        );
        Ok(())
    }

    pub fn listing(&self) -> ListingConfig {
        ListingConfig {
            bucket_size: self.bucket_size,
            prefix_len: self.prefix_len,
        }
    }
}
