use std::fs::{self, File};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use xxhash_rust::xxh3::Xxh3;

use crate::error::CatalogLoadError;
use crate::index::catalog::{CatalogIndex, Level0, Level1, Level2};

/// catalog 文件 Header
const MAGIC: u32 = 0xDCF5_0001;
const VERSION_CURRENT: u32 = 1;
const STATE_COMMITTED: u32 = 0x0000_0001;
const STATE_INCOMPLETE: u32 = 0xFFFF_FFFF;
const HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 4; // magic + version + state + data_len + checksum

/// catalog 来源的时间戳（用于 staleness 判定与合成目录属性）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceStat {
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub len: u64,
}

/// 外部 catalog 来源：只需要“读时间戳”和“整体加载”两个原语。
pub trait CatalogSource: Send + Sync {
    fn stat(&self) -> Result<SourceStat, CatalogLoadError>;
    fn load(&self) -> Result<CatalogIndex, CatalogLoadError>;
}

/// 单文件 catalog 存储
///
/// 布局：20 字节 header + body，body 为三个连续的 bincode 值 L0、L1、L2。
/// 写入流程与快照一致：tmp（INCOMPLETE header）→ 流式写 body 边算 checksum
/// → seek 回写 COMMITTED header → fsync → rename → fsync(dir)。
/// 加载时 magic/version/state/len/checksum 任一不一致都视为损坏。
pub struct CatalogStore {
    path: PathBuf,
}

struct ChecksumWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: Xxh3,
    bytes: u64,
}

impl<'a, W: Write> ChecksumWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            hasher: Xxh3::new(),
            bytes: 0,
        }
    }

    fn finish(self) -> (u64, u32) {
        (self.bytes, self.hasher.digest() as u32)
    }
}

impl<'a, W: Write> Write for ChecksumWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn body_checksum(body: &[u8]) -> u32 {
    xxhash_rust::xxh3::xxh3_64(body) as u32
}

fn encode_header(state: u32, data_len: u32, checksum: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..8].copy_from_slice(&VERSION_CURRENT.to_le_bytes());
    header[8..12].copy_from_slice(&state.to_le_bytes());
    header[12..16].copy_from_slice(&data_len.to_le_bytes());
    header[16..20].copy_from_slice(&checksum.to_le_bytes());
    header
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(b)
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    let secs = u64::try_from(secs).unwrap_or(0);
    let nsecs = u32::try_from(nsecs).unwrap_or(0);
    UNIX_EPOCH + Duration::new(secs, nsecs)
}

/// 从完整文件字节解析 catalog
pub fn decode_catalog(data: &[u8]) -> Result<CatalogIndex, CatalogLoadError> {
    if data.len() < HEADER_SIZE {
        return Err(CatalogLoadError::Header(format!(
            "file too small ({} bytes)",
            data.len()
        )));
    }

    let magic = le_u32(data, 0);
    let version = le_u32(data, 4);
    let state = le_u32(data, 8);
    let data_len = le_u32(data, 12) as usize;
    let stored = le_u32(data, 16);

    if magic != MAGIC {
        return Err(CatalogLoadError::Header(format!(
            "magic mismatch: {:#x} != {:#x}",
            magic, MAGIC
        )));
    }
    if version != VERSION_CURRENT {
        return Err(CatalogLoadError::Header(format!(
            "unsupported version {}",
            version
        )));
    }
    if state != STATE_COMMITTED {
        return Err(CatalogLoadError::Header("state INCOMPLETE".into()));
    }

    let body = &data[HEADER_SIZE..];
    if body.len() != data_len {
        return Err(CatalogLoadError::Header(format!(
            "data length mismatch: {} != {}",
            body.len(),
            data_len
        )));
    }

    let computed = body_checksum(body);
    if computed != stored {
        return Err(CatalogLoadError::Checksum { stored, computed });
    }

    // 固定顺序：L0、L1、L2
    let mut cur = Cursor::new(body);
    let l0: Level0 = bincode::deserialize_from(&mut cur)?;
    let l1: Level1 = bincode::deserialize_from(&mut cur)?;
    let l2: Level2 = bincode::deserialize_from(&mut cur)?;
    if cur.position() as usize != body.len() {
        return Err(CatalogLoadError::Header(format!(
            "{} trailing bytes after L2",
            body.len() - cur.position() as usize
        )));
    }

    check_records(&l2)?;
    Ok(CatalogIndex::from_levels(l0, l1, l2))
}

/// 校验和只证明字节完整；记录本身还要满足 `duration > 0` 与 `start <= end`
fn check_records(l2: &Level2) -> Result<(), CatalogLoadError> {
    for ((ext, frame_type, site), records) in l2 {
        for rec in records {
            if rec.duration <= 0 {
                return Err(CatalogLoadError::Invalid(format!(
                    "{ext}/{frame_type}/{site} {}: non-positive duration {}",
                    rec.directory, rec.duration
                )));
            }
            if let Some(iv) = rec.intervals.iter().find(|iv| iv.start > iv.end) {
                return Err(CatalogLoadError::Invalid(format!(
                    "{ext}/{frame_type}/{site} {}: interval [{}, {}) starts after it ends",
                    rec.directory, iv.start, iv.end
                )));
            }
        }
    }
    Ok(())
}

impl CatalogStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut s = self.path.as_os_str().to_owned();
        s.push(".tmp");
        PathBuf::from(s)
    }

    /// 原子写入 catalog
    pub fn write_atomic(&self, index: &CatalogIndex) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();

        // 1) INCOMPLETE header（len/checksum 先置 0），然后流式写 body
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encode_header(STATE_INCOMPLETE, 0, 0))?;

        // 2) 三个 level 依次写入并计算长度/校验
        let (data_len_u64, checksum) = {
            let mut cw = ChecksumWriter::new(&mut file);
            bincode::serialize_into(&mut cw, &index.l0)?;
            bincode::serialize_into(&mut cw, &index.l1)?;
            bincode::serialize_into(&mut cw, &index.l2)?;
            cw.finish()
        };

        let data_len: u32 = data_len_u64
            .try_into()
            .map_err(|_| anyhow::anyhow!("Catalog too large (>{} bytes)", u32::MAX))?;

        // 3) seek 回开头覆盖 COMMITTED header
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&encode_header(STATE_COMMITTED, data_len, checksum))?;

        // 4) fsync 后 rename 原子替换
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &self.path)?;

        // 5) fsync(dir)
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        tracing::info!(
            "Catalog written to {:?}: {}, {} bytes",
            self.path,
            index.stats(),
            HEADER_SIZE + data_len as usize
        );
        Ok(())
    }
}

impl CatalogSource for CatalogStore {
    fn stat(&self) -> Result<SourceStat, CatalogLoadError> {
        let md = fs::metadata(&self.path)?;
        Ok(SourceStat {
            mtime: md.modified()?,
            ctime: unix_time(md.ctime(), md.ctime_nsec()),
            len: md.len(),
        })
    }

    fn load(&self) -> Result<CatalogIndex, CatalogLoadError> {
        let data = fs::read(&self.path)?;
        decode_catalog(&data)
    }
}
