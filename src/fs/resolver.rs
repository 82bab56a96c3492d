use std::sync::Arc;
use std::time::SystemTime;

use crate::error::FsError;
use crate::fs::listing::{self, ListingConfig};
use crate::fs::path::PathKind;
use crate::index::LiveCatalog;

const DIR_PERM: u16 = 0o755;
const LINK_PERM: u16 = 0o777;

/// FUSE 约定：inode 1 为根
pub const ROOT_INO: u64 = 1;

/// 路径的稳定 inode：根固定为 1，其余取路径哈希（避开 0 与 1）
pub fn inode_of(path: &str) -> u64 {
    if path.trim_end_matches('/').is_empty() {
        return ROOT_INO;
    }
    match xxhash_rust::xxh3::xxh3_64(path.as_bytes()) {
        h @ (0 | ROOT_INO) => h + 2,
        h => h,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Symlink,
}

/// 合成条目属性（与宿主无关；FUSE 层再转换成 `fuser::FileAttr`）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub ino: u64,
    pub kind: EntryKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// 路径字符串长度
    pub size: u64,
    pub atime: SystemTime,
    /// 取自 catalog 文件本身
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

/// statfs 固定返回值
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatFs {
    pub bsize: u32,
    pub blocks: u64,
    pub bavail: u64,
}

pub const STATFS: StatFs = StatFs {
    bsize: 512,
    blocks: 4096,
    bavail: 2048,
};

/// 只读文件系统上一律拒绝的写操作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutatingOp {
    Create,
    Write,
    SetAttr,
    Rename,
    Unlink,
    Mkdir,
    Rmdir,
    Symlink,
    Link,
    Mknod,
    SetXattr,
    RemoveXattr,
}

impl MutatingOp {
    pub fn as_str(self) -> &'static str {
        match self {
            MutatingOp::Create => "create",
            MutatingOp::Write => "write",
            MutatingOp::SetAttr => "setattr",
            MutatingOp::Rename => "rename",
            MutatingOp::Unlink => "unlink",
            MutatingOp::Mkdir => "mkdir",
            MutatingOp::Rmdir => "rmdir",
            MutatingOp::Symlink => "symlink",
            MutatingOp::Link => "link",
            MutatingOp::Mknod => "mknod",
            MutatingOp::SetXattr => "setxattr",
            MutatingOp::RemoveXattr => "removexattr",
        }
    }
}

/// 路径 → 属性 / 子项 / 链接目标
///
/// 所有内部错误在这里收敛成 [`FsError`]，宿主只需要 `errno()`。
pub struct Resolver {
    catalog: Arc<LiveCatalog>,
    listing: ListingConfig,
    uid: u32,
    gid: u32,
}

impl Resolver {
    pub fn new(catalog: Arc<LiveCatalog>, listing: ListingConfig) -> Self {
        // SAFETY: getuid/getgid 总是成功且无副作用
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self {
            catalog,
            listing,
            uid,
            gid,
        }
    }

    pub fn catalog(&self) -> &Arc<LiveCatalog> {
        &self.catalog
    }

    /// depth 0..=5 为目录，depth 6 为符号链接；其他深度或任何失败都是 NotFound
    pub fn get_attributes(&self, path: &str) -> Result<Attributes, FsError> {
        let kind = PathKind::parse(path)
            .ok_or_else(|| FsError::not_found(format!("{path}: too deep")))?;
        let stat = self
            .catalog
            .source_stat()
            .map_err(|e| FsError::not_found(format!("{path}: {e}")))?;

        let (entry_kind, perm, nlink) = if kind.is_leaf() {
            (EntryKind::Symlink, LINK_PERM, 1)
        } else {
            (EntryKind::Directory, DIR_PERM, 2)
        };

        Ok(Attributes {
            ino: inode_of(path),
            kind: entry_kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            size: path.len() as u64,
            atime: SystemTime::now(),
            mtime: stat.mtime,
            ctime: stat.ctime,
        })
    }

    /// 先做一次非强制刷新，再按路径种类列目录。
    ///
    /// 空目录与列目录出错合并为 [`FsError::EmptyOrError`]，宿主侧统一为 ENOTDIR。
    /// 刷新失败只记日志，继续服务旧快照。
    pub fn list_directory(&self, path: &str) -> Result<Vec<String>, FsError> {
        if let Err(e) = self.catalog.refresh(false) {
            tracing::warn!("refresh before listing {} failed: {}", path, e);
        }
        let idx = self.catalog.snapshot();
        let cfg = &self.listing;

        let listed = match PathKind::parse(path) {
            Some(PathKind::Root) => Ok(listing::list_root(&idx)),
            Some(PathKind::Extension { ext }) => listing::list_extension(&idx, ext, cfg),
            Some(PathKind::Prefix { ext, prefix }) => listing::list_prefix(&idx, ext, prefix, cfg),
            Some(PathKind::Type {
                ext, frame_type, ..
            }) => listing::list_type(&idx, ext, frame_type),
            Some(PathKind::Site {
                ext,
                frame_type,
                site,
                ..
            }) => listing::list_site(&idx, ext, frame_type, site, cfg),
            Some(PathKind::Bucket {
                ext,
                frame_type,
                site,
                bucket,
                ..
            }) => listing::list_bucket(&idx, ext, frame_type, site, bucket, cfg),
            Some(PathKind::Leaf { .. }) | None => Err(FsError::not_found(path.to_string())),
        };

        match listed {
            Ok(names) if !names.is_empty() => Ok(names),
            Ok(_) => Err(FsError::EmptyOrError(format!("{path}: no entries"))),
            Err(e) => {
                tracing::debug!("listing {} failed: {}", path, e);
                Err(FsError::EmptyOrError(format!("{path}: {e}")))
            }
        }
    }

    /// 只接受 depth 6 的叶子路径
    pub fn resolve_link(&self, path: &str) -> Result<String, FsError> {
        match PathKind::parse(path) {
            Some(PathKind::Leaf { ext, name, .. }) => {
                let idx = self.catalog.snapshot();
                listing::resolve_leaf(&idx, ext, name)
            }
            _ => Err(FsError::not_found(format!("{path}: not a leaf"))),
        }
    }

    pub fn reject(&self, op: MutatingOp, path: &str) -> FsError {
        tracing::debug!("rejecting {} on {}", op.as_str(), path);
        FsError::Unsupported(op.as_str())
    }

    pub fn statfs(&self) -> StatFs {
        STATFS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CatalogIndex;
    use crate::testing::{sample_index, MemorySource};
    use std::time::Duration;

    fn resolver_with(src: Arc<MemorySource>) -> Resolver {
        let live = Arc::new(LiveCatalog::open(src).unwrap());
        Resolver::new(live, ListingConfig::default())
    }

    fn resolver() -> (Resolver, Arc<MemorySource>) {
        let src = Arc::new(MemorySource::new(sample_index()));
        (resolver_with(src.clone()), src)
    }

    #[test]
    fn attributes_by_depth() {
        let (r, src) = resolver();
        for p in [
            "/",
            "/gwf",
            "/gwf/H1_R",
            "/gwf/H1_R/H1_R",
            "/gwf/H1_R/H1_R/H1",
            "/gwf/H1_R/H1_R/H1/10000",
        ] {
            let a = r.get_attributes(p).unwrap();
            assert_eq!(a.kind, EntryKind::Directory, "{p}");
            assert_eq!(a.perm, 0o755);
            assert_eq!(a.size, p.len() as u64);
            assert_eq!(a.mtime, src.mtime());
        }

        let leaf = "/gwf/H1_R/H1_R/H1/10000/H1-H1_R-1000000000-4096.gwf";
        let a = r.get_attributes(leaf).unwrap();
        assert_eq!(a.kind, EntryKind::Symlink);
        assert_eq!(a.perm, 0o777);
        assert_eq!(a.size, leaf.len() as u64);

        assert!(matches!(
            r.get_attributes("/a/b/c/d/e/f/g"),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn inode_is_stable_per_path() {
        let (r, _) = resolver();
        assert_eq!(inode_of("/"), ROOT_INO);
        assert_eq!(r.get_attributes("/").unwrap().ino, ROOT_INO);
        let a = r.get_attributes("/gwf/H1_R").unwrap();
        assert_eq!(a.ino, inode_of("/gwf/H1_R"));
        assert_ne!(a.ino, inode_of("/gwf/H1_RD"));
        assert!(a.ino > ROOT_INO);
    }

    #[test]
    fn listing_dispatches_on_kind() {
        let (r, _) = resolver();
        assert_eq!(r.list_directory("/").unwrap(), vec!["gwf", "hdf5"]);
        assert_eq!(
            r.list_directory("/gwf").unwrap(),
            vec!["H1_R", "H1_RD", "L1_R"]
        );
        assert_eq!(r.list_directory("/gwf/H1_RD").unwrap(), vec!["H1_RDS"]);
        assert_eq!(r.list_directory("/gwf/H1_R/H1_R").unwrap(), vec!["H1"]);
        assert_eq!(
            r.list_directory("/gwf/H1_R/H1_R/H1").unwrap(),
            vec!["10000", "10001"]
        );
        assert_eq!(
            r.list_directory("/gwf/H1_R/H1_R/H1/10001/").unwrap(),
            vec!["H1-H1_R-1000102400-4096.gwf"]
        );
    }

    #[test]
    fn empty_and_failed_listings_are_the_same_outcome() {
        let (r, _) = resolver();
        // 合法但无子项（前缀匹配不到类型）
        let empty = r.list_directory("/gwf/H1_RDS").unwrap_err();
        // 未知扩展名
        let missing = r.list_directory("/nope").unwrap_err();
        // 叶子不是目录
        let leaf = r
            .list_directory("/gwf/H1_R/H1_R/H1/10000/H1-H1_R-1000000000-4096.gwf")
            .unwrap_err();
        for e in [empty, missing, leaf] {
            assert!(matches!(e, FsError::EmptyOrError(_)));
            assert_eq!(e.errno(), libc::ENOTDIR);
        }
    }

    #[test]
    fn listing_is_idempotent_without_source_change() {
        let (r, src) = resolver();
        let a = r.list_directory("/gwf/H1_R/H1_R/H1/10000").unwrap();
        let b = r.list_directory("/gwf/H1_R/H1_R/H1/10000").unwrap();
        assert_eq!(a, b);
        assert_eq!(src.load_count(), 1);
    }

    #[test]
    fn listing_picks_up_new_catalog() {
        let (r, src) = resolver();
        assert_eq!(r.list_directory("/").unwrap(), vec!["gwf", "hdf5"]);
        src.replace(
            Some(CatalogIndex::from_entries(vec![crate::index::CatalogEntry {
                ext: "sft".into(),
                frame_type: "H1_SFT".into(),
                site: "H1".into(),
                directory: "/sft".into(),
                duration: 1800,
                intervals: vec![(0, 1800)],
            }])),
            Duration::from_secs(1),
        );
        assert_eq!(r.list_directory("/").unwrap(), vec!["sft"]);
        assert!(r.catalog().last_loaded().unwrap() >= src.mtime());
    }

    #[test]
    fn corrupt_catalog_keeps_serving_previous_index() {
        let (r, src) = resolver();
        let before = r.list_directory("/gwf").unwrap();

        src.replace(None, Duration::from_secs(1));
        assert!(r.catalog().refresh(false).is_err());
        assert_eq!(r.list_directory("/gwf").unwrap(), before);
        assert_eq!(
            r.resolve_link("/gwf/H1_R/H1_R/H1/10000/H1-H1_R-1000000000-4096.gwf")
                .unwrap(),
            "/data/H1/H1-H1_R-1000000000-4096.gwf"
        );
    }

    #[test]
    fn resolve_link_requires_leaf_depth() {
        let (r, _) = resolver();
        assert_eq!(
            r.resolve_link("/gwf/H1_R/H1_R/H1/10000/H1-H1_R-1000000000-4096.gwf")
                .unwrap(),
            "/data/H1/H1-H1_R-1000000000-4096.gwf"
        );
        let e = r.resolve_link("/gwf/H1_R/H1_R/H1/10000").unwrap_err();
        assert_eq!(e.errno(), libc::ENOENT);
        let e = r
            .resolve_link("/gwf/H1_R/H1_R/H1/10000/garbage.gwf")
            .unwrap_err();
        assert!(matches!(e, FsError::InvalidName(_)));
        assert_eq!(e.errno(), libc::ENOENT);
    }

    #[test]
    fn mutating_operations_are_rejected() {
        let (r, _) = resolver();
        for op in [MutatingOp::Mkdir, MutatingOp::Write, MutatingOp::SetXattr] {
            let e = r.reject(op, "/gwf");
            assert!(matches!(e, FsError::Unsupported(_)));
            assert_eq!(e.errno(), libc::ENOSYS);
        }
        assert_eq!(r.statfs().blocks, 4096);
    }
}
