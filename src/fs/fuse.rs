use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::{c_int, ENOENT};

use crate::config::Config;
use crate::fs::path::{join, PathKind};
use crate::fs::resolver::{inode_of, Attributes, EntryKind, MutatingOp, Resolver, ROOT_INO};

/// 内核持有引用的 inode → 合成路径。
///
/// inode 号是路径哈希（[`inode_of`]），readdir 可以直接算出而不必登记；
/// 只有经 lookup 交给内核的条目才登记并计 nlookup，FORGET 归零时移除。
#[derive(Debug)]
pub(crate) struct InodeTable {
    entries: HashMap<u64, (String, u64)>,
}

impl InodeTable {
    pub(crate) fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(ROOT_INO, ("/".to_string(), 1));
        Self { entries }
    }

    pub(crate) fn path(&self, ino: u64) -> Option<&str> {
        self.entries.get(&ino).map(|(p, _)| p.as_str())
    }

    /// lookup 成功一次，nlookup 加一
    pub(crate) fn remember(&mut self, ino: u64, path: String) {
        match self.entries.get_mut(&ino) {
            Some((known, count)) if *known == path => *count += 1,
            Some(slot) => {
                tracing::warn!("inode {} collision: {} replaces {}", ino, path, slot.0);
                *slot = (path, 1);
            }
            None => {
                self.entries.insert(ino, (path, 1));
            }
        }
    }

    /// 内核释放 `nlookup` 次引用；根永不回收
    pub(crate) fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some((_, count)) = self.entries.get_mut(&ino) {
            *count = count.saturating_sub(nlookup);
            if *count == 0 {
                self.entries.remove(&ino);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

pub(crate) fn to_fuser_attr(a: &Attributes) -> FileAttr {
    FileAttr {
        ino: a.ino,
        size: a.size,
        blocks: a.size.div_ceil(512),
        atime: a.atime,
        mtime: a.mtime,
        ctime: a.ctime,
        crtime: a.ctime,
        kind: match a.kind {
            EntryKind::Directory => FileType::Directory,
            EntryKind::Symlink => FileType::Symlink,
        },
        perm: a.perm,
        nlink: a.nlink,
        uid: a.uid,
        gid: a.gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// `fuser::Filesystem` 适配层：只做 inode 映射与 errno 回复
pub struct CatalogFs {
    resolver: Resolver,
    inodes: InodeTable,
    ttl: Duration,
}

impl CatalogFs {
    pub fn new(resolver: Resolver, ttl: Duration) -> Self {
        Self {
            resolver,
            inodes: InodeTable::new(),
            ttl,
        }
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent = self.inodes.path(parent)?;
        let name = name.to_str()?;
        Some(join(parent, name))
    }

    fn reject(&self, op: MutatingOp, parent: u64, name: Option<&OsStr>) -> c_int {
        let base = self.inodes.path(parent).unwrap_or("?");
        let path = match name {
            Some(n) => join(base, &n.to_string_lossy()),
            None => base.to_string(),
        };
        self.resolver.reject(op, &path).errno()
    }

    /// readdir 的完整条目序列（含 "." 与 ".."）；不登记任何 inode
    fn dir_entries(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>, c_int> {
        let path = self.inodes.path(ino).ok_or(ENOENT)?;
        let names = self.resolver.list_directory(path).map_err(|e| e.errno())?;

        let mut entries = Vec::with_capacity(names.len() + 2);
        entries.push((ino, FileType::Directory, ".".to_string()));
        entries.push((inode_of(parent_path(path)), FileType::Directory, "..".to_string()));
        for name in names {
            let child = join(path, &name);
            let kind = match PathKind::parse(&child) {
                Some(k) if k.is_leaf() => FileType::Symlink,
                _ => FileType::Directory,
            };
            entries.push((inode_of(&child), kind, name));
        }
        Ok(entries)
    }
}

impl Filesystem for CatalogFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        tracing::info!(
            "dcfs mounted: {}",
            self.resolver.catalog().snapshot().stats()
        );
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(
            "dcfs unmounted ({} inodes live)\n{}",
            self.inodes.len(),
            self.resolver.catalog().stats()
        );
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        match self.resolver.get_attributes(&path) {
            Ok(attrs) => {
                self.inodes.remember(attrs.ino, path);
                reply.entry(&self.ttl, &to_fuser_attr(&attrs), 0);
            }
            Err(e) => {
                tracing::debug!("lookup {}: {}", path, e);
                reply.error(ENOENT);
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.inodes.path(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.resolver.get_attributes(path) {
            Ok(attrs) => reply.attr(&self.ttl, &to_fuser_attr(&attrs)),
            Err(e) => {
                tracing::debug!("getattr {}: {}", path, e);
                reply.error(ENOENT);
            }
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let Some(path) = self.inodes.path(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.resolver.resolve_link(path) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => {
                tracing::debug!("readlink {}: {}", path, e);
                reply.error(e.errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.dir_entries(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (child_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            // 缓冲区满时返回 true
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let s = self.resolver.statfs();
        reply.statfs(s.blocks, 0, s.bavail, 0, 0, s.bsize, 255, s.bsize);
    }

    // 普通文件不存在：所有叶子都是符号链接
    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.error(libc::ENOSYS);
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        reply.error(self.reject(MutatingOp::SetAttr, ino, None));
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        reply.error(self.reject(MutatingOp::Mknod, parent, Some(name)));
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(self.reject(MutatingOp::Mkdir, parent, Some(name)));
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.reject(MutatingOp::Unlink, parent, Some(name)));
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.reject(MutatingOp::Rmdir, parent, Some(name)));
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        _target: &Path,
        reply: ReplyEntry,
    ) {
        reply.error(self.reject(MutatingOp::Symlink, parent, Some(link_name)));
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(self.reject(MutatingOp::Rename, parent, Some(name)));
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _newparent: u64,
        _newname: &OsStr,
        reply: ReplyEntry,
    ) {
        reply.error(self.reject(MutatingOp::Link, ino, None));
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        reply.error(self.reject(MutatingOp::Write, ino, None));
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _name: &OsStr,
        _value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(self.reject(MutatingOp::SetXattr, ino, None));
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.reject(MutatingOp::RemoveXattr, ino, None));
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(self.reject(MutatingOp::Create, parent, Some(name)));
    }
}

fn mount_options(cfg: &Config) -> Vec<MountOption> {
    let mut opts = vec![
        MountOption::RO,
        MountOption::FSName(cfg.fsname.clone()),
        MountOption::Subtype("dcfs".to_string()),
    ];
    if cfg.allow_other {
        opts.push(MountOption::AllowOther);
    }
    opts
}

/// 阻塞直到卸载
pub fn mount(fs: CatalogFs, mountpoint: &Path, cfg: &Config) -> std::io::Result<()> {
    fuser::mount2(fs, mountpoint, &mount_options(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::listing::ListingConfig;
    use crate::index::LiveCatalog;
    use crate::testing::{sample_index, MemorySource};
    use std::sync::Arc;
    use std::time::UNIX_EPOCH;

    fn catalog_fs() -> CatalogFs {
        let src = Arc::new(MemorySource::new(sample_index()));
        let live = Arc::new(LiveCatalog::open(src).unwrap());
        CatalogFs::new(
            Resolver::new(live, ListingConfig::default()),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn inode_table_counts_lookups() {
        let mut t = InodeTable::new();
        assert_eq!(t.path(ROOT_INO), Some("/"));
        let a = inode_of("/gwf");
        t.remember(a, "/gwf".to_string());
        t.remember(a, "/gwf".to_string());
        assert_eq!(t.path(a), Some("/gwf"));
        assert_eq!(t.len(), 2);

        t.forget(a, 1);
        assert_eq!(t.path(a), Some("/gwf"));
        t.forget(a, 1);
        assert_eq!(t.path(a), None);
        assert_eq!(t.len(), 1);

        t.forget(ROOT_INO, 100);
        assert_eq!(t.path(ROOT_INO), Some("/"));
    }

    #[test]
    fn listing_does_not_register_inodes() {
        let mut fs = catalog_fs();
        let before = fs.inodes.len();

        let root = fs.dir_entries(ROOT_INO).unwrap();
        let names: Vec<&str> = root.iter().map(|(_, _, n)| n.as_str()).collect();
        assert_eq!(names, vec![".", "..", "gwf", "hdf5"]);
        assert_eq!(root[2].0, inode_of("/gwf"));
        assert_eq!(fs.inodes.len(), before);

        // 逐层 lookup 到桶目录再列出叶子
        let mut path = "/".to_string();
        for seg in ["gwf", "H1_R", "H1_R", "H1", "10000"] {
            path = join(&path, seg);
            let attrs = fs.resolver.get_attributes(&path).unwrap();
            fs.inodes.remember(attrs.ino, path.clone());
        }
        let registered = fs.inodes.len();
        let leaves = fs.dir_entries(inode_of(&path)).unwrap();
        assert_eq!(leaves[1].0, inode_of("/gwf/H1_R/H1_R/H1"));
        assert!(leaves[2..].iter().all(|(_, kind, _)| *kind == FileType::Symlink));
        assert!(leaves.len() > 2);
        assert_eq!(fs.inodes.len(), registered);
    }

    #[test]
    fn unknown_inode_lists_nothing() {
        let fs = catalog_fs();
        assert_eq!(fs.dir_entries(inode_of("/gwf")), Err(ENOENT));
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/gwf"), "/");
        assert_eq!(parent_path("/gwf/H1_R"), "/gwf");
        assert_eq!(parent_path("/gwf/H1_R/"), "/gwf");
    }

    #[test]
    fn attr_conversion() {
        let a = Attributes {
            ino: 99,
            kind: EntryKind::Symlink,
            perm: 0o777,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            size: 1025,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
        };
        let f = to_fuser_attr(&a);
        assert_eq!(f.ino, 99);
        assert_eq!(f.kind, FileType::Symlink);
        assert_eq!(f.blocks, 3);
        assert_eq!(f.perm, 0o777);
    }

    #[test]
    fn read_only_mount() {
        let opts = mount_options(&Config::default());
        assert!(opts.contains(&MountOption::RO));
        assert!(!opts.contains(&MountOption::AllowOther));
    }
}
