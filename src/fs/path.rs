/// 非空路径段数；`depth("/") == 0`
pub fn depth(path: &str) -> usize {
    segments(path).count()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// 合成路径的语义，由路径段数唯一决定：
///
/// ```text
/// /                                             Root
/// /EXT                                          Extension
/// /EXT/PREFIX                                   Prefix
/// /EXT/PREFIX/TYPE                              Type
/// /EXT/PREFIX/TYPE/SITE                         Site
/// /EXT/PREFIX/TYPE/SITE/BUCKET                  Bucket
/// /EXT/PREFIX/TYPE/SITE/BUCKET/SITE-TYPE-START-DURATION.EXT   Leaf
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind<'a> {
    Root,
    Extension {
        ext: &'a str,
    },
    Prefix {
        ext: &'a str,
        prefix: &'a str,
    },
    Type {
        ext: &'a str,
        prefix: &'a str,
        frame_type: &'a str,
    },
    Site {
        ext: &'a str,
        prefix: &'a str,
        frame_type: &'a str,
        site: &'a str,
    },
    Bucket {
        ext: &'a str,
        prefix: &'a str,
        frame_type: &'a str,
        site: &'a str,
        bucket: &'a str,
    },
    Leaf {
        ext: &'a str,
        prefix: &'a str,
        frame_type: &'a str,
        site: &'a str,
        bucket: &'a str,
        name: &'a str,
    },
}

impl<'a> PathKind<'a> {
    /// 超过 6 段的路径没有对应语义，返回 `None`
    pub fn parse(path: &'a str) -> Option<Self> {
        let segs: Vec<&'a str> = segments(path).collect();
        let kind = match *segs.as_slice() {
            [] => PathKind::Root,
            [ext] => PathKind::Extension { ext },
            [ext, prefix] => PathKind::Prefix { ext, prefix },
            [ext, prefix, frame_type] => PathKind::Type {
                ext,
                prefix,
                frame_type,
            },
            [ext, prefix, frame_type, site] => PathKind::Site {
                ext,
                prefix,
                frame_type,
                site,
            },
            [ext, prefix, frame_type, site, bucket] => PathKind::Bucket {
                ext,
                prefix,
                frame_type,
                site,
                bucket,
            },
            [ext, prefix, frame_type, site, bucket, name] => PathKind::Leaf {
                ext,
                prefix,
                frame_type,
                site,
                bucket,
                name,
            },
            _ => return None,
        };
        Some(kind)
    }

    pub fn depth(&self) -> usize {
        match self {
            PathKind::Root => 0,
            PathKind::Extension { .. } => 1,
            PathKind::Prefix { .. } => 2,
            PathKind::Type { .. } => 3,
            PathKind::Site { .. } => 4,
            PathKind::Bucket { .. } => 5,
            PathKind::Leaf { .. } => 6,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PathKind::Leaf { .. })
    }
}

/// 父目录路径 + 子项名，统一成以 `/` 开头的规范形式
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else {
        format!("/{parent}/{name}")
    }
}
