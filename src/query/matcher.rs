use wildmatch::WildMatch;

/// 类型前缀匹配：目录名含 `*`/`?` 时按通配符匹配，否则要求截断后的前缀完全相等
pub enum PrefixMatcher {
    Exact(String),
    Glob(WildMatch),
}

impl PrefixMatcher {
    pub fn new(pattern: &str) -> Self {
        if pattern.contains('*') || pattern.contains('?') {
            PrefixMatcher::Glob(WildMatch::new(pattern))
        } else {
            PrefixMatcher::Exact(pattern.to_string())
        }
    }

    /// `truncated` 是已经截断到前缀长度的类型标识
    pub fn matches(&self, truncated: &str) -> bool {
        match self {
            PrefixMatcher::Exact(p) => p == truncated,
            PrefixMatcher::Glob(w) => w.matches(truncated),
        }
    }
}

/// 截断到前 `len` 个字符（按 char，不按字节）
pub fn truncate_prefix(s: &str, len: usize) -> &str {
    match s.char_indices().nth(len) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
