use serde::{Deserialize, Serialize};

/// 半开时间区间 `[start, end)`（GPS 秒）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start <= end, "interval start must not exceed end");
        Self { start, end }
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, point: i64) -> bool {
        self.start <= point && point < self.end
    }

    /// 区间内以 `duration` 为步长的起点中，同时落在 `window` 内的那些。
    ///
    /// 起点序列固定为 `start, start + duration, ...`（不对齐到 window），
    /// 因此第一个候选点需要向上取整跳到 window 内。`duration <= 0` 时为空。
    pub fn stride_starts(&self, duration: i64, window: Interval) -> StrideStarts {
        let lo = self.start.max(window.start);
        let hi = self.end.min(window.end);
        if duration <= 0 || lo >= hi {
            return StrideStarts::empty();
        }
        let skip = lo - self.start;
        let first = self.start + (skip + duration - 1) / duration * duration;
        StrideStarts {
            next: first,
            end: hi,
            step: duration,
        }
    }
}

impl From<(i64, i64)> for Interval {
    fn from((start, end): (i64, i64)) -> Self {
        Self::new(start, end)
    }
}

/// 见 [`Interval::stride_starts`]
#[derive(Clone, Debug)]
pub struct StrideStarts {
    next: i64,
    end: i64,
    step: i64,
}

impl StrideStarts {
    fn empty() -> Self {
        Self {
            next: 0,
            end: 0,
            step: 1,
        }
    }
}

impl Iterator for StrideStarts {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.next >= self.end {
            return None;
        }
        let cur = self.next;
        self.next = self.next.saturating_add(self.step);
        Some(cur)
    }
}

/// 区间列表：生产方不保证有序/不相交，消费方必须容忍重叠。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalList(pub Vec<Interval>);

impl IntervalList {
    pub fn new(intervals: Vec<Interval>) -> Self {
        Self(intervals)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, point: i64) -> bool {
        self.0.iter().any(|iv| iv.contains(point))
    }

    pub fn intersects(&self, range: &Interval) -> bool {
        self.0.iter().any(|iv| iv.intersects(range))
    }

    /// `(first.start, last.end)`：只看首尾两个区间，用于快速排除。
    /// 列表无序时它不是真实覆盖范围。
    pub fn span(&self) -> Option<(i64, i64)> {
        let first = self.0.first()?;
        let last = self.0.last()?;
        Some((first.start, last.end))
    }
}

impl<'a> IntoIterator for &'a IntervalList {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Interval> for IntervalList {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
