use std::num::NonZeroU64;
use std::ops::{Bound, RangeBounds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: usize,
    pub range: ChunkRange,
}

/// 闭区间 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        (self.end - self.start) + 1
    }

    /// `bytes=<start>-<end>`
    pub fn to_range_header(&self) -> Result<headers::Range, headers::Error> {
        headers::Range::bytes(self).map_err(|_| headers::Error::invalid())
    }
}

impl<'a> RangeBounds<u64> for &'a ChunkRange {
    fn start_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.start)
    }

    fn end_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.end)
    }
}

/// 需要请求的 chunk 数量，空文件也保留一个 chunk
pub fn chunk_count(content_length: u64, chunk_size: NonZeroU64) -> usize {
    content_length.div_ceil(chunk_size.get()).max(1) as usize
}

/// 第 `index` 个 chunk 的范围。
///
/// 除第一个 chunk 外起点都会 +1，上一个 chunk 的 `end` 因此不会被重复请求。
/// 最后一个 chunk 的 `end` 等于 `content_length`，由服务端截断到最后一个字节。
pub fn plan_range(index: usize, chunk_size: NonZeroU64, content_length: u64) -> ChunkRange {
    let chunk_size = chunk_size.get();
    let index = index as u64;

    let mut start = index.saturating_mul(chunk_size);
    if index > 0 {
        start = start.saturating_add(1);
    }
    let end = index
        .saturating_add(1)
        .saturating_mul(chunk_size)
        .min(content_length);

    ChunkRange::new(start.min(end), end)
}

pub struct ChunkRangeIterator {
    chunk_size: NonZeroU64,
    content_length: u64,
    chunk_count: usize,
    next_index: usize,
}

impl ChunkRangeIterator {
    pub fn new(chunk_size: NonZeroU64, content_length: u64) -> Self {
        Self {
            chunk_size,
            content_length,
            chunk_count: chunk_count(content_length, chunk_size),
            next_index: 0,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

impl Iterator for ChunkRangeIterator {
    type Item = ChunkInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.chunk_count {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;

        Some(ChunkInfo {
            index,
            range: plan_range(index, self.chunk_size, self.content_length),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkRangeIterator {}
