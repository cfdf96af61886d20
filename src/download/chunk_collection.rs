use bytes::Bytes;

/// 按 chunk 下标排列的数据槽，每个槽只能写入一次
#[derive(Debug, Default)]
pub struct ChunkCollection {
    chunks: Vec<Option<Bytes>>,
}

impl ChunkCollection {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            chunks: vec![None; chunk_count],
        }
    }

    /// 写入失败（越界或已写入）时返回 false
    pub fn insert(&mut self, index: usize, chunk: Bytes) -> bool {
        match self.chunks.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(chunk);
                true
            }
            _ => false,
        }
    }

    pub fn is_filled(&self, index: usize) -> bool {
        matches!(self.chunks.get(index), Some(Some(_)))
    }

    pub fn missing_indices(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| chunk.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 按下标顺序拼接，未写入的槽按空数据处理
    pub fn join(&self) -> Vec<u8> {
        let total = self.chunks.iter().flatten().map(Bytes::len).sum();
        let mut data = Vec::with_capacity(total);
        for chunk in self.chunks.iter().flatten() {
            data.extend_from_slice(chunk);
        }

        data
    }
}
