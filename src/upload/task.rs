//! Upload task bookkeeping.

/// How a payload reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// One inline request, small payloads only.
    Single,
    /// Direct PUT to object storage via a short-lived presigned target.
    Presigned,
    /// Fixed-size base64 chunks through the backend itself.
    MultiChunk,
}

/// Lifecycle of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    InFlight,
    /// Terminal; a done chunk is never revisited.
    Done,
    Failed,
}

/// State of one chunk within an upload task.
#[derive(Debug, Clone)]
pub struct ChunkState {
    /// Position within the task's chunk sequence.
    pub index: usize,
    /// Byte offset of this chunk within the payload.
    pub offset: usize,
    /// Length of this chunk in bytes.
    pub len: usize,
    /// Attempts made so far.
    pub attempts: u32,
    pub status: ChunkStatus,
    /// Receipt tag returned by the backend once uploaded.
    pub etag: Option<String>,
}

/// One large-payload upload in progress.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub task_id: String,
    pub total_bytes: usize,
    pub chunk_size: usize,
    pub strategy: UploadStrategy,
    pub chunks: Vec<ChunkState>,
}

impl UploadTask {
    /// Creates a task whose chunks partition the payload exactly once,
    /// with no overlap and no gaps. Single/presigned tasks carry one
    /// chunk covering the whole payload.
    pub fn new(task_id: String, total_bytes: usize, chunk_size: usize, strategy: UploadStrategy) -> Self {
        let chunks = match strategy {
            UploadStrategy::MultiChunk => plan_chunks(total_bytes, chunk_size),
            _ => plan_chunks(total_bytes, total_bytes.max(1)),
        };
        Self {
            task_id,
            total_bytes,
            chunk_size,
            strategy,
            chunks,
        }
    }

    /// True when every chunk reached its terminal done state.
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| c.status == ChunkStatus::Done)
    }
}

/// Splits `total` bytes into `chunk_size`-byte ranges; the last chunk
/// carries the remainder.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Vec<ChunkState> {
    if total == 0 || chunk_size == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut offset = 0;
    let mut index = 0;
    while offset < total {
        let len = chunk_size.min(total - offset);
        chunks.push(ChunkState {
            index,
            offset,
            len,
            attempts: 0,
            status: ChunkStatus::Pending,
            etag: None,
        });
        offset += len;
        index += 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_partition_exactly() {
        for (total, size) in [(10usize, 3usize), (9, 3), (1, 4), (4096, 1000), (6 * 1024 * 1024, 4 * 1024 * 1024)] {
            let chunks = plan_chunks(total, size);
            // No gaps, no overlap, full coverage
            let mut expected_offset = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert_eq!(chunk.offset, expected_offset);
                assert!(chunk.len > 0);
                expected_offset += chunk.len;
            }
            assert_eq!(expected_offset, total, "total {total} size {size}");
        }
    }

    #[test]
    fn test_chunk_round_trip_reassembly() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let chunks = plan_chunks(payload.len(), 147);
        let mut reassembled = vec![0u8; payload.len()];
        for chunk in &chunks {
            reassembled[chunk.offset..chunk.offset + chunk.len]
                .copy_from_slice(&payload[chunk.offset..chunk.offset + chunk.len]);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn test_empty_payload_has_no_chunks() {
        assert!(plan_chunks(0, 100).is_empty());
    }

    #[test]
    fn test_single_strategy_has_one_chunk() {
        let task = UploadTask::new("t".into(), 500, 100, UploadStrategy::Single);
        assert_eq!(task.chunks.len(), 1);
        assert_eq!(task.chunks[0].len, 500);
    }

    #[test]
    fn test_multichunk_strategy_splits() {
        let task = UploadTask::new("t".into(), 500, 100, UploadStrategy::MultiChunk);
        assert_eq!(task.chunks.len(), 5);
        assert!(!task.is_complete());
    }

    #[test]
    fn test_completion_requires_every_chunk_done() {
        let mut task = UploadTask::new("t".into(), 200, 100, UploadStrategy::MultiChunk);
        task.chunks[0].status = ChunkStatus::Done;
        assert!(!task.is_complete());
        task.chunks[1].status = ChunkStatus::Done;
        assert!(task.is_complete());
    }
}
