use crate::core::model::ByteRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PlanReady { chunks: usize, planned_bytes: u64 },
    ChunkStarted { index: usize, range: ByteRange },
    ChunkFinished { index: usize, bytes: u64 },
    ChunkFailed { index: usize, message: String },
    Assembling,
    Finished { success: bool },
}
