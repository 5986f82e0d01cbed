use crate::core::assembler::Assembler;
use crate::core::buffer::ChunkBuffer;
use crate::core::error::{DownloadError, TransferError};
use crate::core::events::EngineEvent;
use crate::core::model::*;
use crate::core::planner::plan_ranges;
use crate::plugins::registry::{RangeTransport, TransportContext};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

#[derive(Debug)]
pub enum ChunkOutcome {
    Success,
    Failure(TransferError),
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Success)
    }
}

/// One chunk's buffer together with how its request ended.
#[derive(Debug)]
pub struct ChunkTransfer {
    pub descriptor: ChunkDescriptor,
    pub buffer: ChunkBuffer,
    pub outcome: ChunkOutcome,
}

/// Result of `Engine::execute`, ordered by chunk index.
///
/// In serial mode it stops at the first failed chunk; in parallel mode it holds every chunk.
#[derive(Debug)]
pub struct TransferReport {
    transfers: Vec<ChunkTransfer>,
}

impl TransferReport {
    pub fn transfers(&self) -> &[ChunkTransfer] {
        &self.transfers
    }

    pub fn is_success(&self) -> bool {
        self.transfers.iter().all(|t| t.outcome.is_success())
    }

    /// Hand the buffers over for reassembly, or the lowest-index failure.
    pub fn into_buffers(self) -> Result<Vec<ChunkBuffer>, DownloadError> {
        let mut buffers = Vec::with_capacity(self.transfers.len());
        for t in self.transfers {
            match t.outcome {
                ChunkOutcome::Success => buffers.push(t.buffer),
                ChunkOutcome::Failure(source) => {
                    return Err(DownloadError::Chunk { index: t.descriptor.index, source });
                }
            }
        }
        Ok(buffers)
    }
}

#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn RangeTransport>,
    ctx: TransportContext,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    pub fn new(transport: Arc<dyn RangeTransport>, ctx: TransportContext) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { transport, ctx, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Plan, fetch and reassemble one resource. Nothing is written unless every chunk succeeded.
    pub async fn download(&self, req: &DownloadRequest) -> Result<DownloadSummary, DownloadError> {
        let result = self.download_inner(req).await;
        if let Err(e) = &result {
            tracing::warn!(url = %req.url, error = %e, "download failed");
        }
        let _ = self.event_tx.send(EngineEvent::Finished { success: result.is_ok() });
        result
    }

    async fn download_inner(&self, req: &DownloadRequest) -> Result<DownloadSummary, DownloadError> {
        let plan = plan_ranges(req.num_chunks, req.chunk_size)?;
        let _ = self.event_tx.send(EngineEvent::PlanReady {
            chunks: plan.len(),
            planned_bytes: plan.planned_bytes(),
        });
        tracing::info!(
            url = %req.url,
            mode = ?req.mode,
            chunks = plan.len(),
            chunk_size = plan.chunk_size(),
            transport = self.transport.name(),
            "starting download"
        );

        let buffers = self.execute(&plan, &req.url, req.mode).await.into_buffers()?;
        check_chunk_lengths(&plan, &buffers)?;

        let _ = self.event_tx.send(EngineEvent::Assembling);
        let bytes_written = Assembler::write(&req.dest, buffers).await?;

        tracing::info!(dest = %req.dest.display(), bytes_written, "download complete");
        Ok(DownloadSummary {
            dest: req.dest.clone(),
            chunks: plan.len(),
            bytes_written,
        })
    }

    pub async fn execute(&self, plan: &DownloadPlan, url: &Url, mode: TransferMode) -> TransferReport {
        match mode {
            TransferMode::Serial => self.execute_serial(plan, url).await,
            TransferMode::Parallel => self.execute_parallel(plan, url).await,
        }
    }

    async fn execute_serial(&self, plan: &DownloadPlan, url: &Url) -> TransferReport {
        let mut transfers = Vec::with_capacity(plan.len());
        for desc in plan.chunks() {
            let t = self.fetch_chunk(url, *desc).await;
            let failed = !t.outcome.is_success();
            transfers.push(t);
            if failed {
                tracing::debug!(index = desc.index, skipped = plan.len() - desc.index - 1, "serial download stopped");
                break;
            }
        }
        TransferReport { transfers }
    }

    /// Issue every chunk at once and drain until none is pending. A failure does not cancel the rest.
    async fn execute_parallel(&self, plan: &DownloadPlan, url: &Url) -> TransferReport {
        let mut pending: FuturesUnordered<_> = plan
            .chunks()
            .iter()
            .map(|desc| self.fetch_chunk(url, *desc))
            .collect();

        let mut slots: Vec<Option<ChunkTransfer>> = Vec::with_capacity(plan.len());
        slots.resize_with(plan.len(), || None);

        while let Some(t) = pending.next().await {
            let index = t.descriptor.index;
            slots[index] = Some(t);
        }

        TransferReport {
            transfers: slots.into_iter().flatten().collect(),
        }
    }

    async fn fetch_chunk(&self, url: &Url, descriptor: ChunkDescriptor) -> ChunkTransfer {
        let ChunkDescriptor { index, range } = descriptor;
        let _ = self.event_tx.send(EngineEvent::ChunkStarted { index, range });
        tracing::debug!(index, %range, "chunk requested");

        let mut buffer = ChunkBuffer::new();
        let outcome = match self.transport.fetch_range(url, &self.ctx, range, &mut buffer).await {
            Ok(()) => {
                let _ = self.event_tx.send(EngineEvent::ChunkFinished { index, bytes: buffer.len() as u64 });
                tracing::debug!(index, bytes = buffer.len(), "chunk finished");
                ChunkOutcome::Success
            }
            Err(e) => {
                let _ = self.event_tx.send(EngineEvent::ChunkFailed { index, message: e.to_string() });
                tracing::warn!(index, %range, error = %e, "chunk failed");
                ChunkOutcome::Failure(e)
            }
        };

        ChunkTransfer { descriptor, buffer, outcome }
    }
}

/// A chunk may come back short only when every later chunk is empty (the resource
/// ended inside it). No chunk may exceed its range.
pub fn check_chunk_lengths(plan: &DownloadPlan, buffers: &[ChunkBuffer]) -> Result<(), DownloadError> {
    let mut short: Option<(usize, u64, u64)> = None;
    for (desc, buf) in plan.chunks().iter().zip(buffers) {
        let expected = desc.range.span();
        let received = buf.len() as u64;
        if received > expected {
            return Err(DownloadError::Overflow { index: desc.index, expected, received });
        }
        if let Some((index, expected, received)) = short {
            if !buf.is_empty() {
                return Err(DownloadError::Truncated { index, expected, received });
            }
        } else if received < expected {
            short = Some((desc.index, expected, received));
        }
    }

    if let Some((index, expected, received)) = short {
        tracing::debug!(index, expected, received, "resource ended inside chunk");
    }
    Ok(())
}
