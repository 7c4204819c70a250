//! # Conversion Driver Module
//!
//! Worker in background che esegue i batch di conversione.
//!
//! ## Architettura a due canali:
//! - **Canale job** (`ConversionJob`): il coordinatore invia le richieste di lavoro
//! - **Canale eventi** (`DriverEvent`): il worker notifica stato e progresso
//!
//! Entrambi sono `tokio::sync::mpsc` (FIFO), quindi il coordinatore osserva gli
//! eventi nello stesso ordine in cui il worker li emette.
//!
//! ## Politica:
//! - Un solo worker, un file alla volta, nell'ordine della coda
//! - Un errore su un file non interrompe il batch (best-effort, nessun retry)
//! - Nessuna cancellazione: un batch avviato arriva sempre alla fine
//! - Il worker non tocca mai lo stato del coordinatore direttamente

use crate::codec::ImageCodec;
use crate::file_manager::FileManager;
use crate::progress::ConversionStats;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A snapshot of pending queue items handed to the worker
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub batch: u64,
    /// Queue index and source path, in queue order
    pub items: Vec<(usize, PathBuf)>,
    pub quality: f32,
}

/// Notification posted back to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    ItemStarted {
        batch: u64,
        index: usize,
        /// 1-based position inside the batch
        position: usize,
        total: usize,
        path: PathBuf,
    },
    ItemFinished {
        batch: u64,
        index: usize,
        succeeded: bool,
        completed: usize,
        total: usize,
    },
    BatchFinished {
        batch: u64,
        stats: ConversionStats,
    },
}

impl DriverEvent {
    pub fn batch(&self) -> u64 {
        match self {
            DriverEvent::ItemStarted { batch, .. }
            | DriverEvent::ItemFinished { batch, .. }
            | DriverEvent::BatchFinished { batch, .. } => *batch,
        }
    }
}

/// Channel ends the coordinator keeps
pub struct WorkerHandle {
    pub jobs: mpsc::UnboundedSender<ConversionJob>,
    pub events: mpsc::UnboundedReceiver<DriverEvent>,
    pub task: JoinHandle<()>,
}

/// Runs conversion jobs sequentially against an image codec
pub struct ConversionDriver {
    codec: Arc<dyn ImageCodec>,
}

impl ConversionDriver {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Start the single background worker
    pub fn spawn(self) -> WorkerHandle {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<ConversionJob>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<DriverEvent>();

        let task = tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                self.run(job, &event_tx).await;
            }
            debug!("Conversion worker stopped: job channel closed");
        });

        WorkerHandle {
            jobs: job_tx,
            events: event_rx,
            task,
        }
    }

    /// Convert every item of `job` in order, posting events as it goes
    pub async fn run(&self, job: ConversionJob, events: &mpsc::UnboundedSender<DriverEvent>) -> ConversionStats {
        let total = job.items.len();
        let mut stats = ConversionStats::new();
        info!("Batch {}: converting {} file(s) with {}", job.batch, total, self.codec.id());

        for (position, (index, path)) in job.items.into_iter().enumerate() {
            // The coordinator may be gone; the batch still runs to completion.
            let _ = events.send(DriverEvent::ItemStarted {
                batch: job.batch,
                index,
                position: position + 1,
                total,
                path: path.clone(),
            });

            let succeeded = self.convert_item(&path, job.quality).await;
            stats.record(succeeded);

            let _ = events.send(DriverEvent::ItemFinished {
                batch: job.batch,
                index,
                succeeded,
                completed: stats.completed(),
                total,
            });
        }

        info!("Batch {}: {}", job.batch, stats.format_summary());
        let _ = events.send(DriverEvent::BatchFinished {
            batch: job.batch,
            stats,
        });
        stats
    }

    /// Convert one file; any error is logged and reported as failure
    async fn convert_item(&self, source: &Path, quality: f32) -> bool {
        let destination = FileManager::output_path(source);
        let start_time = std::time::Instant::now();

        match self.codec.convert(source, &destination, quality).await {
            Ok(()) => {
                debug!(
                    "Converted {} -> {} in {:?}",
                    source.display(),
                    destination.display(),
                    start_time.elapsed()
                );
                true
            }
            Err(e) => {
                warn!("Conversion failed for {}: {}", source.display(), e);
                false
            }
        }
    }
}
