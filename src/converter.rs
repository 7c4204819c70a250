//! # Converter Coordinator Module
//!
//! Questo è il coordinatore che possiede tutto lo stato osservabile.
//!
//! ## Responsabilità:
//! - Possiede `ConverterState` (coda, progresso, messaggio, flag "converting")
//! - Accetta file e cartelle ("drop") e li filtra nella `FileQueue`
//! - Avvia i batch inviando un `ConversionJob` al worker in background
//! - Applica i `DriverEvent` ricevuti: è l'unico a scrivere lo stato
//! - Pubblica ogni cambiamento su un canale `watch` per gli osservatori
//!
//! ## Guardie:
//! - `start()` con coda vuota (o senza item `Pending`) è un no-op
//! - `start()` durante un batch in corso restituisce `ConvertError::AlreadyRunning`
//! - `clear()` scarta gli eventi del batch corrente, che però termina comunque
//!
//! ## Esempio:
//! ```rust,no_run
//! use heic_converter::{Config, Converter};
//!
//! # async fn demo() -> heic_converter::error::Result<()> {
//! let mut converter = Converter::with_external_tools(Config::default())?;
//! converter.enqueue(["/photos/IMG_0001.HEIC", "/photos/notes.txt"]);
//! if let Some(stats) = converter.run().await? {
//!     println!("{}", stats.format_summary());
//! }
//! # Ok(())
//! # }
//! ```

use crate::codec::{ExternalToolCodec, ImageCodec, JPEG_QUALITY};
use crate::config::Config;
use crate::driver::{ConversionDriver, ConversionJob, DriverEvent};
use crate::error::{ConvertError, Result};
use crate::file_manager::FileManager;
use crate::progress::ConversionStats;
use crate::queue::{FileQueue, ItemStatus, QueueItem};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Status message shown before anything is queued
pub const INITIAL_MESSAGE: &str = "Drop HEIC/HEIF files to convert";

/// Observable state owned by the coordinator
#[derive(Debug, Clone)]
pub struct ConverterState {
    pub queue: FileQueue,
    /// Fraction of the current batch completed, in [0.0, 1.0]
    pub progress: f64,
    pub status_message: String,
    pub converting: bool,
}

impl Default for ConverterState {
    fn default() -> Self {
        Self {
            queue: FileQueue::new(),
            progress: 0.0,
            status_message: INITIAL_MESSAGE.to_string(),
            converting: false,
        }
    }
}

impl ConverterState {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            items: self.queue.items().to_vec(),
            progress: self.progress,
            status_message: self.status_message.clone(),
            converting: self.converting,
        }
    }
}

/// What observers receive on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub items: Vec<QueueItem>,
    pub progress: f64,
    pub status_message: String,
    pub converting: bool,
}

/// Coordinates the file queue and the background conversion worker
pub struct Converter {
    config: Config,
    state: ConverterState,
    active_batch: Option<u64>,
    next_batch: u64,
    last_stats: Option<ConversionStats>,
    jobs: mpsc::UnboundedSender<ConversionJob>,
    events: mpsc::UnboundedReceiver<DriverEvent>,
    observers: watch::Sender<StateSnapshot>,
    worker: JoinHandle<()>,
}

impl Converter {
    /// Create a converter around any codec. Must be called inside a tokio runtime.
    pub fn new(config: Config, codec: Arc<dyn ImageCodec>) -> Result<Self> {
        config.validate()?;

        let worker = ConversionDriver::new(codec).spawn();
        let state = ConverterState::default();
        let (observers, _) = watch::channel(state.snapshot());

        Ok(Self {
            config,
            state,
            active_batch: None,
            next_batch: 1,
            last_stats: None,
            jobs: worker.jobs,
            events: worker.events,
            observers,
            worker: worker.task,
        })
    }

    /// Create a converter backed by the system's conversion tools
    pub fn with_external_tools(config: Config) -> Result<Self> {
        let codec = Arc::new(ExternalToolCodec::new(&config));
        Self::new(config, codec)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &ConverterState {
        &self.state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Receive every future state change
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.observers.subscribe()
    }

    pub fn is_converting(&self) -> bool {
        self.state.converting
    }

    /// "Start conversion" is offered only with a non-empty queue and no running batch
    pub fn can_start(&self) -> bool {
        !self.state.converting && !self.state.queue.is_empty()
    }

    /// "Clear queue" is offered only while idle
    pub fn can_clear(&self) -> bool {
        !self.state.converting
    }

    /// Stats of the most recently finished batch
    pub fn last_stats(&self) -> Option<ConversionStats> {
        self.last_stats
    }

    fn publish(&self) {
        self.observers.send_replace(self.state.snapshot());
    }

    /// Add dropped files; non HEIC/HEIF and already queued paths are ignored.
    /// Returns how many items were added.
    pub fn enqueue<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let added = self.state.queue.enqueue(paths);
        if added > 0 {
            debug!("Queued {} new file(s), {} total", added, self.state.queue.len());
            self.state.status_message = format!("{} file(s) waiting", self.state.queue.len());
            self.publish();
        }
        added
    }

    /// Add every HEIC/HEIF file found in `dir`
    pub fn add_folder(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let files = FileManager::find_heic_files(dir, self.config.recursive)?;
        if files.is_empty() {
            info!("No HEIC files found in {}", dir.display());
        }
        Ok(self.enqueue(files))
    }

    /// Add a mix of files and folders, the way a drop would deliver them.
    /// Folders that can't be read are logged and skipped.
    pub fn add_paths<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if path.is_dir() {
                match self.add_folder(&path) {
                    Ok(count) => added += count,
                    Err(e) => warn!("Skipping folder {}: {:#}", path.display(), e),
                }
            } else {
                added += self.enqueue([&path]);
            }
        }
        added
    }

    /// Empty the queue and reset progress, message and the converting flag
    pub fn clear(&mut self) {
        if let Some(batch) = self.active_batch.take() {
            warn!("Queue cleared while batch {} was running; its remaining updates are dropped", batch);
        }
        self.state.queue.clear();
        self.state.progress = 0.0;
        self.state.status_message = INITIAL_MESSAGE.to_string();
        self.state.converting = false;
        self.publish();
    }

    /// Hand the pending items to the worker.
    /// Returns `Ok(false)` when there is nothing to convert.
    pub fn start(&mut self) -> Result<bool> {
        if self.state.converting {
            return Err(ConvertError::AlreadyRunning);
        }

        let items = self.state.queue.pending();
        if items.is_empty() {
            debug!("Nothing pending, conversion not started");
            return Ok(false);
        }

        let batch = self.next_batch;
        let total = items.len();
        self.jobs
            .send(ConversionJob {
                batch,
                items,
                quality: JPEG_QUALITY,
            })
            .map_err(|_| ConvertError::WorkerStopped)?;

        self.next_batch += 1;
        self.active_batch = Some(batch);
        self.state.converting = true;
        self.state.progress = 0.0;
        self.state.status_message = format!("Converting {} file(s)", total);
        info!("Started batch {} with {} file(s)", batch, total);
        self.publish();
        Ok(true)
    }

    /// Wait for the next worker event of the running batch and apply it.
    /// Returns `None` when no batch is running.
    pub async fn next_event(&mut self) -> Option<DriverEvent> {
        loop {
            let active = self.active_batch?;
            let Some(event) = self.events.recv().await else {
                warn!("Conversion worker is gone, abandoning batch {}", active);
                self.active_batch = None;
                self.state.converting = false;
                self.state.status_message = "Conversion worker stopped".to_string();
                self.publish();
                return None;
            };

            if event.batch() != active {
                debug!("Dropping update from cleared batch {}", event.batch());
                continue;
            }

            self.apply(&event);
            return Some(event);
        }
    }

    fn apply(&mut self, event: &DriverEvent) {
        match event {
            DriverEvent::ItemStarted {
                index,
                position,
                total,
                path,
                ..
            } => {
                if let Err(e) = self.state.queue.set_status(*index, ItemStatus::Converting) {
                    warn!("Ignoring start of {}: {}", path.display(), e);
                }
                self.state.status_message =
                    format!("Converting ({}/{}): {}", position, total, FileManager::display_name(path));
            }
            DriverEvent::ItemFinished {
                index,
                succeeded,
                completed,
                total,
                ..
            } => {
                let status = if *succeeded {
                    ItemStatus::Succeeded
                } else {
                    ItemStatus::Failed
                };
                if let Err(e) = self.state.queue.set_status(*index, status) {
                    warn!("Ignoring result for item {}: {}", index, e);
                }
                if *total > 0 {
                    self.state.progress = *completed as f64 / *total as f64;
                }
            }
            DriverEvent::BatchFinished { batch, stats } => {
                info!("Batch {} finished: {}", batch, stats.format_summary());
                self.active_batch = None;
                self.last_stats = Some(*stats);
                self.state.converting = false;
                self.state.progress = 1.0;
                self.state.status_message = stats.format_summary();
            }
        }
        self.publish();
    }

    /// Start a batch and apply its events until it finishes.
    /// Returns `None` when there was nothing to convert.
    pub async fn run(&mut self) -> Result<Option<ConversionStats>> {
        if !self.start()? {
            return Ok(None);
        }

        while self.is_converting() {
            if self.next_event().await.is_none() {
                return Err(ConvertError::WorkerStopped);
            }
        }
        Ok(self.last_stats)
    }

    /// Stop accepting batches and wait for the worker to drain its jobs
    pub async fn shutdown(self) {
        let Converter { jobs, worker, .. } = self;
        drop(jobs);
        if let Err(e) = worker.await {
            warn!("Conversion worker ended abnormally: {}", e);
        }
    }
}
