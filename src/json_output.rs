//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per front-end esterni
//! (es. una finestra drag-and-drop che lancia `heic2jpg --json`).
//!
//! ## Tipi di messaggi (uno per riga su stdout):
//! - `queued`: File accettati nella coda
//! - `start`: Inizio del batch
//! - `item_start`: Inizio conversione di un file
//! - `item_complete`: Fine conversione di un file (successo o fallimento)
//! - `progress`: Frazione completata del batch
//! - `complete`: Fine batch con statistiche finali
//! - `error`: Errore generale (es. nessun tool di conversione)

use crate::driver::DriverEvent;
use crate::file_manager::FileManager;
use crate::progress::ConversionStats;
use crate::queue::ItemStatus;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Queued {
        files: Vec<PathBuf>,
    },
    Start {
        total_files: usize,
        quality: f32,
    },
    ItemStart {
        path: PathBuf,
        index: usize,
        total: usize,
    },
    ItemComplete {
        path: PathBuf,
        output: PathBuf,
        status: ItemStatus,
    },
    Progress {
        completed: usize,
        total: usize,
        progress: f64,
    },
    Complete {
        succeeded: usize,
        failed: usize,
        duration_seconds: f64,
    },
    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn complete(stats: &ConversionStats, duration_seconds: f64) -> Self {
        Self::Complete {
            succeeded: stats.succeeded,
            failed: stats.failed,
            duration_seconds,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Messages describing one driver event. `path` is the source of the item
    /// the event refers to, which `ItemFinished` does not carry.
    pub fn from_event(event: &DriverEvent, path: Option<&PathBuf>) -> Vec<Self> {
        match event {
            DriverEvent::ItemStarted {
                position, total, path, ..
            } => vec![Self::ItemStart {
                path: path.clone(),
                index: *position,
                total: *total,
            }],
            DriverEvent::ItemFinished {
                succeeded,
                completed,
                total,
                ..
            } => {
                let mut messages = Vec::with_capacity(2);
                if let Some(path) = path {
                    messages.push(Self::ItemComplete {
                        path: path.clone(),
                        output: FileManager::output_path(path),
                        status: if *succeeded {
                            ItemStatus::Succeeded
                        } else {
                            ItemStatus::Failed
                        },
                    });
                }
                let progress = if *total > 0 {
                    *completed as f64 / *total as f64
                } else {
                    0.0
                };
                messages.push(Self::Progress {
                    completed: *completed,
                    total: *total,
                    progress,
                });
                messages
            }
            // The caller knows the elapsed time; see `JsonMessage::complete`.
            DriverEvent::BatchFinished { .. } => Vec::new(),
        }
    }
}
