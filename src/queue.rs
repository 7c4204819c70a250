//! # File Queue Module
//!
//! Coda ordinata dei file in attesa di conversione, ognuno con il proprio stato.
//!
//! ## Invarianti:
//! - Ordine di iterazione = ordine di inserimento
//! - Nessun path duplicato nella coda
//! - Lo stato avanza solo in avanti: `Pending → Converting → {Succeeded, Failed}`
//!
//! Gli item vengono rimossi solo da `clear()`, mai singolarmente.

use crate::file_manager::FileManager;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-item conversion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Converting,
    Succeeded,
    Failed,
}

impl ItemStatus {
    /// Succeeded and Failed are final until the queue is cleared
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    /// Whether `self -> next` is a forward transition
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Converting)
                | (ItemStatus::Converting, ItemStatus::Succeeded)
                | (ItemStatus::Converting, ItemStatus::Failed)
        )
    }

    pub fn icon(self) -> &'static str {
        match self {
            ItemStatus::Pending => "…",
            ItemStatus::Converting => "⏳",
            ItemStatus::Succeeded => "✅",
            ItemStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Converting => "converting",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One file's conversion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    pub source_path: PathBuf,
    pub status: ItemStatus,
}

impl QueueItem {
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            source_path,
            status: ItemStatus::Pending,
        }
    }
}

/// Rejected status change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no queue item at index {0}")]
    NoSuchItem(usize),

    #[error("illegal status transition {from} -> {to}")]
    Backward { from: ItemStatus, to: ItemStatus },
}

/// Insertion-ordered, path-unique queue of files to convert
#[derive(Debug, Default, Clone)]
pub struct FileQueue {
    items: Vec<QueueItem>,
    paths: HashSet<PathBuf>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every recognized, not yet queued path as `Pending`.
    /// Returns how many items were added.
    pub fn enqueue<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !FileManager::is_heic(path) || self.paths.contains(path) {
                continue;
            }
            self.paths.insert(path.to_path_buf());
            self.items.push(QueueItem::new(path.to_path_buf()));
            added += 1;
        }
        added
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
        self.paths.clear();
    }

    /// Move item `index` forward to `status`
    pub fn set_status(&mut self, index: usize, status: ItemStatus) -> Result<(), TransitionError> {
        let item = self
            .items
            .get_mut(index)
            .ok_or(TransitionError::NoSuchItem(index))?;
        if !item.status.can_transition_to(status) {
            return Err(TransitionError::Backward {
                from: item.status,
                to: status,
            });
        }
        item.status = status;
        Ok(())
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Indices and paths of items still `Pending`, in queue order
    pub fn pending(&self) -> Vec<(usize, PathBuf)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == ItemStatus::Pending)
            .map(|(index, item)| (index, item.source_path.clone()))
            .collect()
    }

    /// Number of items with the given status
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}
