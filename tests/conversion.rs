use async_trait::async_trait;
use heic_converter::converter::INITIAL_MESSAGE;
use heic_converter::driver::DriverEvent;
use heic_converter::error::Result;
use heic_converter::{Config, ConvertError, Converter, ImageCodec, ItemStatus, JPEG_QUALITY};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Reads the source, refuses anything not starting with `HEIC`, writes a fake JPEG.
struct FakeCodec {
    calls: Mutex<Vec<PathBuf>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeCodec {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageCodec for FakeCodec {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn convert(&self, source: &Path, destination: &Path, quality: f32) -> Result<()> {
        if let Some(ref gate) = self.gate {
            gate.acquire().await.map_err(|_| ConvertError::WorkerStopped)?.forget();
        }
        self.calls.lock().unwrap().push(source.to_path_buf());

        let bytes = tokio::fs::read(source).await?;
        if !bytes.starts_with(b"HEIC") {
            return Err(ConvertError::ToolFailed("cannot decode source".to_string()));
        }
        tokio::fs::write(destination, format!("JPEG quality={}", quality)).await?;
        Ok(())
    }
}

fn write_heic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"HEIC fake payload").unwrap();
    path
}

fn statuses(converter: &Converter) -> Vec<ItemStatus> {
    converter.state().queue.items().iter().map(|item| item.status).collect()
}

#[tokio::test]
async fn drop_keeps_only_unique_heic_paths() {
    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();

    let added = converter.enqueue(["photo1.heic", "photo1.heic", "photo2.HEIF", "doc.png"]);
    assert_eq!(added, 2);

    let queued: Vec<PathBuf> = converter
        .snapshot()
        .items
        .into_iter()
        .map(|item| item.source_path)
        .collect();
    assert_eq!(queued, vec![PathBuf::from("photo1.heic"), PathBuf::from("photo2.HEIF")]);

    // Dropping the same files again changes nothing.
    assert_eq!(converter.enqueue(["photo2.HEIF", "PHOTO1.png"]), 0);
    assert_eq!(converter.state().queue.len(), 2);
    assert_eq!(converter.state().status_message, "2 file(s) waiting");
}

#[tokio::test]
async fn folder_drop_collects_heic_files() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("trip")).unwrap();
    write_heic(temp_dir.path(), "a.heic");
    write_heic(temp_dir.path(), "trip/b.HEIC");
    std::fs::write(temp_dir.path().join("notes.txt"), b"x").unwrap();

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    let added = converter.add_paths(vec![temp_dir.path().to_path_buf(), temp_dir.path().join("a.heic")]);
    assert_eq!(added, 2);

    let flat = Config {
        recursive: false,
        ..Default::default()
    };
    let mut converter = Converter::new(flat, FakeCodec::new()).unwrap();
    assert_eq!(converter.add_folder(temp_dir.path()).unwrap(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_folder_does_not_cut_the_drop_short() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let first = write_heic(temp_dir.path(), "first.heic");
    let last = write_heic(temp_dir.path(), "last.heic");
    let locked = temp_dir.path().join("locked");
    std::fs::create_dir(&locked).unwrap();
    std::fs::write(locked.join("notes.txt"), b"x").unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    let added = converter.add_paths(vec![first.clone(), locked.clone(), last.clone()]);
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(added, 2);
    let queued: Vec<PathBuf> = converter
        .state()
        .queue
        .items()
        .iter()
        .map(|item| item.source_path.clone())
        .collect();
    assert_eq!(queued, vec![first, last]);
    assert_eq!(converter.state().status_message, "2 file(s) waiting");
}

#[tokio::test]
async fn run_finishes_every_item_and_reaches_full_progress() {
    let temp_dir = TempDir::new().unwrap();
    let files: Vec<PathBuf> = ["one.heic", "two.heic", "three.heif", "four.HEIC"]
        .iter()
        .map(|name| write_heic(temp_dir.path(), name))
        .collect();

    let codec = FakeCodec::new();
    let mut converter = Converter::new(Config::default(), codec.clone()).unwrap();
    converter.enqueue(&files);

    let stats = converter.run().await.unwrap().expect("batch should run");
    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.failed, 0);

    assert!(statuses(&converter).iter().all(|s| *s == ItemStatus::Succeeded));
    assert_eq!(converter.state().progress, 1.0);
    assert!(!converter.is_converting());
    assert_eq!(converter.state().status_message, "Done! Succeeded: 4, Failed: 0");
    assert_eq!(codec.calls(), files);
}

#[tokio::test]
async fn unreadable_item_fails_without_stopping_the_batch() {
    let temp_dir = TempDir::new().unwrap();
    let first = write_heic(temp_dir.path(), "first.heic");
    let second = write_heic(temp_dir.path(), "second.heic");
    let third = write_heic(temp_dir.path(), "third.heic");

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue([&first, &second, &third]);
    std::fs::remove_file(&second).unwrap();

    let stats = converter.run().await.unwrap().unwrap();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        statuses(&converter),
        vec![ItemStatus::Succeeded, ItemStatus::Failed, ItemStatus::Succeeded]
    );
    assert_eq!(converter.state().progress, 1.0);
    assert!(temp_dir.path().join("third.jpg").exists());
    assert!(!temp_dir.path().join("second.jpg").exists());
}

#[tokio::test]
async fn corrupt_item_is_marked_failed() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_heic(temp_dir.path(), "good.heic");
    let corrupt = temp_dir.path().join("corrupt.heic");
    std::fs::write(&corrupt, b"garbage").unwrap();

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue([&corrupt, &good]);
    converter.run().await.unwrap();

    assert_eq!(statuses(&converter), vec![ItemStatus::Failed, ItemStatus::Succeeded]);
}

#[tokio::test]
async fn items_are_converted_strictly_in_enqueue_order() {
    let temp_dir = TempDir::new().unwrap();
    let files: Vec<PathBuf> = ["c.heic", "a.heic", "b.heic"]
        .iter()
        .map(|name| write_heic(temp_dir.path(), name))
        .collect();

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue(&files);
    assert!(converter.start().unwrap());

    let mut events = Vec::new();
    while let Some(event) = converter.next_event().await {
        if let DriverEvent::ItemStarted { index, .. } = event {
            // Nothing after this item has started yet.
            let current = statuses(&converter);
            assert_eq!(current[index], ItemStatus::Converting);
            assert!(current[index + 1..].iter().all(|s| *s == ItemStatus::Pending));
            assert!(current[..index].iter().all(|s| s.is_terminal()));
        }
        events.push(event);
    }

    let started: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            DriverEvent::ItemStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![0, 1, 2]);

    let kinds: Vec<&str> = events
        .iter()
        .map(|event| match event {
            DriverEvent::ItemStarted { .. } => "start",
            DriverEvent::ItemFinished { .. } => "finish",
            DriverEvent::BatchFinished { .. } => "batch",
        })
        .collect();
    assert_eq!(kinds, vec!["start", "finish", "start", "finish", "start", "finish", "batch"]);
}

#[tokio::test]
async fn progress_is_completed_over_total() {
    let temp_dir = TempDir::new().unwrap();
    let files: Vec<PathBuf> = ["1.heic", "2.heic", "3.heic", "4.heic"]
        .iter()
        .map(|name| write_heic(temp_dir.path(), name))
        .collect();

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue(&files);
    converter.start().unwrap();

    let mut seen = Vec::new();
    while let Some(event) = converter.next_event().await {
        if let DriverEvent::ItemFinished { .. } = event {
            seen.push(converter.state().progress);
        }
    }
    assert_eq!(seen, vec![0.25, 0.5, 0.75, 1.0]);
}

#[tokio::test]
async fn overlapping_start_is_rejected() {
    let gate = Arc::new(Semaphore::new(0));
    let temp_dir = TempDir::new().unwrap();
    let file = write_heic(temp_dir.path(), "slow.heic");

    let mut converter = Converter::new(Config::default(), FakeCodec::gated(gate.clone())).unwrap();
    converter.enqueue([&file]);
    assert!(converter.start().unwrap());
    assert!(matches!(converter.start(), Err(ConvertError::AlreadyRunning)));
    assert!(matches!(converter.run().await, Err(ConvertError::AlreadyRunning)));

    gate.add_permits(1);
    while converter.next_event().await.is_some() {}
    assert_eq!(statuses(&converter), vec![ItemStatus::Succeeded]);
}

#[tokio::test]
async fn terminal_items_are_not_reconverted() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_heic(temp_dir.path(), "done.heic");

    let codec = FakeCodec::new();
    let mut converter = Converter::new(Config::default(), codec.clone()).unwrap();
    converter.enqueue([&file]);
    converter.run().await.unwrap();

    assert!(!converter.start().unwrap());
    assert!(converter.run().await.unwrap().is_none());
    assert_eq!(codec.calls().len(), 1);

    // A newly dropped file is converted on its own.
    let extra = write_heic(temp_dir.path(), "extra.heic");
    converter.enqueue([&extra]);
    let stats = converter.run().await.unwrap().unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(codec.calls(), vec![file, extra]);
}

#[tokio::test]
async fn clear_resets_everything_after_a_batch() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_heic(temp_dir.path(), "a.heic");

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue([&file]);
    converter.run().await.unwrap();
    converter.clear();

    let snapshot = converter.snapshot();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.progress, 0.0);
    assert!(!snapshot.converting);
    assert_eq!(snapshot.status_message, INITIAL_MESSAGE);
}

#[tokio::test]
async fn clear_during_a_batch_discards_its_updates() {
    let gate = Arc::new(Semaphore::new(0));
    let temp_dir = TempDir::new().unwrap();
    let old = write_heic(temp_dir.path(), "old.heic");

    let codec = FakeCodec::gated(gate.clone());
    let mut converter = Converter::new(Config::default(), codec.clone()).unwrap();
    converter.enqueue([&old]);
    converter.start().unwrap();

    converter.clear();
    let snapshot = converter.snapshot();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.progress, 0.0);
    assert!(!snapshot.converting);
    assert!(converter.next_event().await.is_none());

    let new = write_heic(temp_dir.path(), "new.heic");
    converter.enqueue([&new]);
    gate.add_permits(2);
    let stats = converter.run().await.unwrap().unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(statuses(&converter), vec![ItemStatus::Succeeded]);
    assert_eq!(converter.state().queue.items()[0].source_path, new);
    // The cleared batch still ran to completion in the background.
    assert_eq!(codec.calls(), vec![old, new]);
}

#[tokio::test]
async fn output_lands_next_to_source_and_is_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_heic(temp_dir.path(), "vacation.heic");
    let output = temp_dir.path().join("vacation.jpg");

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    converter.enqueue([&source]);
    converter.run().await.unwrap();

    let expected = format!("JPEG quality={}", JPEG_QUALITY);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), expected);

    std::fs::write(&output, b"stale").unwrap();
    converter.clear();
    converter.enqueue([&source]);
    let stats = converter.run().await.unwrap().unwrap();

    assert_eq!(stats.failed, 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), expected);
}

#[tokio::test]
async fn observers_see_the_final_state() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_heic(temp_dir.path(), "a.heic");

    let mut converter = Converter::new(Config::default(), FakeCodec::new()).unwrap();
    let mut observer = converter.subscribe();
    assert!(!observer.has_changed().unwrap());

    converter.enqueue([&file]);
    assert!(observer.has_changed().unwrap());
    assert_eq!(observer.borrow_and_update().items.len(), 1);

    converter.run().await.unwrap();
    let latest = observer.borrow_and_update().clone();
    assert_eq!(latest.progress, 1.0);
    assert!(!latest.converting);
    assert_eq!(latest.items[0].status, ItemStatus::Succeeded);
}
