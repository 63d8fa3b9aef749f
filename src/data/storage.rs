//! Append-only record store for raw bus messages.
//!
//! Every message is written as one frame:
//!
//! ```text
//! [i64 BE timestamp millis][topic bytes][0x00][u32 BE payload length][payload]
//! ```
//!
//! A [`RecordStore`] owns at most one open destination. `append` and `rotate` serialize
//! on a single lock; `append` holds it for the whole write and sync, so a slow disk
//! backpressures the caller. `rotate` installs the new file first and closes the
//! previous one only after the swap, once the lock has been released.

use crate::core::{BusMessage, Topic};
use crate::error::{AppResult, DaqError};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// File extension of record logs.
pub const RECORD_EXTENSION: &str = "dat";

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = i32::MAX as usize;

/// Serialize one frame.
///
/// Topics containing NUL cannot be framed and are rejected with `InvalidTopic`.
pub fn encode_frame(timestamp_millis: i64, topic: &str, payload: &[u8]) -> AppResult<Vec<u8>> {
    if topic.as_bytes().contains(&0) {
        return Err(DaqError::InvalidTopic(topic.escape_default().to_string()));
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(DaqError::FrameTooLarge { len: payload.len() });
    }
    let mut buf = Vec::with_capacity(8 + topic.len() + 1 + 4 + payload.len());
    buf.extend_from_slice(&timestamp_millis.to_be_bytes());
    buf.extend_from_slice(topic.as_bytes());
    buf.push(0);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Output handle behind a record destination.
trait RecordSink: Write + Send {
    fn sync_data(&self) -> io::Result<()>;
    fn sync_all(&self) -> io::Result<()>;
}

impl RecordSink for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }
}

struct Destination {
    path: PathBuf,
    sink: Box<dyn RecordSink>,
}

impl Destination {
    fn open(path: &Path) -> AppResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sink: Box::new(file),
        })
    }

    /// Sync and drop the handle, returning the path.
    ///
    /// The frames are already on disk after every `append`, so a failed final sync is
    /// logged and the path is still handed back for backup.
    fn retire(self) -> PathBuf {
        if let Err(e) = self.sink.sync_all() {
            warn!(path = %self.path.display(), error = %e, "final sync of record failed");
        }
        self.path
    }
}

/// A record log with a single, swappable output file.
pub struct RecordStore {
    dest: Mutex<Option<Destination>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    /// A store with no destination; `append` fails until the first `rotate`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dest: Mutex::new(None),
        }
    }

    /// A store writing to `path`, appending if it already exists.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        Ok(Self {
            dest: Mutex::new(Some(Destination::open(path.as_ref())?)),
        })
    }

    /// Path of the active destination, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<PathBuf> {
        self.dest.lock().as_ref().map(|d| d.path.clone())
    }

    /// Write one frame and sync it to disk.
    pub fn append(&self, timestamp_millis: i64, topic: &str, payload: &[u8]) -> AppResult<()> {
        let frame = encode_frame(timestamp_millis, topic, payload)?;
        let mut guard = self.dest.lock();
        let dest = guard.as_mut().ok_or(DaqError::NoDestination)?;
        dest.sink.write_all(&frame)?;
        dest.sink.flush()?;
        dest.sink.sync_data()?;
        Ok(())
    }

    /// Record a bus message stamped with its arrival time.
    pub fn append_message(&self, message: &BusMessage) -> AppResult<()> {
        self.append(message.arrival_millis, &message.topic, &message.payload)
    }

    /// Switch to `path` and return the previous destination's path.
    ///
    /// The new file is opened before the lock is taken; a failure to open it leaves the
    /// current destination in place. Once the swap has happened the rotation stands, even
    /// if the previous file fails its final sync.
    pub fn rotate(&self, path: impl AsRef<Path>) -> AppResult<Option<PathBuf>> {
        let next = Destination::open(path.as_ref())?;
        Ok(self.install(next))
    }

    fn install(&self, next: Destination) -> Option<PathBuf> {
        let to = next.path.clone();
        let Some(previous) = self.dest.lock().replace(next) else {
            info!(path = %to.display(), "record store opened");
            return None;
        };
        let from = previous.retire();
        info!(from = %from.display(), to = %to.display(), "record store rotated");
        Some(from)
    }

    /// Rotate to a fresh timestamped file in `dir`.
    pub fn rotate_timestamped(&self, dir: impl AsRef<Path>, prefix: &str) -> AppResult<Option<PathBuf>> {
        let path = timestamped_destination(dir, prefix)?;
        self.rotate(path)
    }

    /// Close the destination, returning its path.
    pub fn close(&self) -> Option<PathBuf> {
        let previous = self.dest.lock().take();
        previous.map(Destination::retire)
    }
}

/// Build `<dir>/<prefix>YYYY-MM-DD-HH-MM-SS.dat` from the local time, creating `dir`.
pub fn timestamped_destination(dir: impl AsRef<Path>, prefix: &str) -> AppResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    Ok(dir.join(format!("{prefix}{stamp}.{RECORD_EXTENSION}")))
}

/// Copy a closed log to `<backup_root>/<parent dir name>/<file name>`.
pub fn backup_file(path: impl AsRef<Path>, backup_root: impl AsRef<Path>) -> AppResult<PathBuf> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| DaqError::Configuration(format!("not a file: {}", path.display())))?;
    let mut target = backup_root.as_ref().to_path_buf();
    if let Some(parent) = path.parent().and_then(Path::file_name) {
        target.push(parent);
    }
    fs::create_dir_all(&target)?;
    target.push(file_name);
    fs::copy(path, &target)?;
    debug!(from = %path.display(), to = %target.display(), "backed up record");
    Ok(target)
}

/// Delete record logs under `root` (and its immediate subdirectories) last modified
/// more than `max_age` ago. Returns the removed paths.
pub fn remove_expired(root: impl AsRef<Path>, max_age: Duration) -> AppResult<Vec<PathBuf>> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = Vec::new();
    let mut dirs = vec![root.as_ref().to_path_buf()];
    for entry in fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    for dir in dirs {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot scan record directory");
                continue;
            }
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_record = path.extension().is_some_and(|e| e == RECORD_EXTENSION);
            if !is_record || !entry.file_type()?.is_file() {
                continue;
            }
            if entry.metadata()?.modified()? < cutoff {
                fs::remove_file(&path)?;
                removed.push(path);
            }
        }
    }
    if !removed.is_empty() {
        info!(count = removed.len(), "removed expired records");
    }
    Ok(removed)
}

/// File name prefix for a device's logs: the device id with `:` replaced.
#[must_use]
pub fn device_prefix(device: &str) -> String {
    format!("{}_", device.replace(':', "_"))
}

/// One record store per device, each writing into `<root>/<device>/`.
pub struct DeviceRecorders {
    root: PathBuf,
    stores: Mutex<HashMap<String, Arc<RecordStore>>>,
}

impl DeviceRecorders {
    /// Recorders rooted at `root`; nothing is created until the first message.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `device`'s logs.
    #[must_use]
    pub fn device_dir(&self, device: &str) -> PathBuf {
        self.root.join(device.replace(':', "_"))
    }

    /// The store for `device`, opening a timestamped file on first use.
    pub fn store(&self, device: &str) -> AppResult<Arc<RecordStore>> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(device) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(RecordStore::new());
        store.rotate_timestamped(self.device_dir(device), &device_prefix(device))?;
        stores.insert(device.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Route a message to its device's store.
    pub fn record(&self, message: &BusMessage) -> AppResult<()> {
        let topic = Topic::parse(&message.topic)?;
        self.store(&topic.device)?.append_message(message)
    }

    /// Rotate every store to a new timestamped file.
    ///
    /// Returns `(device, previous path)` for each store that had a destination. A device
    /// whose new file cannot be created is logged and keeps writing to its current file;
    /// the remaining devices are still rotated.
    pub fn rotate_all(&self) -> Vec<(String, PathBuf)> {
        let stores: Vec<(String, Arc<RecordStore>)> = self
            .stores
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let mut rotated = Vec::with_capacity(stores.len());
        for (device, store) in stores {
            match store.rotate_timestamped(self.device_dir(&device), &device_prefix(&device)) {
                Ok(Some(previous)) => rotated.push((device, previous)),
                Ok(None) => {}
                Err(e) => warn!(device = %device, error = %e, "rotation failed"),
            }
        }
        rotated
    }

    /// Devices seen so far.
    #[must_use]
    pub fn devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.stores.lock().keys().cloned().collect();
        devices.sort();
        devices
    }
}
