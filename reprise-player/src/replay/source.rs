//! Replay sources.
//!
//! A source hands out the packet log from its first byte as often as the
//! sender asks (every restart reopens it), plus the replay metadata and any
//! resource packs stored with the recording.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::ReplayError;

use super::packet_log::{encode_log, Frame, PacketLogReader};

/// Packet log inside a replay directory
pub const RECORDING_FILE: &str = "recording.tmcpr";

/// Replay metadata inside a replay directory
pub const METADATA_FILE: &str = "metaData.json";

/// Directory holding embedded resource packs
pub const RESOURCE_PACK_DIR: &str = "resourcepack";

/// Maps resource pack ids to content hashes
pub const RESOURCE_PACK_INDEX: &str = "index.json";

/// Byte stream handed out by a source
pub type PacketStream = Box<dyn Read + Send>;

/// Where a replay's packets and assets come from
pub trait ReplaySource: Send {
    /// Open the packet log at its first byte
    fn open_packets(&self) -> Result<PacketStream, ReplayError>;

    /// Total replay length in milliseconds
    fn duration_ms(&self) -> u32;

    /// Resource pack id to content hash, `None` if the replay has no packs
    fn resource_pack_index(&self) -> Result<Option<HashMap<u32, String>>, ReplayError>;

    /// Open the resource pack with this hash, `None` if it is missing
    fn open_resource_pack(&self, hash: &str) -> Result<Option<PacketStream>, ReplayError>;
}

/// Replay metadata (`metaData.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayMetadata {
    /// Replay length in milliseconds
    pub duration: u32,
    pub server_name: Option<String>,
    /// Recording start (Unix timestamp ms)
    pub date: Option<u64>,
    pub mcversion: Option<String>,
    pub generator: Option<String>,
    pub self_id: Option<i32>,
}

/// Largest frame timestamp of a log, stopping quietly at a damaged tail
pub fn scan_duration<R: Read>(reader: R) -> u32 {
    let mut log = PacketLogReader::new(reader);
    let mut max = 0;
    loop {
        match log.next_frame() {
            Ok(Some(frame)) => max = max.max(frame.timestamp_ms),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped duration scan: {}", e);
                break;
            }
        }
    }
    max
}

/// Resource pack hashes become file names, so only ASCII letters and digits pass
pub(crate) fn is_safe_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.chars().all(|c| c.is_ascii_alphanumeric())
}

// =============================================================================
// Directory source
// =============================================================================

/// An extracted replay on disk
pub struct DirectorySource {
    base_dir: PathBuf,
    metadata: ReplayMetadata,
}

impl DirectorySource {
    /// Open an extracted replay directory
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, ReplayError> {
        let base_dir = base_dir.into();
        let recording = base_dir.join(RECORDING_FILE);
        if !recording.is_file() {
            return Err(ReplayError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("No packet log at {}", recording.display()),
            )));
        }

        let meta_path = base_dir.join(METADATA_FILE);
        let metadata = match File::open(&meta_path) {
            Ok(file) => {
                let metadata: ReplayMetadata = serde_json::from_reader(BufReader::new(file))?;
                debug!(
                    "Loaded metadata for {} ({}ms)",
                    base_dir.display(),
                    metadata.duration
                );
                metadata
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "No {} in {}, scanning packet log for its length",
                    METADATA_FILE,
                    base_dir.display()
                );
                ReplayMetadata {
                    duration: scan_duration(BufReader::new(File::open(&recording)?)),
                    ..Default::default()
                }
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { base_dir, metadata })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn metadata(&self) -> &ReplayMetadata {
        &self.metadata
    }
}

impl ReplaySource for DirectorySource {
    fn open_packets(&self) -> Result<PacketStream, ReplayError> {
        let file = File::open(self.base_dir.join(RECORDING_FILE))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn duration_ms(&self) -> u32 {
        self.metadata.duration
    }

    fn resource_pack_index(&self) -> Result<Option<HashMap<u32, String>>, ReplayError> {
        let path = self.base_dir.join(RESOURCE_PACK_DIR).join(RESOURCE_PACK_INDEX);
        match File::open(&path) {
            Ok(file) => Ok(Some(serde_json::from_reader(BufReader::new(file))?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn open_resource_pack(&self, hash: &str) -> Result<Option<PacketStream>, ReplayError> {
        if !is_safe_hash(hash) {
            warn!("Ignoring resource pack with invalid hash {:?}", hash);
            return Ok(None);
        }
        let path = self
            .base_dir
            .join(RESOURCE_PACK_DIR)
            .join(format!("{}.zip", hash));
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory source
// =============================================================================

/// A replay held entirely in memory
#[derive(Clone)]
pub struct MemorySource {
    log: Arc<[u8]>,
    duration_ms: u32,
    pack_index: Option<HashMap<u32, String>>,
    packs: HashMap<String, Arc<[u8]>>,
    opens: Arc<AtomicUsize>,
}

impl MemorySource {
    /// Build from raw log bytes
    pub fn from_log(log: Vec<u8>) -> Self {
        let duration_ms = scan_duration(log.as_slice());
        Self {
            log: log.into(),
            duration_ms,
            pack_index: None,
            packs: HashMap::new(),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_frames(frames: &[Frame]) -> Result<Self, ReplayError> {
        Ok(Self::from_log(encode_log(frames)?))
    }

    /// Register a resource pack under an index id
    pub fn with_resource_pack(mut self, id: u32, hash: &str, data: Vec<u8>) -> Self {
        self.pack_index
            .get_or_insert_with(HashMap::new)
            .insert(id, hash.to_string());
        self.packs.insert(hash.to_string(), data.into());
        self
    }

    /// How many times the packet log has been opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ReplaySource for MemorySource {
    fn open_packets(&self) -> Result<PacketStream, ReplayError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(self.log.clone())))
    }

    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn resource_pack_index(&self) -> Result<Option<HashMap<u32, String>>, ReplayError> {
        Ok(self.pack_index.clone())
    }

    fn open_resource_pack(&self, hash: &str) -> Result<Option<PacketStream>, ReplayError> {
        Ok(self
            .packs
            .get(hash)
            .map(|data| Box::new(Cursor::new(data.clone())) as PacketStream))
    }
}

/// Write an extracted replay directory
pub fn write_directory(
    dir: &Path,
    frames: &[Frame],
    metadata: Option<&ReplayMetadata>,
) -> Result<(), ReplayError> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(RECORDING_FILE), encode_log(frames)?)?;
    if let Some(metadata) = metadata {
        fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(metadata)?)?;
    }
    Ok(())
}
