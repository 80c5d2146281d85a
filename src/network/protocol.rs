//! Wire Protocol
//!
//! Defines the messages exchanged between nodes, the tracker, the
//! directory service and the control tool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::NodeRole;

/// Protocol messages for node communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    // ========== Election ==========
    /// Ask a peer for its vote in `epoch`
    RequestVote {
        epoch: u64,
        candidate_id: String,
    },

    /// Vote response
    VoteResponse {
        granted: bool,
    },

    /// A candidate announces it started an election
    ElectionStarted {
        candidate_id: String,
    },

    /// A candidate announces it won `epoch`
    ElectionResult {
        tracker_id: String,
        epoch: u64,
    },

    /// Empty acknowledgement
    Ack,

    // ========== File Transfer ==========
    /// Fetch a file's bytes from its owner
    GetFile {
        filename: String,
    },

    /// File bytes, `None` when the owner no longer has the file
    FileContent {
        data: Option<Vec<u8>>,
    },

    // ========== Tracker ==========
    /// Replace the full file list of `owner`
    RegisterFiles {
        owner: String,
        filenames: Vec<String>,
    },

    /// `owner` now holds `filename`
    FileAdded {
        owner: String,
        filename: String,
    },

    /// `owner` no longer holds `filename`
    FileRemoved {
        owner: String,
        filename: String,
    },

    /// Which nodes own `filename`
    WhoHas {
        filename: String,
    },

    /// Owner addresses
    Owners {
        addresses: Vec<String>,
    },

    /// Tracker liveness probe
    Heartbeat,

    /// Tracker liveness acknowledgement
    HeartbeatAck {
        epoch: u64,
    },

    /// Snapshot request of the whole index
    ListAllFiles,

    /// Full index snapshot
    FileIndex {
        files: BTreeMap<String, Vec<String>>,
    },

    // ========== Directory ==========
    DirectoryRegister {
        name: String,
        address: String,
    },

    DirectoryRemove {
        name: String,
    },

    DirectoryList {
        prefix: String,
    },

    DirectoryEntries {
        entries: BTreeMap<String, String>,
    },

    // ========== Control ==========
    /// Status request
    StatusRequest,

    /// Status response
    StatusResponse {
        node_id: String,
        address: String,
        epoch: u64,
        role: NodeRole,
        election_in_progress: bool,
        tracker_address: Option<String>,
        /// RFC 3339 time the node started
        joined_at: String,
    },

    /// Start an election on the receiving node
    TriggerElection,

    /// Outcome of a triggered election
    ElectionReport {
        won: bool,
        epoch: u64,
        granted: usize,
        respondents: usize,
        skipped: bool,
    },

    /// List files in the node's shared directory
    ListLocal,

    /// Ask the node for the tracker's whole index, answered with `FileIndex`
    ListNetwork,

    /// Local file names
    LocalFiles {
        filenames: Vec<String>,
    },

    /// Store and advertise a file
    ShareFile {
        filename: String,
        data: Vec<u8>,
    },

    /// Delete a file and withdraw its advertisement
    UnshareFile {
        filename: String,
    },

    /// Download a file from whichever owner answers first
    Download {
        filename: String,
    },

    /// Download finished, `source` is the owner that served it
    Downloaded {
        source: String,
        size: u64,
    },

    // ========== Error ==========
    /// Error response
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Error codes for protocol errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The receiver does not hold the tracker role
    NotTracker,
    /// Requested file does not exist
    NotFound,
    /// Request not understood by the receiver
    BadRequest,
    /// Internal error
    Internal,
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Build an error response from a crate error
    pub fn from_error(err: &crate::Error) -> Self {
        Message::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::RequestVote { .. } => "RequestVote",
            Message::VoteResponse { .. } => "VoteResponse",
            Message::ElectionStarted { .. } => "ElectionStarted",
            Message::ElectionResult { .. } => "ElectionResult",
            Message::Ack => "Ack",
            Message::GetFile { .. } => "GetFile",
            Message::FileContent { .. } => "FileContent",
            Message::RegisterFiles { .. } => "RegisterFiles",
            Message::FileAdded { .. } => "FileAdded",
            Message::FileRemoved { .. } => "FileRemoved",
            Message::WhoHas { .. } => "WhoHas",
            Message::Owners { .. } => "Owners",
            Message::Heartbeat => "Heartbeat",
            Message::HeartbeatAck { .. } => "HeartbeatAck",
            Message::ListAllFiles => "ListAllFiles",
            Message::FileIndex { .. } => "FileIndex",
            Message::DirectoryRegister { .. } => "DirectoryRegister",
            Message::DirectoryRemove { .. } => "DirectoryRemove",
            Message::DirectoryList { .. } => "DirectoryList",
            Message::DirectoryEntries { .. } => "DirectoryEntries",
            Message::StatusRequest => "StatusRequest",
            Message::StatusResponse { .. } => "StatusResponse",
            Message::TriggerElection => "TriggerElection",
            Message::ElectionReport { .. } => "ElectionReport",
            Message::ListLocal => "ListLocal",
            Message::ListNetwork => "ListNetwork",
            Message::LocalFiles { .. } => "LocalFiles",
            Message::ShareFile { .. } => "ShareFile",
            Message::UnshareFile { .. } => "UnshareFile",
            Message::Download { .. } => "Download",
            Message::Downloaded { .. } => "Downloaded",
            Message::Error { .. } => "Error",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Largest body accepted from the wire
    pub const MAX_LENGTH: u32 = 64 * 1024 * 1024;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = *bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }
}
