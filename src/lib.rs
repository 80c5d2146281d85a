//! WolfShare - Peer-to-Peer File Sharing with an Elected Tracker
//!
//! Nodes share files from a local directory. One node at a time acts as
//! the tracker, indexing which node owns which file, and is chosen by a
//! majority vote among the nodes that answer.
//!
//! # Architecture
//!
//! Nodes find each other through a small name directory (`peer.<id>`,
//! `tracker.<epoch>`). Every node runs a heartbeat monitor against the
//! advertised tracker and starts an election for the next epoch when it
//! stops answering. Each tracker starts with an empty file index which
//! the nodes rebuild by re-registering their files.
//!
//! # Features
//!
//! - Epoch-based tracker election with one vote per node per epoch
//! - Heartbeat monitoring with randomized jitter
//! - File index with register / add / remove / who-has lookups
//! - Peer-to-peer downloads trying every known owner
//! - Framed, checksummed binary protocol over TCP

pub mod config;
pub mod error;
pub mod network;
pub mod directory;
pub mod state;
pub mod storage;
pub mod node;

pub use config::WolfShareConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfShareConfig;
    pub use crate::error::{Error, Result};
    pub use crate::directory::{Directory, InMemoryDirectory, RemoteDirectory};
    pub use crate::network::{Message, NetworkClient, NetworkServer, Transport};
    pub use crate::node::{ElectionOutcome, Node, NodeParts, NodeService};
    pub use crate::state::NodeRole;
    pub use crate::storage::SharedDir;
}
