//! # FTP session client
//!
//! Architecture:
//! - `types` — data structures, enums, config
//! - `error` — FTP-specific error type with directory context
//! - `parser` — Unix `ls -l` LIST line parsing
//! - `transport` — the async transport trait the session drives
//! - `protocol` — low-level command/response codec
//! - `connection` — plain-TCP transport with PASV data channels
//! - `memory` — in-memory transport for tests and offline use
//! - `session` — stateful session: lifecycle, navigation, listing, download
//! - `aggregate` — directory entry counts and total file size

pub mod types;
pub mod error;
pub mod parser;
pub mod transport;
pub mod protocol;
pub mod connection;
pub mod memory;
pub mod session;
pub mod aggregate;

pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use transport::FtpTransport;
pub use connection::TcpTransport;
pub use memory::{MemoryTransport, TransportOp};
pub use session::{Clock, FtpSession};
