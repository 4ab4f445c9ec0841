//! FTP-specific error type.
//!
//! Session-level failures carry the remote working directory observed right
//! after the failure (`current_dir`) when it could be fetched, and the
//! transport-level error that triggered them (`cause`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP response code that triggered the error, if any.
    pub code: Option<u16>,
    /// Remote working directory at the time of failure, best effort.
    pub current_dir: Option<String>,
    /// Lower-level error this one wraps.
    pub cause: Option<Box<FtpError>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    // ── Session operations ───────────────────────────────────────
    /// TCP / DNS resolution failure or no greeting.
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// `OPTS UTF8 ON` was refused.
    EncodingNegotiationFailed,
    PassiveModeFailed,
    /// PWD failed.
    DirectoryQueryFailed,
    ChangeDirFailed,
    ParentDirFailed,
    ListingFailed,
    SizeQueryFailed,
    DownloadFailed,
    CloseFailed,
    CountFailed,
    SizeAggregationFailed,

    // ── Contract violations ──────────────────────────────────────
    /// Operation called in the wrong lifecycle state.
    InvalidState,
    /// Operation called after `close()`.
    SessionClosed,
    /// Config / parameter validation error.
    InvalidConfig,

    // ── Transport / parsing ──────────────────────────────────────
    /// A listing line could not be resolved into an entry.
    ParseFailed,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// Data channel could not be established.
    DataChannelFailed,
    /// Server sent an un-parseable response.
    ProtocolError,
    /// Server closed the control connection.
    Disconnected,
    Timeout,
    /// An I/O error on the local side (file read/write).
    IoError,
    Unsupported,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            current_dir: None,
            cause: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the working-directory context, if one was obtained.
    pub fn with_current_dir(mut self, dir: Option<String>) -> Self {
        self.current_dir = dir;
        self
    }

    pub fn with_cause(mut self, cause: FtpError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The innermost wrapped error (or `self` when nothing is wrapped).
    pub fn root_cause(&self) -> &FtpError {
        let mut err = self;
        while let Some(inner) = err.cause.as_deref() {
            err = inner;
        }
        err
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn command_rejected(code: u16, msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::CommandRejected, msg).with_code(code)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn parse_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ParseFailed, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidState, msg)
    }

    pub fn session_closed(op: &str) -> Self {
        Self::new(
            FtpErrorKind::SessionClosed,
            format!("Cannot {}: session is closed", op),
        )
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Unsupported, msg)
    }

    /// Classify a negative FTP reply into a transport-level error.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            _ if code >= 400 => return Self::command_rejected(code, text),
            _ => FtpErrorKind::ProtocolError,
        };
        Self::new(kind, text).with_code(code)
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)?,
            None => write!(f, "[FTP {:?}] {}", self.kind, self.message)?,
        }
        if let Some(ref dir) = self.current_dir {
            write!(f, ", current directory: {}", dir)?;
        }
        Ok(())
    }
}

impl std::error::Error for FtpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}
