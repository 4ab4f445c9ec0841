//! Shared types for the FTP session crate.

use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard FTP control port (RFC 959).
pub const DEFAULT_FTP_PORT: u16 = 21;

// ─── Connection / Session ────────────────────────────────────────────

/// Transfer type (RFC 959 TYPE command).
///
/// `Ascii` is the "text" mode: the server sends CRLF line endings which are
/// translated to the local convention while writing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    Binary,
}

impl Default for TransferType {
    fn default() -> Self {
        Self::Binary
    }
}

impl TransferType {
    /// The `TYPE` command selecting this mode.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Ascii => "TYPE A",
            Self::Binary => "TYPE I",
        }
    }
}

/// Configuration for a single FTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpSessionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Fixed for the lifetime of the session.
    #[serde(default)]
    pub transfer_type: TransferType,
    /// Request passive mode right after login.
    #[serde(default = "default_true")]
    pub passive: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Data-channel timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// Friendly label shown in logs.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_FTP_PORT
}
fn default_username() -> String {
    "anonymous".into()
}
fn default_password() -> String {
    "anonymous@".into()
}
fn default_true() -> bool {
    true
}
fn default_connect_timeout() -> u64 {
    90
}
fn default_data_timeout() -> u64 {
    30
}

impl Default for FtpSessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            transfer_type: TransferType::Binary,
            passive: true,
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
            label: None,
        }
    }
}

impl FtpSessionConfig {
    /// Config for `host` with every other field defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load a config from its JSON representation and validate it.
    pub fn from_json(json: &str) -> FtpResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FtpError::invalid_config(format!("Malformed session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FtpResult<()> {
        if self.host.trim().is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }
        if self.connect_timeout_sec == 0 {
            return Err(FtpError::invalid_config(
                "Connect timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of an [`FtpSession`](crate::ftp::session::FtpSession).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
    /// Terminal.
    Closed,
}

/// Information about an FTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpSessionInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub state: SessionState,
    pub transfer_type: TransferType,
    pub passive: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub bytes_downloaded: u64,
    pub label: Option<String>,
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

impl FtpEntryKind {
    /// Classify from the first character of a Unix permission string.
    pub fn from_permission_char(c: u8) -> Self {
        match c {
            b'd' => Self::Directory,
            b'-' => Self::File,
            b'l' => Self::Symlink,
            _ => Self::Unknown,
        }
    }
}

/// One resolved line of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpEntry {
    /// Display name. For symlinks the ` -> target` suffix is stripped.
    pub name: String,
    pub kind: FtpEntryKind,
    /// Byte count as reported by the server, whatever the kind.
    pub size: u64,
    /// Modification time. When the server printed a time of day instead of
    /// a year, the year is inferred and therefore approximate.
    pub modified: NaiveDateTime,
    pub permissions: String,
    pub links: u32,
    pub owner: String,
    pub group: String,
    pub link_target: Option<String>,
    /// Raw line from the server (for debugging).
    pub raw: String,
}

impl FtpEntry {
    pub fn is_file(&self) -> bool {
        self.kind == FtpEntryKind::File
    }

    /// `dd.mm.YYYY HH:MM`, e.g. `15.01.2023 00:00`.
    pub fn modified_display(&self) -> String {
        self.modified.format("%d.%m.%Y %H:%M").to_string()
    }
}

/// Entries in the order the server sent them.
pub type DirectoryListing = Vec<FtpEntry>;

/// Which entries [`FtpSession::count`](crate::ftp::session::FtpSession::count) counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CountMode {
    #[default]
    Files,
    Directories,
    All,
}

impl CountMode {
    pub fn matches(&self, kind: FtpEntryKind) -> bool {
        match self {
            Self::Files => kind == FtpEntryKind::File,
            Self::Directories => kind == FtpEntryKind::Directory,
            Self::All => true,
        }
    }

    /// Plural noun used in error messages.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Directories => "directories",
            Self::All => "entries",
        }
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether this is a positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether this is a positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_json() {
        let config = FtpSessionConfig::from_json(r#"{"host":"ftp.example.com"}"#).unwrap();
        assert_eq!(config.port, 21);
        assert_eq!(config.username, "anonymous");
        assert_eq!(config.transfer_type, TransferType::Binary);
        assert!(config.passive);
        assert_eq!(config.connect_timeout_sec, 90);
    }

    #[test]
    fn test_config_camel_case_fields() {
        let config = FtpSessionConfig::from_json(
            r#"{"host":"h","port":2121,"transferType":"ascii","connectTimeoutSec":120}"#,
        )
        .unwrap();
        assert_eq!(config.port, 2121);
        assert_eq!(config.transfer_type, TransferType::Ascii);
        assert_eq!(config.connect_timeout_sec, 120);
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let err = FtpSessionConfig::from_json(r#"{"host":"h","connectTimeoutSec":0}"#).unwrap_err();
        assert_eq!(err.kind, crate::ftp::error::FtpErrorKind::InvalidConfig);
    }

    #[test]
    fn test_config_rejects_empty_host() {
        assert!(FtpSessionConfig::default().validate().is_err());
        assert!(FtpSessionConfig::for_host("ftp.example.com").validate().is_ok());
    }

    #[test]
    fn test_count_mode_matches() {
        assert!(CountMode::Files.matches(FtpEntryKind::File));
        assert!(!CountMode::Files.matches(FtpEntryKind::Symlink));
        assert!(CountMode::Directories.matches(FtpEntryKind::Directory));
        assert!(CountMode::All.matches(FtpEntryKind::Unknown));
        assert_eq!(CountMode::default(), CountMode::Files);
    }

    #[test]
    fn test_permission_char_classification() {
        assert_eq!(FtpEntryKind::from_permission_char(b'd'), FtpEntryKind::Directory);
        assert_eq!(FtpEntryKind::from_permission_char(b'-'), FtpEntryKind::File);
        assert_eq!(FtpEntryKind::from_permission_char(b'l'), FtpEntryKind::Symlink);
        assert_eq!(FtpEntryKind::from_permission_char(b'c'), FtpEntryKind::Unknown);
    }
}
