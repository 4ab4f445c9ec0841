//! Stateful FTP session — owns one transport and decorates its failures.
//!
//! Lifecycle: `Disconnected` → `open()` → `Connected` → `login()` →
//! `Authenticated` → `close()` → `Closed`.
//!
//! Navigation, listing and transfer operations require `Authenticated` and
//! fail fast with `InvalidState` otherwise; after `close()` every operation
//! fails with `SessionClosed`. Neither case reaches the transport.
//!
//! When a wrapped primitive fails, the session issues exactly one follow-up
//! PWD to annotate the error with the remote working directory. If that
//! follow-up fails too, the annotation is dropped and the original error is
//! returned unchanged.

use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::parser;
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::*;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Source of the reference instant used to infer years in listings.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// One FTP connection plus its session state.
pub struct FtpSession<T: FtpTransport> {
    id: String,
    config: FtpSessionConfig,
    transport: T,
    state: SessionState,
    clock: Clock,
    username: Option<String>,
    passive: bool,
    connected_at: Option<DateTime<Utc>>,
    last_activity: DateTime<Utc>,
    bytes_downloaded: u64,
}

impl<T: FtpTransport> FtpSession<T> {
    /// Create a disconnected session. The config's transfer type is fixed
    /// for the lifetime of the session.
    pub fn new(config: FtpSessionConfig, transport: T) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            transport,
            state: SessionState::Disconnected,
            clock: Arc::new(|| Local::now().naive_local()),
            username: None,
            passive: false,
            connected_at: None,
            last_activity: Utc::now(),
            bytes_downloaded: 0,
        }
    }

    /// Replace the wall clock used for listing year inference.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate `config`, then open, log in, and apply the passive setting.
    pub async fn connect(config: FtpSessionConfig, transport: T) -> FtpResult<Self> {
        config.validate()?;
        let mut session = Self::new(config, transport);
        let (host, port, timeout) = (
            session.config.host.clone(),
            session.config.port,
            session.config.connect_timeout_sec,
        );
        session.open(&host, Some(port), timeout).await?;
        let (user, pass) = (session.config.username.clone(), session.config.password.clone());
        session.login(&user, &pass).await?;
        if session.config.passive {
            session.set_passive(true).await?;
        }
        Ok(session)
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &FtpSessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Snapshot of the session for display.
    pub fn info(&self) -> FtpSessionInfo {
        FtpSessionInfo {
            id: self.id.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            username: self.username.clone(),
            state: self.state,
            transfer_type: self.config.transfer_type,
            passive: self.passive,
            connected_at: self.connected_at,
            last_activity: self.last_activity,
            bytes_downloaded: self.bytes_downloaded,
            label: self.config.label.clone(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Establish the control connection. `port` defaults to 21.
    pub async fn open(&mut self, host: &str, port: Option<u16>, timeout_secs: u64) -> FtpResult<()> {
        self.require("open", &[SessionState::Disconnected])?;
        if timeout_secs == 0 {
            return Err(FtpError::invalid_config(
                "Connect timeout must be greater than zero",
            ));
        }
        let port = port.unwrap_or(DEFAULT_FTP_PORT);
        info!("[{}] FTP connecting to {}:{}", self.id, host, port);

        self.transport
            .connect(host, port, Duration::from_secs(timeout_secs))
            .await
            .map_err(|e| {
                FtpError::connection_failed(format!(
                    "Failed to connect to server: {}:{}",
                    host, port
                ))
                .with_cause(e)
            })?;

        self.config.host = host.to_string();
        self.config.port = port;
        self.state = SessionState::Connected;
        self.connected_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Authenticate, then switch listings to UTF-8. Both steps must
    /// succeed; on failure the session stays `Connected`.
    pub async fn login(&mut self, user: &str, pass: &str) -> FtpResult<()> {
        self.require("log in", &[SessionState::Connected])?;

        self.transport.authenticate(user, pass).await.map_err(|e| {
            FtpError::new(
                FtpErrorKind::AuthFailed,
                format!("Failed to log in to server: {}", self.config.host),
            )
            .with_cause(e)
        })?;

        let encoding_failed = |cause: FtpError| {
            FtpError::new(
                FtpErrorKind::EncodingNegotiationFailed,
                "Failed to switch encoding to UTF-8",
            )
            .with_cause(cause)
        };
        let resp = self
            .transport
            .send_raw_command("OPTS UTF8 ON")
            .await
            .map_err(encoding_failed)?;
        if !resp.is_completion() {
            return Err(encoding_failed(FtpError::from_reply(resp.code, &resp.text())));
        }

        info!("[{}] FTP logged in as {}", self.id, user);
        self.username = Some(user.to_string());
        self.state = SessionState::Authenticated;
        self.touch();
        Ok(())
    }

    /// Release the connection. The session is `Closed` afterwards even if
    /// the transport reported a failure.
    pub async fn close(&mut self) -> FtpResult<()> {
        self.require("close", &[SessionState::Connected, SessionState::Authenticated])?;
        let result = self.transport.close().await;
        self.state = SessionState::Closed;
        self.touch();
        match result {
            Ok(()) => {
                info!("[{}] FTP session closed", self.id);
                Ok(())
            }
            Err(e) => Err(FtpError::new(
                FtpErrorKind::CloseFailed,
                format!("Failed to close connection to server: {}", self.config.host),
            )
            .with_cause(e)),
        }
    }

    // ─── Modes ───────────────────────────────────────────────────

    pub async fn set_passive(&mut self, enabled: bool) -> FtpResult<()> {
        self.require_authenticated("set passive mode")?;
        self.transport.set_passive_mode(enabled).await.map_err(|e| {
            FtpError::new(
                FtpErrorKind::PassiveModeFailed,
                format!("Failed to {} passive mode", if enabled { "enable" } else { "disable" }),
            )
            .with_cause(e)
        })?;
        debug!("[{}] passive mode = {}", self.id, enabled);
        self.passive = enabled;
        self.touch();
        Ok(())
    }

    // ─── PWD / CWD / CDUP ───────────────────────────────────────

    /// Remote working directory. Never annotated: the annotation would need
    /// this very primitive.
    pub async fn current_directory(&mut self) -> FtpResult<String> {
        self.require_authenticated("query the current directory")?;
        let dir = self.transport.get_working_directory().await.map_err(|e| {
            FtpError::new(
                FtpErrorKind::DirectoryQueryFailed,
                "Failed to get the current directory name",
            )
            .with_cause(e)
        })?;
        self.touch();
        Ok(dir)
    }

    pub async fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        self.require_authenticated("change directory")?;
        if let Err(e) = self.transport.change_directory(path).await {
            return Err(self
                .annotate(
                    FtpErrorKind::ChangeDirFailed,
                    format!("Failed to change directory to: {}", path),
                    e,
                )
                .await);
        }
        debug!("[{}] CWD {}", self.id, path);
        self.touch();
        Ok(())
    }

    pub async fn to_parent_directory(&mut self) -> FtpResult<()> {
        self.require_authenticated("change to the parent directory")?;
        if let Err(e) = self.transport.change_to_parent().await {
            return Err(self
                .annotate(
                    FtpErrorKind::ParentDirFailed,
                    "Failed to change to the parent directory".to_string(),
                    e,
                )
                .await);
        }
        debug!("[{}] CDUP", self.id);
        self.touch();
        Ok(())
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// Parsed contents of `path`, in server order. An empty raw listing is
    /// an empty result, not an error.
    pub async fn list_directory(&mut self, path: &str) -> FtpResult<DirectoryListing> {
        self.require_authenticated("list a directory")?;
        let lines = match self.transport.list_raw(path).await {
            Ok(lines) => lines,
            Err(e) => return Err(self.listing_failed(path, e).await),
        };
        self.touch();
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let now = (self.clock)();
        match parser::parse_listing(&lines, now) {
            Ok(entries) => {
                debug!("[{}] LIST {} → {} entries", self.id, path, entries.len());
                Ok(entries)
            }
            Err(e) => Err(self.listing_failed(path, e).await),
        }
    }

    async fn listing_failed(&mut self, path: &str, cause: FtpError) -> FtpError {
        self.annotate(
            FtpErrorKind::ListingFailed,
            format!("Failed to list directory: {}", path),
            cause,
        )
        .await
    }

    // ─── SIZE ────────────────────────────────────────────────────

    /// Size of a remote file in bytes. A server that cannot report a size
    /// is a failure, never zero.
    pub async fn file_size(&mut self, remote_path: &str) -> FtpResult<u64> {
        self.require_authenticated("query a file size")?;
        let message = || format!("Failed to determine the size of file: {}", remote_path);
        match self.transport.get_size(remote_path).await {
            Ok(size) if size >= 0 => {
                self.touch();
                Ok(size as u64)
            }
            Ok(size) => {
                let cause = FtpError::protocol_error(format!("Server reported size {}", size));
                Err(self.annotate(FtpErrorKind::SizeQueryFailed, message(), cause).await)
            }
            Err(e) => Err(self.annotate(FtpErrorKind::SizeQueryFailed, message(), e).await),
        }
    }

    // ─── RETR ────────────────────────────────────────────────────

    /// Download `remote_path` to `local_path` in the session's transfer type.
    ///
    /// With `overwrite == false` an existing local file is left untouched
    /// and the server is not contacted.
    pub async fn get_file(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
        overwrite: bool,
    ) -> FtpResult<()> {
        self.require_authenticated("download a file")?;
        let local_path = local_path.as_ref();
        if !overwrite && self.local_exists(local_path, remote_path).await? {
            debug!(
                "[{}] skip download of {}: {} exists",
                self.id,
                remote_path,
                local_path.display()
            );
            return Ok(());
        }

        match self
            .transport
            .download(local_path, remote_path, self.config.transfer_type)
            .await
        {
            Ok(bytes) => {
                info!(
                    "[{}] downloaded {} → {} ({} bytes)",
                    self.id,
                    remote_path,
                    local_path.display(),
                    bytes
                );
                self.bytes_downloaded += bytes;
                self.touch();
                Ok(())
            }
            Err(e) => Err(self
                .annotate(
                    FtpErrorKind::DownloadFailed,
                    format!("Failed to download file: {}", remote_path),
                    e,
                )
                .await),
        }
    }

    // ─── Guards & context ────────────────────────────────────────

    fn require(&self, op: &str, allowed: &[SessionState]) -> FtpResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        if self.state == SessionState::Closed {
            return Err(FtpError::session_closed(op));
        }
        Err(FtpError::invalid_state(format!(
            "Cannot {} while the session is {:?}",
            op, self.state
        )))
    }

    pub(crate) fn require_authenticated(&self, op: &str) -> FtpResult<()> {
        self.require(op, &[SessionState::Authenticated])
    }

    /// One best-effort PWD. Its failure is logged and swallowed.
    pub(crate) async fn context_directory(&mut self) -> Option<String> {
        match self.transport.get_working_directory().await {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(
                    "[{}] could not fetch the current directory for error context: {}",
                    self.id, e
                );
                None
            }
        }
    }

    /// Build a session error of `kind` around `cause`, annotated with the
    /// current directory when it can be obtained.
    pub(crate) async fn annotate(
        &mut self,
        kind: FtpErrorKind,
        message: String,
        cause: FtpError,
    ) -> FtpError {
        let dir = self.context_directory().await;
        let err = FtpError::new(kind, message)
            .with_cause(cause)
            .with_current_dir(dir);
        debug!("[{}] {}", self.id, err);
        err
    }

    async fn local_exists(&mut self, local_path: &Path, remote_path: &str) -> FtpResult<bool> {
        match tokio::fs::try_exists(local_path).await {
            Ok(exists) => Ok(exists),
            Err(e) => Err(self
                .annotate(
                    FtpErrorKind::DownloadFailed,
                    format!(
                        "Failed to check local target {} for {}",
                        local_path.display(),
                        remote_path
                    ),
                    e.into(),
                )
                .await),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
