//! In-memory transport.
//!
//! Serves a fixed remote tree (directories holding raw LIST lines, files
//! holding bytes) and records every primitive it is asked to perform.
//! Individual primitives can be made to fail on demand, which is how the
//! session's error paths are exercised without a server.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::transport::{CrlfTranslator, FtpTransport};
use crate::ftp::types::{FtpResponse, TransferType};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Transport primitive, as recorded by [`MemoryTransport::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Connect,
    Authenticate,
    RawCommand,
    SetPassive,
    WorkingDirectory,
    ChangeToParent,
    ChangeDirectory,
    ListRaw,
    GetSize,
    Download,
    Close,
}

/// A fully in-memory FTP server useful for unit tests and demos.
#[derive(Debug)]
pub struct MemoryTransport {
    cwd: String,
    dirs: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<u8>>,
    credentials: Option<(String, String)>,
    failing: HashSet<TransportOp>,
    reject_utf8: bool,
    calls: Vec<TransportOp>,
    raw_commands: Vec<String>,
    connected: bool,
    passive: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// An empty tree containing only `/`.
    pub fn new() -> Self {
        let mut dirs = HashMap::new();
        dirs.insert("/".to_string(), Vec::new());
        Self {
            cwd: "/".into(),
            dirs,
            files: HashMap::new(),
            credentials: None,
            failing: HashSet::new(),
            reject_utf8: false,
            calls: Vec::new(),
            raw_commands: Vec::new(),
            connected: false,
            passive: false,
        }
    }

    /// Register a directory and the raw LIST lines it returns.
    pub fn with_dir<S: Into<String>>(mut self, path: &str, lines: impl IntoIterator<Item = S>) -> Self {
        let path = normalize(path, "/");
        self.dirs
            .insert(path, lines.into_iter().map(Into::into).collect());
        self
    }

    /// Register a downloadable file.
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(normalize(path, "/"), contents.into());
        self
    }

    /// Only accept this user/password pair.
    pub fn with_credentials(mut self, user: &str, pass: &str) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    /// Reply 502 to `OPTS UTF8 ON`.
    pub fn rejecting_utf8(mut self) -> Self {
        self.reject_utf8 = true;
        self
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail(&mut self, op: TransportOp) {
        self.failing.insert(op);
    }

    /// Builder form of [`fail`](Self::fail).
    pub fn failing(mut self, op: TransportOp) -> Self {
        self.fail(op);
        self
    }

    pub fn recover(&mut self, op: TransportOp) {
        self.failing.remove(&op);
    }

    pub fn calls(&self) -> &[TransportOp] {
        &self.calls
    }

    pub fn call_count(&self, op: TransportOp) -> usize {
        self.calls.iter().filter(|c| **c == op).count()
    }

    pub fn raw_commands(&self) -> &[String] {
        &self.raw_commands
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    fn enter(&mut self, op: TransportOp) -> FtpResult<()> {
        self.calls.push(op);
        if self.failing.contains(&op) {
            return Err(FtpError::from_reply(
                550,
                &format!("Simulated {:?} failure", op),
            ));
        }
        if op != TransportOp::Connect && !self.connected {
            return Err(FtpError::disconnected("Not connected"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FtpTransport for MemoryTransport {
    async fn connect(&mut self, host: &str, _port: u16, _timeout: Duration) -> FtpResult<()> {
        if let Err(e) = self.enter(TransportOp::Connect) {
            return Err(FtpError::connection_failed(format!("Cannot reach {}", host)).with_cause(e));
        }
        self.connected = true;
        Ok(())
    }

    async fn authenticate(&mut self, user: &str, pass: &str) -> FtpResult<()> {
        self.enter(TransportOp::Authenticate)?;
        match self.credentials {
            Some((ref u, ref p)) if u != user || p != pass => {
                Err(FtpError::from_reply(530, "Login incorrect."))
            }
            _ => Ok(()),
        }
    }

    async fn send_raw_command(&mut self, command: &str) -> FtpResult<FtpResponse> {
        self.enter(TransportOp::RawCommand)?;
        self.raw_commands.push(command.to_string());
        let (code, text) = if self.reject_utf8 && command.eq_ignore_ascii_case("OPTS UTF8 ON") {
            (502, "502 Command not implemented.")
        } else {
            (200, "200 Command okay.")
        };
        Ok(FtpResponse {
            code,
            lines: vec![text.to_string()],
        })
    }

    async fn set_passive_mode(&mut self, enabled: bool) -> FtpResult<()> {
        self.enter(TransportOp::SetPassive)?;
        self.passive = enabled;
        Ok(())
    }

    async fn get_working_directory(&mut self) -> FtpResult<String> {
        self.enter(TransportOp::WorkingDirectory)?;
        Ok(self.cwd.clone())
    }

    async fn change_to_parent(&mut self) -> FtpResult<()> {
        self.enter(TransportOp::ChangeToParent)?;
        self.cwd = normalize("..", &self.cwd);
        Ok(())
    }

    async fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        self.enter(TransportOp::ChangeDirectory)?;
        let target = normalize(path, &self.cwd);
        if !self.dirs.contains_key(&target) {
            return Err(FtpError::from_reply(550, &format!("{}: No such directory", path)));
        }
        self.cwd = target;
        Ok(())
    }

    async fn list_raw(&mut self, path: &str) -> FtpResult<Vec<String>> {
        self.enter(TransportOp::ListRaw)?;
        let target = normalize(path, &self.cwd);
        self.dirs
            .get(&target)
            .cloned()
            .ok_or_else(|| FtpError::from_reply(550, &format!("{}: No such directory", path)))
    }

    async fn get_size(&mut self, path: &str) -> FtpResult<i64> {
        self.enter(TransportOp::GetSize)?;
        let target = normalize(path, &self.cwd);
        Ok(self
            .files
            .get(&target)
            .map(|data| data.len() as i64)
            .unwrap_or(-1))
    }

    async fn download(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        transfer_type: TransferType,
    ) -> FtpResult<u64> {
        self.enter(TransportOp::Download)?;
        let target = normalize(remote_path, &self.cwd);
        let data = self
            .files
            .get(&target)
            .ok_or_else(|| FtpError::from_reply(550, &format!("{}: No such file", remote_path)))?;
        let bytes = match transfer_type {
            TransferType::Binary => data.clone(),
            TransferType::Ascii => {
                let mut t = CrlfTranslator::new();
                let mut out = t.translate(data);
                out.extend(t.finish());
                out
            }
        };
        tokio::fs::write(local_path, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn close(&mut self) -> FtpResult<()> {
        self.enter(TransportOp::Close)?;
        self.connected = false;
        Ok(())
    }
}

/// Resolve `path` against `cwd`, collapsing `.` and `..` segments.
fn normalize(path: &str, cwd: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("pub", "/"), "/pub");
        assert_eq!(normalize("..", "/pub/docs"), "/pub");
        assert_eq!(normalize("..", "/"), "/");
        assert_eq!(normalize("/a/./b/", "/x"), "/a/b");
        assert_eq!(normalize("", "/pub"), "/pub");
    }

    #[tokio::test]
    async fn test_navigation() {
        let mut t = MemoryTransport::new().with_dir("/pub", Vec::<String>::new());
        t.connect("localhost", 21, Duration::from_secs(1)).await.unwrap();
        t.change_directory("pub").await.unwrap();
        assert_eq!(t.get_working_directory().await.unwrap(), "/pub");
        t.change_to_parent().await.unwrap();
        assert_eq!(t.get_working_directory().await.unwrap(), "/");
        assert!(t.change_directory("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let mut t = MemoryTransport::new();
        assert!(t.get_working_directory().await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut t = MemoryTransport::new().failing(TransportOp::WorkingDirectory);
        t.connect("localhost", 21, Duration::from_secs(1)).await.unwrap();
        assert!(t.get_working_directory().await.is_err());
        t.recover(TransportOp::WorkingDirectory);
        assert!(t.get_working_directory().await.is_ok());
        assert_eq!(t.call_count(TransportOp::WorkingDirectory), 2);
    }
}
