//! Transport abstraction — the wire-level FTP primitives a session drives.
//!
//! A transport value *is* the connection handle: it is created
//! disconnected, `connect()`ed once, and exclusively owned by one
//! [`FtpSession`](crate::ftp::session::FtpSession). Every primitive returns an
//! explicit `FtpResult`; no failure is swallowed at this layer.
//!
//! Two implementations ship with the crate:
//! - [`TcpTransport`](crate::ftp::connection::TcpTransport) — plain TCP with
//!   passive data connections
//! - [`MemoryTransport`](crate::ftp::memory::MemoryTransport) — in-memory
//!   remote tree for tests and offline use

use crate::ftp::error::FtpResult;
use crate::ftp::types::{FtpResponse, TransferType};
use std::path::Path;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait FtpTransport: Send {
    /// Open the control connection and consume the server greeting.
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> FtpResult<()>;

    /// USER / PASS.
    async fn authenticate(&mut self, user: &str, pass: &str) -> FtpResult<()>;

    /// Send an arbitrary command and return the server's reply verbatim,
    /// whatever its code.
    async fn send_raw_command(&mut self, command: &str) -> FtpResult<FtpResponse>;

    async fn set_passive_mode(&mut self, enabled: bool) -> FtpResult<()>;

    /// PWD.
    async fn get_working_directory(&mut self) -> FtpResult<String>;

    /// CDUP.
    async fn change_to_parent(&mut self) -> FtpResult<()>;

    /// CWD.
    async fn change_directory(&mut self, path: &str) -> FtpResult<()>;

    /// LIST, one unparsed line per element.
    async fn list_raw(&mut self, path: &str) -> FtpResult<Vec<String>>;

    /// SIZE. A negative value means the server could not report a size.
    async fn get_size(&mut self, path: &str) -> FtpResult<i64>;

    /// RETR `remote_path` into `local_path`, returning the bytes written.
    async fn download(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        transfer_type: TransferType,
    ) -> FtpResult<u64>;

    /// QUIT and release the connection.
    async fn close(&mut self) -> FtpResult<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ASCII line-ending translation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streaming CRLF → LF translator for `TYPE A` downloads.
///
/// A trailing `\r` is held back until the next chunk shows whether it
/// starts a CRLF pair.
#[derive(Debug, Default)]
pub struct CrlfTranslator {
    pending_cr: bool,
}

impl CrlfTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 1);
        for &b in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if b != b'\n' {
                    out.push(b'\r');
                }
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
        out
    }

    /// Flush a held-back `\r` at end of stream.
    pub fn finish(&mut self) -> Vec<u8> {
        if std::mem::take(&mut self.pending_cr) {
            vec![b'\r']
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_translation() {
        let mut t = CrlfTranslator::new();
        assert_eq!(t.translate(b"a\r\nb\r\n"), b"a\nb\n");
        assert!(t.finish().is_empty());
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut t = CrlfTranslator::new();
        let mut out = t.translate(b"line1\r");
        out.extend(t.translate(b"\nline2"));
        out.extend(t.finish());
        assert_eq!(out, b"line1\nline2");
    }

    #[test]
    fn test_lone_cr_preserved() {
        let mut t = CrlfTranslator::new();
        let mut out = t.translate(b"a\rb\r");
        out.extend(t.finish());
        assert_eq!(out, b"a\rb\r");
    }
}
