//! Plain-TCP transport — control connection plus passive data channels.
//!
//! Every data transfer (LIST, RETR) opens a fresh PASV connection; active
//! mode is not supported.

use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::protocol::{self, FtpCodec};
use crate::ftp::transport::{CrlfTranslator, FtpTransport};
use crate::ftp::types::{FtpResponse, FtpSessionConfig, TransferType};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default chunk size for streaming transfers (64 KiB).
const DEFAULT_CHUNK: usize = 65_536;

lazy_static! {
    static ref PASV_REPLY: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("static PASV pattern");
}

/// FTP over a plain TCP control connection.
pub struct TcpTransport {
    codec: Option<FtpCodec>,
    data_timeout: Duration,
    transfer_type: Option<TransferType>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            codec: None,
            data_timeout: Duration::from_secs(30),
            transfer_type: None,
        }
    }

    /// Transport using the config's data-channel timeout.
    pub fn from_config(config: &FtpSessionConfig) -> Self {
        Self {
            data_timeout: Duration::from_secs(config.data_timeout_sec.max(1)),
            ..Self::new()
        }
    }

    fn codec(&mut self) -> FtpResult<&mut FtpCodec> {
        self.codec
            .as_mut()
            .ok_or_else(|| FtpError::disconnected("Not connected"))
    }

    /// Issue `PASV`, parse the response, connect to the returned address.
    async fn open_pasv(&mut self) -> FtpResult<TcpStream> {
        let data_timeout = self.data_timeout;
        let resp = self.codec()?.expect_ok("PASV").await?;
        let addr = parse_pasv_response(&resp.text())?;
        let tcp = timeout(data_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
            .map_err(|e| FtpError::data_channel(format!("PASV data connect: {}", e)))?;
        Ok(tcp)
    }

    /// Send a transfer command after the data channel is up and check for
    /// the 1xx "opening data connection" reply.
    async fn start_transfer(&mut self, cmd: &str) -> FtpResult<()> {
        let resp = self.codec()?.execute(cmd).await?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    /// Read the 226 completion reply.
    async fn finish_transfer(&mut self) -> FtpResult<()> {
        let done = self.codec()?.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(())
    }

    /// Stream `RETR remote_path` into `file` and wait for the completion reply.
    async fn retrieve(
        &mut self,
        file: &mut fs::File,
        remote_path: &str,
        transfer_type: TransferType,
    ) -> FtpResult<u64> {
        let mut data = self.open_pasv().await?;
        self.start_transfer(&format!("RETR {}", remote_path)).await?;

        let mut translator = match transfer_type {
            TransferType::Ascii => Some(CrlfTranslator::new()),
            TransferType::Binary => None,
        };
        let mut written = 0u64;
        let mut buf = vec![0u8; DEFAULT_CHUNK];
        loop {
            let n = data.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            match translator.as_mut() {
                Some(t) => {
                    let out = t.translate(&buf[..n]);
                    file.write_all(&out).await?;
                    written += out.len() as u64;
                }
                None => {
                    file.write_all(&buf[..n]).await?;
                    written += n as u64;
                }
            }
        }
        if let Some(mut t) = translator {
            let tail = t.finish();
            file.write_all(&tail).await?;
            written += tail.len() as u64;
        }
        file.flush().await?;
        drop(data);

        self.finish_transfer().await?;
        Ok(written)
    }

    async fn set_type(&mut self, tt: TransferType) -> FtpResult<()> {
        if self.transfer_type == Some(tt) {
            return Ok(());
        }
        self.codec()?.expect_ok(tt.command()).await?;
        self.transfer_type = Some(tt);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FtpTransport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16, connect_timeout: Duration) -> FtpResult<()> {
        let addr = format!("{}:{}", host, port);
        let tcp = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
            .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;
        tcp.set_nodelay(true).ok();

        let mut codec = FtpCodec::from_tcp(tcp);
        let banner = codec.read_response().await?;
        if !banner.is_completion() {
            return Err(FtpError::from_reply(banner.code, &banner.text()));
        }
        log::debug!("FTP banner from {}: {}", addr, banner.text());
        self.codec = Some(codec);
        self.transfer_type = None;
        Ok(())
    }

    async fn authenticate(&mut self, user: &str, pass: &str) -> FtpResult<()> {
        let codec = self.codec()?;
        let user_resp = codec.execute(&format!("USER {}", user)).await?;
        if user_resp.code == 331 {
            let pass_resp = codec.execute(&format!("PASS {}", pass)).await?;
            if !pass_resp.is_completion() {
                return Err(FtpError::auth_failed(format!(
                    "Login failed: {}",
                    pass_resp.text()
                ))
                .with_code(pass_resp.code));
            }
        } else if !user_resp.is_completion() {
            return Err(FtpError::auth_failed(format!(
                "USER rejected: {}",
                user_resp.text()
            ))
            .with_code(user_resp.code));
        }
        Ok(())
    }

    async fn send_raw_command(&mut self, command: &str) -> FtpResult<FtpResponse> {
        self.codec()?.execute(command).await
    }

    async fn set_passive_mode(&mut self, enabled: bool) -> FtpResult<()> {
        if !enabled {
            return Err(FtpError::unsupported(
                "Active-mode data connections are not supported",
            ));
        }
        // PASV is negotiated per data connection.
        self.codec()?;
        Ok(())
    }

    async fn get_working_directory(&mut self) -> FtpResult<String> {
        let resp = self.codec()?.expect_ok("PWD").await?;
        protocol::parse_pwd(&resp.text())
    }

    async fn change_to_parent(&mut self) -> FtpResult<()> {
        self.codec()?.expect_ok("CDUP").await?;
        Ok(())
    }

    async fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        self.codec()?.expect_ok(&format!("CWD {}", path)).await?;
        Ok(())
    }

    async fn list_raw(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let mut data = self.open_pasv().await?;
        let cmd = if path.is_empty() {
            "LIST".to_string()
        } else {
            format!("LIST {}", path)
        };
        self.start_transfer(&cmd).await?;

        let mut buf = Vec::new();
        data.read_to_end(&mut buf).await?;
        drop(data);
        self.finish_transfer().await?;

        let text = String::from_utf8(buf)
            .map_err(|e| FtpError::protocol_error(format!("Listing not UTF-8: {}", e)))?;
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn get_size(&mut self, path: &str) -> FtpResult<i64> {
        let resp = self.codec()?.execute(&format!("SIZE {}", path)).await?;
        if resp.code != 213 {
            log::debug!("SIZE {} unavailable: {}", path, resp.text());
            return Ok(-1);
        }
        // "213 12345"
        let text = resp.text();
        text.split_whitespace()
            .nth(1)
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse SIZE: {}", text)))
    }

    async fn download(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        transfer_type: TransferType,
    ) -> FtpResult<u64> {
        self.set_type(transfer_type).await?;

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(local_path).await?;
        let result = self.retrieve(&mut file, remote_path, transfer_type).await;
        drop(file);

        // A failed transfer must not leave a partial file behind.
        if result.is_err() {
            if let Err(e) = fs::remove_file(local_path).await {
                log::warn!(
                    "Could not remove partial download {}: {}",
                    local_path.display(),
                    e
                );
            }
        }
        result
    }

    async fn close(&mut self) -> FtpResult<()> {
        let mut codec = self
            .codec
            .take()
            .ok_or_else(|| FtpError::disconnected("Not connected"))?;
        match codec.execute("QUIT").await {
            Ok(_) => Ok(()),
            // The server hanging up first still releases the connection.
            Err(e) if e.kind == FtpErrorKind::Disconnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_REPLY
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}
