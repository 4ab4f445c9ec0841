//! Directory aggregates — entry counts and total file size.

use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::session::FtpSession;
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::*;

impl<T: FtpTransport> FtpSession<T> {
    /// Number of entries in `path` matching `mode`.
    pub async fn count(&mut self, path: &str, mode: CountMode) -> FtpResult<usize> {
        self.require_authenticated("count directory entries")?;
        match self.list_directory(path).await {
            Ok(entries) => Ok(count_entries(&entries, mode)),
            Err(e) => Err(self
                .annotate(
                    FtpErrorKind::CountFailed,
                    format!("Failed to count {} in directory: {}", mode.noun(), path),
                    e,
                )
                .await),
        }
    }

    /// Sum of the sizes of the plain files in `path`. Directories, symlinks
    /// and unknown entries are not counted.
    pub async fn total_size(&mut self, path: &str) -> FtpResult<u64> {
        self.require_authenticated("sum directory file sizes")?;
        let result = self.list_directory(path).await.and_then(|entries| {
            total_file_size(&entries).ok_or_else(|| {
                FtpError::protocol_error(format!("Total file size in {} exceeds u64", path))
            })
        });
        match result {
            Ok(total) => Ok(total),
            Err(e) => Err(self
                .annotate(
                    FtpErrorKind::SizeAggregationFailed,
                    format!("Failed to compute total file size in directory: {}", path),
                    e,
                )
                .await),
        }
    }
}

pub fn count_entries(entries: &[FtpEntry], mode: CountMode) -> usize {
    entries.iter().filter(|e| mode.matches(e.kind)).count()
}

/// `None` when the sum does not fit in a `u64`.
pub fn total_file_size(entries: &[FtpEntry]) -> Option<u64> {
    entries
        .iter()
        .filter(|e| e.is_file())
        .try_fold(0u64, |acc, e| acc.checked_add(e.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::memory::{MemoryTransport, TransportOp};
    use chrono::NaiveDate;

    fn tree() -> MemoryTransport {
        MemoryTransport::new()
            .with_dir(
                "/mixed",
                vec![
                    "total 20",
                    "-rw-r--r-- 1 ftp ftp 100 Jan 10 2023 a.txt",
                    "-rw-r--r-- 1 ftp ftp 250 Feb 11 2023 b.txt",
                    "drwxr-xr-x 2 ftp ftp 4096 Mar 12 2023 sub",
                    "lrwxrwxrwx 1 ftp ftp 7 Apr 13 2023 link -> a.txt",
                ],
            )
            .with_dir(
                "/dirs-only",
                vec![
                    "drwxr-xr-x 2 ftp ftp 4096 Mar 12 2023 one",
                    "drwxr-xr-x 2 ftp ftp 4096 Mar 12 2023 two",
                ],
            )
            .with_dir("/empty", Vec::<String>::new())
            .with_dir(
                "/huge",
                vec![
                    "-rw-r--r-- 1 ftp ftp 18446744073709551615 Jan 10 2023 max.bin",
                    "-rw-r--r-- 1 ftp ftp 1 Jan 10 2023 one.bin",
                ],
            )
    }

    async fn authed(transport: MemoryTransport) -> FtpSession<MemoryTransport> {
        let mut s = FtpSession::new(FtpSessionConfig::for_host("h"), transport).with_clock(|| {
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        });
        s.open("h", None, 10).await.unwrap();
        s.login("anonymous", "anonymous@").await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_count_modes() {
        let mut s = authed(tree()).await;
        assert_eq!(s.count("/mixed", CountMode::Files).await.unwrap(), 2);
        assert_eq!(s.count("/mixed", CountMode::Directories).await.unwrap(), 1);
        assert_eq!(s.count("/mixed", CountMode::All).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_count_all_matches_listing_length() {
        let mut s = authed(tree()).await;
        for path in ["/mixed", "/dirs-only", "/empty"] {
            let listed = s.list_directory(path).await.unwrap().len();
            assert_eq!(s.count(path, CountMode::All).await.unwrap(), listed);
        }
        assert_eq!(s.count("/empty", CountMode::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_total_size_only_files() {
        let mut s = authed(tree()).await;
        assert_eq!(s.total_size("/mixed").await.unwrap(), 350);
        assert_eq!(s.total_size("/dirs-only").await.unwrap(), 0);
        assert_eq!(s.total_size("/empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_total_size_overflow_is_error() {
        let mut s = authed(tree()).await;
        let err = s.total_size("/huge").await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::SizeAggregationFailed);
        assert_eq!(err.current_dir.as_deref(), Some("/"));
        assert_eq!(err.cause.as_ref().unwrap().kind, FtpErrorKind::ProtocolError);
        assert_eq!(s.count("/huge", CountMode::Files).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_failure() {
        let mut s = authed(tree()).await;
        s.change_directory("/mixed").await.unwrap();
        let err = s.count("/missing", CountMode::Directories).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::CountFailed);
        assert!(err.message.contains("directories"));
        assert_eq!(err.current_dir.as_deref(), Some("/mixed"));
        assert_eq!(err.cause.as_ref().unwrap().kind, FtpErrorKind::ListingFailed);
    }

    #[tokio::test]
    async fn test_total_size_failure_without_context() {
        let mut s = authed(tree()).await;
        s.transport_mut().fail(TransportOp::ListRaw);
        s.transport_mut().fail(TransportOp::WorkingDirectory);
        let err = s.total_size("/mixed").await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::SizeAggregationFailed);
        assert!(err.current_dir.is_none());
    }

    #[tokio::test]
    async fn test_aggregates_require_login() {
        let mut s = FtpSession::new(FtpSessionConfig::for_host("h"), tree());
        let err = s.count("/mixed", CountMode::All).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::InvalidState);
        assert!(s.transport().calls().is_empty());
    }
}
