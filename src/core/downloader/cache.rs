use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::checksum::{file_sha1, sha1_eq};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::{self, ProgressSender};
use crate::core::version::ResolvedArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The local file already matched the expected checksum.
    UpToDate,
    Downloaded,
}

/// Keeps one verified copy of each server artifact on disk.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    client: reqwest::Client,
    progress: Option<ProgressSender>,
}

impl ArtifactCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Make sure `dest` holds the artifact. A mismatching download is left in
    /// place and reported as `Sha1Mismatch`.
    pub async fn ensure(
        &self,
        artifact: &ResolvedArtifact,
        dest: &Path,
    ) -> LauncherResult<EnsureOutcome> {
        if let Some(local) = file_sha1(dest).await? {
            if sha1_eq(&local, &artifact.sha1) {
                debug!("Artifact up to date: {:?}", dest);
                return Ok(EnsureOutcome::UpToDate);
            }
            warn!(
                "Checksum mismatch for {:?} (have {}, want {}), re-downloading",
                dest, local, artifact.sha1
            );
        }

        let actual = self.download(&artifact.url, dest).await?;
        if !sha1_eq(&actual, &artifact.sha1) {
            return Err(LauncherError::Sha1Mismatch {
                path: dest.to_path_buf(),
                expected: artifact.sha1.clone(),
                actual,
            });
        }

        info!("Downloaded {} -> {:?}", artifact.url, dest);
        Ok(EnsureOutcome::Downloaded)
    }

    /// Stream `url` into `<dest>.part`, then rename over `dest`. Returns the
    /// SHA-1 of the bytes written.
    async fn download(&self, url: &str, dest: &Path) -> LauncherResult<String> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LauncherError::io(parent))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(LauncherError::network(url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let part = part_path(dest);

        let digest = match self.write_part(response, url, &part, &label, total).await {
            Ok(digest) => digest,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(LauncherError::io(dest))?;

        Ok(digest)
    }

    async fn write_part(
        &self,
        response: reqwest::Response,
        url: &str,
        part: &Path,
        label: &str,
        total: u64,
    ) -> LauncherResult<String> {
        let mut hasher = Sha1::new();
        let mut written: u64 = 0;
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(LauncherError::io(part))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(LauncherError::network(url))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(LauncherError::io(part))?;
            written += chunk.len() as u64;
            progress::emit(self.progress.as_ref(), written, total.max(written), label);
        }
        file.flush().await.map_err(LauncherError::io(part))?;

        Ok(hex::encode(hasher.finalize()))
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;
    use tempfile::TempDir;

    // sha1("hello world")
    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    fn artifact(url: String, sha1: &str) -> ResolvedArtifact {
        ResolvedArtifact {
            minecraft_version: "1.21".into(),
            loader: LoaderType::Vanilla,
            url,
            sha1: sha1.into(),
            java_major: 21,
        }
    }

    #[tokio::test]
    async fn downloads_then_reuses_matching_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/server.jar")
            .with_status(200)
            .with_body("hello world")
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cache").join("server-1.21-vanilla.jar");
        let cache = ArtifactCache::new(reqwest::Client::new());
        let art = artifact(format!("{}/server.jar", server.url()), HELLO_SHA1);

        assert_eq!(cache.ensure(&art, &dest).await.unwrap(), EnsureOutcome::Downloaded);
        assert_eq!(cache.ensure(&art, &dest).await.unwrap(), EnsureOutcome::UpToDate);

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn uppercase_expected_checksum_still_matches() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/server.jar")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        let art = artifact(
            format!("{}/server.jar", server.url()),
            &HELLO_SHA1.to_uppercase(),
        );
        let outcome = ArtifactCache::new(reqwest::Client::new())
            .ensure(&art, &dest)
            .await
            .unwrap();
        assert_eq!(outcome, EnsureOutcome::Downloaded);
    }

    #[tokio::test]
    async fn corrupted_local_file_is_replaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/server.jar")
            .with_status(200)
            .with_body("hello world")
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        std::fs::write(&dest, b"truncated").unwrap();

        let art = artifact(format!("{}/server.jar", server.url()), HELLO_SHA1);
        let outcome = ArtifactCache::new(reqwest::Client::new())
            .ensure(&art, &dest)
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::Downloaded);
        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn mismatching_download_is_integrity_error_and_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/server.jar")
            .with_status(200)
            .with_body("tampered")
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        let art = artifact(format!("{}/server.jar", server.url()), HELLO_SHA1);

        let err = ArtifactCache::new(reqwest::Client::new())
            .ensure(&art, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Sha1Mismatch { ref expected, .. } if expected == HELLO_SHA1));
        assert_eq!(std::fs::read(&dest).unwrap(), b"tampered");
    }

    #[tokio::test]
    async fn truncated_body_leaves_no_part_file() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        let art = artifact(format!("http://{addr}/server.jar"), HELLO_SHA1);

        let err = ArtifactCache::new(reqwest::Client::new())
            .ensure(&art, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Network { .. }));
        assert!(!part_path(&dest).exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_error_is_download_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/server.jar")
            .with_status(503)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        let art = artifact(format!("{}/server.jar", server.url()), HELLO_SHA1);

        let err = ArtifactCache::new(reqwest::Client::new())
            .ensure(&art, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed { status: 503, .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn emits_progress_per_chunk() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/server.jar")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("server.jar");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cache = ArtifactCache::new(reqwest::Client::new()).with_progress(tx);
        let art = artifact(format!("{}/server.jar", server.url()), HELLO_SHA1);
        cache.ensure(&art, &dest).await.unwrap();
        drop(cache);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.current, 11);
        assert_eq!(last.label, "server.jar");
    }
}
