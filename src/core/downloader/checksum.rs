use std::path::Path;

use futures_util::StreamExt;
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const CHUNK_SIZE: usize = 8192;

/// SHA-1 of a local file, read in fixed-size chunks. `None` if the file is absent.
pub async fn file_sha1(path: &Path) -> LauncherResult<Option<String>> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LauncherError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await.map_err(LauncherError::io(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Some(hex::encode(hasher.finalize())))
}

/// SHA-1 of a remote resource, hashed as the body streams in.
pub async fn remote_sha1(client: &reqwest::Client, url: &str) -> LauncherResult<String> {
    let response = client
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

    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(LauncherError::network(url))?;
        hasher.update(&chunk);
    }

    let digest = hex::encode(hasher.finalize());
    debug!("Remote SHA-1 of {}: {}", url, digest);
    Ok(digest)
}

pub fn sha1_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
