//! Download-to-local-cache for files that live behind HTTP rather than on a
//! mounted share.
//!
//! Unrelated to mounting: a [`RemoteFile`] pairs a URL with a local path and
//! refreshes the local copy on demand. The local file is replaced atomically,
//! so readers never see a half-written download.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Request timeout for the default client.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from refreshing a [`RemoteFile`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure, invalid URL, or body read error
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status received
        status: reqwest::StatusCode,
    },

    /// Writing or opening the local copy failed
    #[error("local cache {}: {source}", path.display())]
    Io {
        /// Local path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A remote resource mirrored at a local path.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    url: String,
    local_path: PathBuf,
    client: reqwest::blocking::Client,
}

impl RemoteFile {
    /// Pair `url` with `local_path` using a default client.
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("netvol/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self::with_client(url, local_path, client))
    }

    /// Pair `url` with `local_path` using a caller-configured client.
    pub fn with_client(
        url: impl Into<String>,
        local_path: impl Into<PathBuf>,
        client: reqwest::blocking::Client,
    ) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            client,
        }
    }

    /// Remote URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local cache path.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Download the resource and replace the local copy. Returns the number
    /// of bytes written.
    ///
    /// On any failure the previous local copy, if any, is left untouched.
    pub fn update(&self) -> Result<u64, FetchError> {
        tracing::debug!("Fetching {}", self.url);
        let response = self.client.get(&self.url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }
        let body = response.bytes()?;

        let parent = match self.local_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| FetchError::io(parent, e))?;
        tmp.write_all(&body)
            .and_then(|()| tmp.flush())
            .map_err(|e| FetchError::io(tmp.path(), e))?;
        tmp.persist(&self.local_path)
            .map_err(|e| FetchError::io(&self.local_path, e.error))?;

        tracing::info!(
            "Fetched {} ({} bytes) to {}",
            self.url,
            body.len(),
            self.local_path.display()
        );
        Ok(body.len() as u64)
    }

    /// Refresh the local copy, then open it for reading.
    pub fn open(&self) -> Result<File, FetchError> {
        self.update()?;
        File::open(&self.local_path).map_err(|e| FetchError::io(&self.local_path, e))
    }
}
