// Retrieval of the metadata archive, over HTTP or from a local zip.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_ARCHIVE_URL: &str =
    "https://github.com/Nyss777/Neuro-Karaoke-Archive-Metadata/raw/main/zipped_metadata.zip";

const USER_AGENT: &str = concat!("local-sync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Http Error: {0}")]
    Status(u16),
    #[error("Error Connecting: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    Url(String),
    File(PathBuf),
}

impl ArchiveSource {
    /// `None` is the default URL; anything starting with a scheme is a URL,
    /// the rest a local path
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None => ArchiveSource::Url(DEFAULT_ARCHIVE_URL.to_string()),
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
                ArchiveSource::Url(s.to_string())
            }
            Some(s) => ArchiveSource::File(PathBuf::from(s)),
        }
    }
}

impl Default for ArchiveSource {
    fn default() -> Self {
        Self::from_arg(None)
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveSource::Url(url) => write!(f, "{}", url),
            ArchiveSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Archive bytes. Anything but a 200 response is an error.
    pub fn fetch(&self, source: &ArchiveSource) -> Result<Vec<u8>, FetchError> {
        info!("Fetching metadata archive from {}", source);
        let bytes = match source {
            ArchiveSource::File(path) => fs::read(path).map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?,
            ArchiveSource::Url(url) => {
                let response = self.client.get(url).send()?;
                let status = response.status().as_u16();
                if status != 200 {
                    return Err(FetchError::Status(status));
                }
                response.bytes()?.to_vec()
            }
        };
        debug!("Archive size: {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_source_from_arg() {
        assert_eq!(
            ArchiveSource::from_arg(None),
            ArchiveSource::Url(DEFAULT_ARCHIVE_URL.to_string())
        );
        assert_eq!(
            ArchiveSource::from_arg(Some("http://localhost/a.zip")),
            ArchiveSource::Url("http://localhost/a.zip".to_string())
        );
        assert_eq!(
            ArchiveSource::from_arg(Some("meta/archive.zip")),
            ArchiveSource::File(PathBuf::from("meta/archive.zip"))
        );
    }

    #[test]
    fn test_fetch_over_http() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zipped_metadata.zip")
            .with_status(200)
            .with_body(b"PK\x05\x06zip")
            .create();

        let source = ArchiveSource::from_arg(Some(&format!("{}/zipped_metadata.zip", server.url())));
        let bytes = ArchiveFetcher::new().unwrap().fetch(&source).unwrap();
        assert_eq!(bytes, b"PK\x05\x06zip");
        mock.assert();
    }

    #[test]
    fn test_non_200_is_an_error() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.zip").with_status(404).create();

        let source = ArchiveSource::Url(format!("{}/missing.zip", server.url()));
        let err = ArchiveFetcher::new().unwrap().fetch(&source).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
        assert_eq!(err.to_string(), "Http Error: 404");
    }

    #[test]
    fn test_fetch_local_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"local zip").unwrap();

        let fetcher = ArchiveFetcher::new().unwrap();
        let source = ArchiveSource::File(file.path().to_path_buf());
        assert_eq!(fetcher.fetch(&source).unwrap(), b"local zip");

        let missing = ArchiveSource::File(PathBuf::from("/nonexistent/archive.zip"));
        assert!(matches!(fetcher.fetch(&missing), Err(FetchError::Io { .. })));
    }
}
