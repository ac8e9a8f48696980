// Error taxonomy for a sync run.
//
// Only `SyncError::FatalSetup` and `SyncError::Archive` abort a run.
// Record and per-file errors are logged where they occur and the run moves on.

use std::path::PathBuf;

use thiserror::Error;

use crate::tags::TagError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No archive, no songs directory, or no songs in it.
    #[error("{0}")]
    FatalSetup(String),

    /// The archive bytes could not be opened as a zip.
    #[error("Unable to open metadata archive: {0}")]
    Archive(String),

    /// One malformed record inside the archive.
    #[error("Unable to process metadata for {entry}: {reason}")]
    RecordParse { entry: String, reason: String },

    /// Read, write or hash failure on one local file.
    #[error("I/O error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tag library failure on one local file.
    #[error("Tag error on {path}: {reason}")]
    Tag { path: PathBuf, reason: String },
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error ends the whole run rather than one file or record
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::FatalSetup(_) | SyncError::Archive(_))
    }
}

impl From<TagError> for SyncError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::Io { path, source } => SyncError::FileIo { path, source },
            TagError::Tag { path, reason } => SyncError::Tag { path, reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(SyncError::FatalSetup("no songs".into()).is_fatal());
        assert!(SyncError::Archive("bad zip".into()).is_fatal());
        let io = SyncError::file_io(
            "a.mp3",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!io.is_fatal());
        assert_eq!(io.to_string(), "I/O error on a.mp3: gone");
    }

    #[test]
    fn test_tag_errors_convert() {
        let err: SyncError = TagError::Tag {
            path: "b.mp3".into(),
            reason: "bad frame".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Tag { .. }));
        assert!(!err.is_fatal());
    }
}
