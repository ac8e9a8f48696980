// Content fingerprinting.
//
// A fingerprint is the SHA-256 of the audio payload with the leading ID3v2
// container (header, body, optional v2.4 footer) and the trailing 128-byte
// ID3v1 block cut away, so editing tags never changes it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::error;

use crate::id3::{Id3v1Tag, Id3v2Header};
use crate::utils::io::stream_len;

/// Read size when streaming the payload into the hasher
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Byte range of the audio payload inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpan {
    pub start: u64,
    pub end: u64,
}

impl AudioSpan {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Locate the audio payload.
///
/// When the tag framing yields an empty or inverted range the whole stream is
/// used instead.
pub fn audio_span<R: Read + Seek>(reader: &mut R) -> std::io::Result<AudioSpan> {
    let len = stream_len(reader)?;

    let mut start = 0;
    if len >= Id3v2Header::HEADER_SIZE {
        if let Some(header) = Id3v2Header::read(reader)? {
            start = header.total_len();
        }
    }

    let mut end = len;
    if Id3v1Tag::present_at_end(reader, len)? {
        end = len - Id3v1Tag::TAG_SIZE;
    }

    if end <= start {
        return Ok(AudioSpan { start: 0, end: len });
    }
    Ok(AudioSpan { start, end })
}

/// Fingerprint an already opened stream
pub fn fingerprint_reader<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    let span = audio_span(reader)?;
    reader.seek(SeekFrom::Start(span.start))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut remaining = span.len();

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let read = reader.read(&mut buffer[..want])?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        remaining -= read as u64;
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint a file on disk. I/O failures are logged and yield `None`.
pub fn fingerprint(path: &Path) -> Option<String> {
    let result = File::open(path).and_then(|mut file| fingerprint_reader(&mut file));
    match result {
        Ok(digest) => Some(digest),
        Err(e) => {
            error!("Error calculating audio hash for {}: {}", path.display(), e);
            None
        }
    }
}
