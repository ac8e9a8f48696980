// ID3v1 tag implementation

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// ID3v1 tag structure
#[derive(Debug, Default)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    pub track: Option<u8>,
}

impl Id3v1Tag {
    pub const TAG_SIZE: u64 = 128;
    const TAG_ID: [u8; 3] = [b'T', b'A', b'G'];

    /// Whether the last 128 bytes of a stream of `len` bytes hold a legacy tag.
    ///
    /// Streams no longer than the tag itself are never considered tagged.
    pub fn present_at_end<R: Read + Seek>(reader: &mut R, len: u64) -> std::io::Result<bool> {
        if len <= Self::TAG_SIZE {
            return Ok(false);
        }

        reader.seek(SeekFrom::End(-(Self::TAG_SIZE as i64)))?;
        let mut id = [0u8; 3];
        reader.read_exact(&mut id)?;
        Ok(id == Self::TAG_ID)
    }

    /// Read ID3v1 tag from file
    pub fn read_from_file(path: &Path) -> std::io::Result<Option<Self>> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < Self::TAG_SIZE {
            return Ok(None);
        }

        file.seek(SeekFrom::End(-(Self::TAG_SIZE as i64)))?;
        let mut buffer = [0u8; Self::TAG_SIZE as usize];
        file.read_exact(&mut buffer)?;

        // Check for TAG identifier
        if buffer[0..3] != Self::TAG_ID {
            return Ok(None);
        }

        Ok(Some(Self::parse(&buffer)))
    }

    /// Parse ID3v1 tag from buffer
    fn parse(buffer: &[u8; 128]) -> Self {
        let title = Self::parse_string(&buffer[3..33]);
        let artist = Self::parse_string(&buffer[33..63]);
        let album = Self::parse_string(&buffer[63..93]);
        let year = Self::parse_string(&buffer[93..97]);
        let comment = Self::parse_string(&buffer[97..127]);

        // Check for ID3v1.1 track number
        let (comment, track) = if buffer[125] == 0 && buffer[126] != 0 {
            (Self::parse_string(&buffer[97..125]), Some(buffer[126]))
        } else {
            (comment, None)
        };

        Id3v1Tag {
            title,
            artist,
            album,
            year,
            comment,
            track,
        }
    }

    /// Parse null-terminated string
    fn parse_string(bytes: &[u8]) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn v1_block(title: &str, track: u8) -> Vec<u8> {
        let mut buffer = vec![0u8; 128];
        buffer[0..3].copy_from_slice(b"TAG");
        buffer[3..3 + title.len()].copy_from_slice(title.as_bytes());
        buffer[126] = track;
        buffer
    }

    #[test]
    fn test_present_at_end() {
        let mut data = vec![0x55u8; 300];
        data.extend(v1_block("Song", 4));
        let len = data.len() as u64;
        assert!(Id3v1Tag::present_at_end(&mut Cursor::new(data), len).unwrap());

        let plain = vec![0x55u8; 300];
        assert!(!Id3v1Tag::present_at_end(&mut Cursor::new(plain), 300).unwrap());
    }

    #[test]
    fn test_tag_only_stream_is_not_tagged() {
        let data = v1_block("Song", 1);
        assert!(!Id3v1Tag::present_at_end(&mut Cursor::new(data), 128).unwrap());
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.mp3");
        let mut data = vec![0x11u8; 64];
        data.extend(v1_block("Legacy Title", 7));
        std::fs::write(&path, data).unwrap();

        let tag = Id3v1Tag::read_from_file(&path).unwrap().unwrap();
        assert_eq!(tag.title, "Legacy Title");
        assert_eq!(tag.track, Some(7));
    }
}
