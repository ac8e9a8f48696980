// ID3 frame definitions and parsers

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::v2::{Id3Frame, Id3v2Tag};
use crate::utils::encoding::{decode_text, split_terminated, TextEncoding};

/// Frame identifiers the sync engine reads or writes
pub mod frame_ids {
    pub const TITLE: &str = "TIT2"; // Title/songname/content description
    pub const ARTIST: &str = "TPE1"; // Lead performer(s)/Soloist(s)
    pub const ALBUM: &str = "TALB"; // Album/Movie/Show title
    pub const TRACK: &str = "TRCK"; // Track number/Position in set
    pub const DISC: &str = "TPOS"; // Part of a set
    pub const DATE: &str = "TDRC"; // Recording time
    pub const YEAR: &str = "TYER"; // Year (v2.3)
    pub const COMMENT: &str = "COMM"; // Comments
    pub const COMMENT_V22: &str = "COM"; // Comments (v2.2)
}

/// Decoded comment frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFrame {
    pub lang: String,
    pub description: String,
    pub text: String,
}

/// Decode a COMM frame body: encoding byte, 3-byte language, terminated
/// description, then the text.
pub fn decode_comment_frame(data: &[u8]) -> Option<CommentFrame> {
    if data.len() < 4 {
        return None;
    }

    let encoding = TextEncoding::from_byte(data[0]);
    let lang = String::from_utf8_lossy(&data[1..4]).to_string();
    let (description, text) = split_terminated(&data[4..], encoding);

    Some(CommentFrame {
        lang,
        description: decode_text(description, encoding),
        text: decode_text(text, encoding),
    })
}

fn is_comment(frame: &Id3Frame) -> bool {
    frame.frame_id == frame_ids::COMMENT || frame.frame_id == frame_ids::COMMENT_V22
}

/// Read every comment frame from a file without decoding the rest of the tag
pub fn read_comments(path: &Path) -> std::io::Result<Vec<CommentFrame>> {
    let mut reader = BufReader::new(File::open(path)?);
    let tag = match Id3v2Tag::read(&mut reader, |id| {
        id == frame_ids::COMMENT || id == frame_ids::COMMENT_V22
    })? {
        Some(tag) => tag,
        None => return Ok(Vec::new()),
    };

    Ok(tag
        .frames
        .iter()
        .filter(|f| is_comment(f))
        .filter_map(|f| decode_comment_frame(&f.data))
        .collect())
}

/// Pick the comment that carries the structured payload: the first one that
/// looks like an object, else the first comment at all.
pub fn payload_comment(comments: &[CommentFrame]) -> Option<&CommentFrame> {
    comments
        .iter()
        .find(|c| c.text.trim_start().starts_with('{'))
        .or_else(|| comments.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_comment() {
        let frame = decode_comment_frame(b"\x03ved\0{\"Title\":\"A\"}").unwrap();
        assert_eq!(frame.lang, "ved");
        assert_eq!(frame.description, "");
        assert_eq!(frame.text, "{\"Title\":\"A\"}");
    }

    #[test]
    fn test_decode_utf16_comment() {
        let mut data = vec![0x01];
        data.extend_from_slice(b"eng");
        data.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00]);
        data.extend_from_slice(&[0xFF, 0xFE, b'o', 0x00, b'k', 0x00]);
        let frame = decode_comment_frame(&data).unwrap();
        assert_eq!(frame.description, "");
        assert_eq!(frame.text, "ok");
    }

    #[test]
    fn test_truncated_comment() {
        assert!(decode_comment_frame(b"\x03en").is_none());
    }

    #[test]
    fn test_payload_comment_prefers_objects() {
        let comments = vec![
            CommentFrame {
                lang: "eng".into(),
                description: String::new(),
                text: "ripped by someone".into(),
            },
            CommentFrame {
                lang: "ved".into(),
                description: String::new(),
                text: " {\"xxHash\":\"1\"}".into(),
            },
        ];
        assert_eq!(payload_comment(&comments).unwrap().lang, "ved");
        assert!(payload_comment(&[]).is_none());
    }
}
