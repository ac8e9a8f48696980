// ID3v2 tag implementation

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::utils::io::{be_u24, be_u32, read_array, synchsafe_u32};

/// ID3v2 header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub version: (u8, u8),
    pub flags: u8,
    /// Declared tag size, excluding the header and optional footer
    pub size: u32,
}

/// ID3v2 tag structure
#[derive(Debug)]
pub struct Id3v2Tag {
    pub header: Id3v2Header,
    pub frames: Vec<Id3Frame>,
}

/// ID3v2 frame structure
#[derive(Debug)]
pub struct Id3Frame {
    pub frame_id: String,
    pub data: Vec<u8>,
}

impl Id3v2Header {
    pub const HEADER_SIZE: u64 = 10;
    pub const FOOTER_SIZE: u64 = 10;
    const ID: [u8; 3] = [b'I', b'D', b'3'];

    const FLAG_UNSYNCHRONISATION: u8 = 0x80;
    const FLAG_EXTENDED_HEADER: u8 = 0x40;
    const FLAG_FOOTER: u8 = 0x10;

    /// Parse a header from the first ten bytes of a file
    pub fn parse(buffer: &[u8; 10]) -> Option<Self> {
        // Check for ID3 identifier
        if buffer[0..3] != Self::ID {
            return None;
        }

        let version = (buffer[3], buffer[4]);
        let flags = buffer[5];

        // ID3v2.2 stores a plain big-endian size; v2.3 and later are synchsafe
        let size = if version.0 < 3 {
            be_u32(&buffer[6..10])
        } else {
            synchsafe_u32(&buffer[6..10])
        };

        Some(Id3v2Header {
            version,
            flags,
            size,
        })
    }

    /// Read ID3v2 header from reader
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Option<Self>> {
        let buffer: [u8; 10] = read_array(reader)?;
        Ok(Self::parse(&buffer))
    }

    pub fn is_unsynchronised(&self) -> bool {
        self.flags & Self::FLAG_UNSYNCHRONISATION != 0
    }

    /// Footer present flag. Only defined for v2.4.
    pub fn has_footer(&self) -> bool {
        self.version.0 >= 4 && self.flags & Self::FLAG_FOOTER != 0
    }

    /// Bytes occupied by the whole tag container from the start of the file
    pub fn total_len(&self) -> u64 {
        let mut len = Self::HEADER_SIZE + self.size as u64;
        if self.has_footer() {
            len += Self::FOOTER_SIZE;
        }
        len
    }

    fn frame_header_len(&self) -> usize {
        if self.version.0 < 3 {
            6
        } else {
            10
        }
    }
}

impl Id3v2Tag {
    /// Read an ID3v2 tag, keeping only frames accepted by `wanted`.
    ///
    /// Frames that are not wanted are skipped with a seek, so large picture
    /// frames are never loaded. Returns `Ok(None)` when the stream does not
    /// start with an ID3v2 header. Unsynchronised tags (whole-tag in v2.2/v2.3,
    /// per-frame in v2.4) come back with their frame data restored.
    pub fn read<R, F>(reader: &mut R, wanted: F) -> std::io::Result<Option<Self>>
    where
        R: Read + Seek,
        F: Fn(&str) -> bool,
    {
        reader.seek(SeekFrom::Start(0))?;
        let header = match Id3v2Header::read(reader) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };

        let frames = if header.is_unsynchronised() && header.version.0 < 4 {
            let mut body = vec![0u8; header.size as usize];
            reader.read_exact(&mut body)?;
            let body = resynchronise(&body);
            let len = body.len() as u64;
            read_frames(&mut Cursor::new(body), &header, len, &wanted)?
        } else {
            read_frames(reader, &header, header.size as u64, &wanted)?
        };

        Ok(Some(Id3v2Tag { header, frames }))
    }
}

fn read_frames<R, F>(
    reader: &mut R,
    header: &Id3v2Header,
    mut remaining: u64,
    wanted: &F,
) -> std::io::Result<Vec<Id3Frame>>
where
    R: Read + Seek,
    F: Fn(&str) -> bool,
{
    if header.version.0 >= 3 && header.flags & Id3v2Header::FLAG_EXTENDED_HEADER != 0 {
        let size_bytes: [u8; 4] = read_array(reader)?;
        // v2.3 excludes the size field itself, v2.4 includes it
        let skip = if header.version.0 == 3 {
            be_u32(&size_bytes) as u64
        } else {
            (synchsafe_u32(&size_bytes) as u64).saturating_sub(4)
        };
        reader.seek(SeekFrom::Current(skip as i64))?;
        remaining = remaining.saturating_sub(4 + skip);
    }

    let frame_header_len = header.frame_header_len();
    let mut frames = Vec::new();

    while remaining >= frame_header_len as u64 {
        let mut buffer = vec![0u8; frame_header_len];
        reader.read_exact(&mut buffer)?;
        remaining -= frame_header_len as u64;

        // Check for padding (all zeros)
        if buffer[0] == 0 {
            break;
        }

        let (frame_id, size) = match header.version.0 {
            0..=2 => (
                String::from_utf8_lossy(&buffer[0..3]).to_string(),
                be_u24(&buffer[3..6]),
            ),
            3 => (
                String::from_utf8_lossy(&buffer[0..4]).to_string(),
                be_u32(&buffer[4..8]),
            ),
            _ => (
                String::from_utf8_lossy(&buffer[0..4]).to_string(),
                synchsafe_u32(&buffer[4..8]),
            ),
        };

        let size = size as u64;
        if size > remaining {
            break;
        }
        remaining -= size;

        if wanted(&frame_id) {
            let mut data = vec![0u8; size as usize];
            reader.read_exact(&mut data)?;
            if header.version.0 >= 4 {
                data = unwrap_v24_frame(data, buffer[9], header.is_unsynchronised());
            }
            frames.push(Id3Frame { frame_id, data });
        } else {
            reader.seek(SeekFrom::Current(size as i64))?;
        }
    }

    Ok(frames)
}

/// Strip the v2.4 per-frame prefixes and undo unsynchronisation
fn unwrap_v24_frame(mut data: Vec<u8>, format_flags: u8, tag_unsynchronised: bool) -> Vec<u8> {
    let mut prefix = 0;
    if format_flags & FRAME_GROUPING != 0 {
        prefix += 1;
    }
    if format_flags & FRAME_DATA_LENGTH != 0 {
        prefix += 4;
    }
    let cut = prefix.min(data.len());
    data.drain(..cut);

    if tag_unsynchronised || format_flags & FRAME_UNSYNCHRONISED != 0 {
        resynchronise(&data)
    } else {
        data
    }
}

const FRAME_GROUPING: u8 = 0x40;
const FRAME_UNSYNCHRONISED: u8 = 0x02;
const FRAME_DATA_LENGTH: u8 = 0x01;

/// Undo unsynchronisation: every `FF 00` pair becomes `FF`
pub fn resynchronise(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut after_ff = false;
    for &byte in data {
        if after_ff && byte == 0x00 {
            after_ff = false;
            continue;
        }
        out.push(byte);
        after_ff = byte == 0xFF;
    }
    out
}
