// I/O utilities for reading tag-container framing

use std::io::{Read, Seek, SeekFrom};

/// Read a fixed-size array from the reader
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> std::io::Result<[u8; N]> {
    let mut buffer = [0u8; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Big-endian 32-bit integer from the first four bytes
pub fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Big-endian 24-bit integer from the first three bytes (ID3v2.2 frame sizes)
pub fn be_u24(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32)
}

/// Synchsafe 32-bit integer (7 bits per byte, high bit ignored)
pub fn synchsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

/// Total length of the stream, leaving the cursor at the start
pub fn stream_len<R: Seek>(reader: &mut R) -> std::io::Result<u64> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_synchsafe_ignores_high_bits() {
        assert_eq!(synchsafe_u32(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(synchsafe_u32(&[0x80, 0x80, 0x82, 0x81]), 257);
        assert_eq!(synchsafe_u32(&[0x7F, 0x7F, 0x7F, 0x7F]), 0x0FFF_FFFF);
    }

    #[test]
    fn test_plain_big_endian() {
        assert_eq!(be_u32(&[0x00, 0x00, 0x01, 0x01]), 257);
        assert_eq!(be_u24(&[0x01, 0x00, 0x00]), 65536);
    }

    #[test]
    fn test_stream_len_rewinds() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        assert_eq!(stream_len(&mut cursor).unwrap(), 5);
        let first: [u8; 2] = read_array(&mut cursor).unwrap();
        assert_eq!(first, [1, 2]);
    }
}
