// ID3 container framing
//
// Only the parts needed to locate the audio payload and to pull the raw
// comment payload without a full tag decode. Full tag reading and writing
// goes through the `id3` crate (see `crate::tags`).
pub mod frames;
pub mod v1;
pub mod v2;

pub use v1::Id3v1Tag;
pub use v2::{Id3v2Header, Id3v2Tag};
