// Unified metadata field mapping
//
// Rules, templates and the metadata view address fields by lower-case names
// ("title", "coverartist", "id3_album", ...). This module turns those names
// into an enumerated identifier and maps each identifier to the descriptor
// key or ID3 frame it is backed by.

use crate::descriptor::leading_number;
use crate::id3::frames::frame_ids;

/// Fields addressable from rules and templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Title,
    Artist,
    CoverArtist,
    Version,
    Disc,
    Track,
    Date,
    Comment,
    Special,
    File,
    Id3Title,
    Id3Artist,
    Id3Album,
    Id3Track,
    Id3Disc,
    Id3Date,
}

impl MetadataField {
    pub const ALL: [MetadataField; 16] = [
        MetadataField::Title,
        MetadataField::Artist,
        MetadataField::CoverArtist,
        MetadataField::Version,
        MetadataField::Disc,
        MetadataField::Track,
        MetadataField::Date,
        MetadataField::Comment,
        MetadataField::Special,
        MetadataField::File,
        MetadataField::Id3Title,
        MetadataField::Id3Artist,
        MetadataField::Id3Album,
        MetadataField::Id3Track,
        MetadataField::Id3Disc,
        MetadataField::Id3Date,
    ];

    /// Get standard field name (lowercase)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Artist => "artist",
            MetadataField::CoverArtist => "coverartist",
            MetadataField::Version => "version",
            MetadataField::Disc => "disc",
            MetadataField::Track => "track",
            MetadataField::Date => "date",
            MetadataField::Comment => "comment",
            MetadataField::Special => "special",
            MetadataField::File => "file",
            MetadataField::Id3Title => "id3_title",
            MetadataField::Id3Artist => "id3_artist",
            MetadataField::Id3Album => "id3_album",
            MetadataField::Id3Track => "id3_track",
            MetadataField::Id3Disc => "id3_disc",
            MetadataField::Id3Date => "id3_date",
        }
    }

    /// Parse from a field name, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "title" => Some(MetadataField::Title),
            "artist" => Some(MetadataField::Artist),
            "coverartist" => Some(MetadataField::CoverArtist),
            "version" => Some(MetadataField::Version),
            "disc" | "discnumber" => Some(MetadataField::Disc),
            "track" => Some(MetadataField::Track),
            "date" => Some(MetadataField::Date),
            "comment" => Some(MetadataField::Comment),
            "special" => Some(MetadataField::Special),
            "file" => Some(MetadataField::File),
            "id3_title" => Some(MetadataField::Id3Title),
            "id3_artist" => Some(MetadataField::Id3Artist),
            "id3_album" => Some(MetadataField::Id3Album),
            "id3_track" => Some(MetadataField::Id3Track),
            "id3_disc" => Some(MetadataField::Id3Disc),
            "id3_date" => Some(MetadataField::Id3Date),
            _ => None,
        }
    }

    /// Whether the value comes from the standard tag frames rather than the descriptor
    pub fn is_id3(&self) -> bool {
        matches!(
            self,
            MetadataField::Id3Title
                | MetadataField::Id3Artist
                | MetadataField::Id3Album
                | MetadataField::Id3Track
                | MetadataField::Id3Disc
                | MetadataField::Id3Date
        )
    }
}

/// Descriptor keys and frame ids backing each field
pub struct FieldMappings;

impl FieldMappings {
    // Descriptor (archive record) keys
    pub const TITLE: &str = "Title";
    pub const ARTIST: &str = "Artist";
    pub const COVER_ARTIST: &str = "CoverArtist";
    pub const VERSION: &str = "Version";
    pub const DISC: &str = "Discnumber";
    pub const TRACK: &str = "Track";
    pub const DATE: &str = "Date";
    pub const COMMENT: &str = "Comment";
    pub const SPECIAL: &str = "Special";
    pub const IDENTITY: &str = "xxHash";

    /// Descriptor key for a field, if it is descriptor-backed
    pub fn to_descriptor_key(field: &MetadataField) -> Option<&'static str> {
        match field {
            MetadataField::Title => Some(Self::TITLE),
            MetadataField::Artist => Some(Self::ARTIST),
            MetadataField::CoverArtist => Some(Self::COVER_ARTIST),
            MetadataField::Version => Some(Self::VERSION),
            MetadataField::Disc => Some(Self::DISC),
            MetadataField::Track => Some(Self::TRACK),
            MetadataField::Date => Some(Self::DATE),
            MetadataField::Comment => Some(Self::COMMENT),
            MetadataField::Special => Some(Self::SPECIAL),
            _ => None,
        }
    }

    /// ID3v2 frame id for a field, if it is frame-backed
    pub fn to_id3v2(field: &MetadataField) -> Option<&'static str> {
        match field {
            MetadataField::Id3Title => Some(frame_ids::TITLE),
            MetadataField::Id3Artist => Some(frame_ids::ARTIST),
            MetadataField::Id3Album => Some(frame_ids::ALBUM),
            MetadataField::Id3Track => Some(frame_ids::TRACK),
            MetadataField::Id3Disc => Some(frame_ids::DISC),
            MetadataField::Id3Date => Some(frame_ids::DATE),
            _ => None,
        }
    }
}

/// Value converter for format-specific value shapes
pub struct ValueConverter;

impl ValueConverter {
    /// Render a version number without a trailing ".0" when it is integral
    pub fn format_version(version: f64) -> String {
        if version.fract() == 0.0 && version.is_finite() {
            format!("{}", version as i64)
        } else {
            version.to_string()
        }
    }

    /// Parse a version string: plain float, else the first number in it, else 0
    pub fn parse_version(raw: &str) -> f64 {
        raw.trim()
            .parse::<f64>()
            .ok()
            .or_else(|| leading_number(raw))
            .unwrap_or(0.0)
    }
}
