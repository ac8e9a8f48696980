// Read model over a song's descriptor, its standard tags and its
// latest-version flag.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::descriptor::{value_to_string, Descriptor, DescriptorLookup};
use crate::field_mapping::{FieldMappings, MetadataField, ValueConverter};
use crate::tags::StandardTags;

type Accessor = fn(&SongMetadata) -> String;

/// Fields computed from more than one source. Everything else maps to a
/// descriptor key or a standard frame.
const ACCESSORS: [(MetadataField, Accessor); 3] = [
    (MetadataField::Title, |m| m.title()),
    (MetadataField::Version, |m| m.version()),
    (MetadataField::File, |m| m.file_name()),
];

fn accessor(field: MetadataField) -> Option<Accessor> {
    ACCESSORS.iter().find(|(f, _)| *f == field).map(|(_, a)| *a)
}

#[derive(Debug, Clone, Default)]
pub struct SongMetadata {
    path: PathBuf,
    descriptor: Descriptor,
    id3: StandardTags,
    is_latest: bool,
}

impl SongMetadata {
    pub fn new(path: impl Into<PathBuf>, descriptor: Descriptor) -> Self {
        Self {
            path: path.into(),
            descriptor,
            ..Default::default()
        }
    }

    pub fn with_standard_tags(mut self, id3: StandardTags) -> Self {
        self.id3 = id3;
        self
    }

    pub fn with_latest(mut self, is_latest: bool) -> Self {
        self.is_latest = is_latest;
        self
    }

    /// Value of a field by name, case-insensitive. Names that are not known
    /// fields read the descriptor key verbatim.
    pub fn get(&self, name: &str) -> String {
        match MetadataField::parse(name) {
            Some(field) => self.get_field(field),
            None => self.descriptor.field(name),
        }
    }

    pub fn get_field(&self, field: MetadataField) -> String {
        if let Some(accessor) = accessor(field) {
            return accessor(self);
        }
        if field.is_id3() {
            return FieldMappings::to_id3v2(&field)
                .map(|id| self.id3.frame(id).to_string())
                .unwrap_or_default();
        }
        FieldMappings::to_descriptor_key(&field)
            .map(|key| self.text(key))
            .unwrap_or_default()
    }

    fn text(&self, key: &str) -> String {
        self.descriptor.field(key)
    }

    /// Descriptor title, else the file stem
    pub fn title(&self) -> String {
        let title = self.text(FieldMappings::TITLE);
        if !title.is_empty() {
            return title;
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn artist(&self) -> String {
        self.get_field(MetadataField::Artist)
    }

    pub fn cover_artist(&self) -> String {
        self.get_field(MetadataField::CoverArtist)
    }

    pub fn track(&self) -> String {
        self.get_field(MetadataField::Track)
    }

    pub fn disc(&self) -> String {
        self.get_field(MetadataField::Disc)
    }

    pub fn date(&self) -> String {
        self.get_field(MetadataField::Date)
    }

    /// Version as text; integral floats lose their ".0", missing is "0"
    pub fn version(&self) -> String {
        match self.descriptor.get(FieldMappings::VERSION) {
            None | Some(Value::Null) => "0".to_string(),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if n.is_f64() => ValueConverter::format_version(v),
                _ => n.to_string(),
            },
            Some(other) => value_to_string(other),
        }
    }

    /// Version as a number for latest-version comparisons
    pub fn version_number(&self) -> f64 {
        match self.descriptor.get(FieldMappings::VERSION) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => ValueConverter::parse_version(s),
            _ => 0.0,
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `title|artist|cover_artist`, grouping versions of the same song
    pub fn identity_key(&self) -> String {
        identity_key(&self.title(), &self.artist(), &self.cover_artist())
    }

    pub fn is_latest(&self) -> bool {
        self.is_latest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn standard_tags(&self) -> &StandardTags {
        &self.id3
    }
}

pub fn identity_key(title: &str, artist: &str, cover_artist: &str) -> String {
    format!("{}|{}|{}", title, artist, cover_artist)
}
