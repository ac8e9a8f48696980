// Tag I/O.
//
// The sync engine talks to files only through `TagStore`. [`Id3TagStore`]
// is the real implementation: the raw comment payload is pulled with the
// crate's own frame scanner, everything else goes through the `id3` crate.

use std::path::{Path, PathBuf};

use id3::frame::Comment;
use id3::{ErrorKind, Tag, TagLike, Version};
use thiserror::Error;
use tracing::debug;

use crate::descriptor::{Descriptor, NormalizedRecord};
use crate::id3::frames::{self, frame_ids};
use crate::id3::Id3v1Tag;

/// Comment language marking the descriptor frame
pub const DESCRIPTOR_LANG: &str = "ved";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tag error on {path}: {reason}")]
    Tag { path: PathBuf, reason: String },
}

impl TagError {
    fn tag(path: &Path, err: impl std::fmt::Display) -> Self {
        TagError::Tag {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        TagError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Standard display frames as currently stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track: String,
    pub disc: String,
    pub date: String,
}

impl StandardTags {
    /// Stored text of a standard frame by id, "" for other frames
    pub fn frame(&self, id: &str) -> &str {
        match id {
            frame_ids::TITLE => &self.title,
            frame_ids::ARTIST => &self.artist,
            frame_ids::ALBUM => &self.album,
            frame_ids::TRACK => &self.track,
            frame_ids::DISC => &self.disc,
            frame_ids::DATE => &self.date,
            _ => "",
        }
    }
}

/// Display frames to write. `None` leaves the frame untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    pub disc: Option<String>,
    pub date: Option<String>,
}

impl TagUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.track.is_none()
            && self.disc.is_none()
            && self.date.is_none()
    }
}

pub trait TagStore {
    /// Raw text of the comment carrying the descriptor, without decoding the whole tag
    fn read_raw_descriptor(&self, path: &Path) -> Result<Option<String>, TagError>;

    /// Structured descriptor merged from every JSON comment frame
    fn read_descriptor(&self, path: &Path) -> Result<Option<Descriptor>, TagError>;

    fn read_standard_tags(&self, path: &Path) -> Result<StandardTags, TagError>;

    /// Replace the stored descriptor with `record`
    fn write_descriptor(&self, path: &Path, record: &NormalizedRecord) -> Result<(), TagError>;

    fn write_standard_tags(&self, path: &Path, update: &TagUpdate) -> Result<(), TagError>;
}

/// ID3v2 tag store backed by the `id3` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct Id3TagStore;

impl Id3TagStore {
    pub fn new() -> Self {
        Self
    }

    /// Existing tag, or an empty one when the file has none
    fn load(path: &Path) -> Result<Option<Tag>, TagError> {
        match Tag::read_from_path(path) {
            Ok(tag) => Ok(Some(tag)),
            Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(None),
            Err(e) => Err(TagError::tag(path, e)),
        }
    }

    fn save(path: &Path, tag: &Tag) -> Result<(), TagError> {
        tag.write_to_path(path, Version::Id3v24)
            .map_err(|e| TagError::tag(path, e))
    }
}

fn text_frame(tag: &Tag, id: &str) -> Option<String> {
    tag.get(id)
        .and_then(|frame| frame.content().text())
        .map(str::to_owned)
}

fn is_descriptor_comment(comment: &Comment) -> bool {
    comment.lang == DESCRIPTOR_LANG || Descriptor::parse(&comment.text).is_some()
}

impl TagStore for Id3TagStore {
    fn read_raw_descriptor(&self, path: &Path) -> Result<Option<String>, TagError> {
        let comments = frames::read_comments(path).map_err(|e| TagError::io(path, e))?;
        Ok(frames::payload_comment(&comments).map(|c| c.text.clone()))
    }

    fn read_descriptor(&self, path: &Path) -> Result<Option<Descriptor>, TagError> {
        let Some(tag) = Self::load(path)? else {
            return Ok(None);
        };

        let mut merged = Descriptor::default();
        for comment in tag.comments() {
            if let Some(descriptor) = Descriptor::parse(&comment.text) {
                merged.merge(descriptor);
            }
        }

        Ok((!merged.is_empty()).then_some(merged))
    }

    fn read_standard_tags(&self, path: &Path) -> Result<StandardTags, TagError> {
        match Self::load(path)? {
            Some(tag) => Ok(StandardTags {
                title: text_frame(&tag, frame_ids::TITLE).unwrap_or_default(),
                artist: text_frame(&tag, frame_ids::ARTIST).unwrap_or_default(),
                album: text_frame(&tag, frame_ids::ALBUM).unwrap_or_default(),
                track: text_frame(&tag, frame_ids::TRACK).unwrap_or_default(),
                disc: text_frame(&tag, frame_ids::DISC).unwrap_or_default(),
                date: text_frame(&tag, frame_ids::DATE)
                    .or_else(|| text_frame(&tag, frame_ids::YEAR))
                    .unwrap_or_default(),
            }),
            None => {
                debug!("No ID3v2 tag in {}, trying ID3v1", path.display());
                let legacy = Id3v1Tag::read_from_file(path).map_err(|e| TagError::io(path, e))?;
                Ok(legacy
                    .map(|v1| StandardTags {
                        title: v1.title,
                        artist: v1.artist,
                        album: v1.album,
                        track: v1.track.map(|t| t.to_string()).unwrap_or_default(),
                        disc: String::new(),
                        date: v1.year,
                    })
                    .unwrap_or_default())
            }
        }
    }

    fn write_descriptor(&self, path: &Path, record: &NormalizedRecord) -> Result<(), TagError> {
        let mut tag = Self::load(path)?.unwrap_or_else(Tag::new);

        // Full replace: drop every earlier descriptor comment, keep the rest
        let kept: Vec<Comment> = tag
            .comments()
            .filter(|c| !is_descriptor_comment(c))
            .cloned()
            .collect();
        let _ = tag.remove(frame_ids::COMMENT);
        for comment in kept {
            let _ = tag.add_frame(comment);
        }

        let _ = tag.add_frame(Comment {
            lang: DESCRIPTOR_LANG.to_string(),
            description: String::new(),
            text: record.to_payload(),
        });

        Self::save(path, &tag)
    }

    fn write_standard_tags(&self, path: &Path, update: &TagUpdate) -> Result<(), TagError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut tag = Self::load(path)?.unwrap_or_else(Tag::new);

        if let Some(title) = &update.title {
            tag.set_title(title.as_str());
        }
        if let Some(artist) = &update.artist {
            tag.set_artist(artist.as_str());
        }
        if let Some(album) = &update.album {
            tag.set_album(album.as_str());
        }
        if let Some(track) = &update.track {
            tag.set_text(frame_ids::TRACK, track.as_str());
        }
        if let Some(disc) = &update.disc {
            tag.set_text(frame_ids::DISC, disc.as_str());
        }
        if let Some(date) = &update.date {
            tag.set_text(frame_ids::DATE, date.as_str());
        }

        Self::save(path, &tag)
    }
}
