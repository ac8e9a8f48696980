// In-memory table of every song's descriptor, answering "is this the
// latest version" and library statistics.
//
// Edits land in a staging map first and shadow the committed rows until
// `MetadataCache::commit` folds them in.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::descriptor::{Descriptor, DescriptorLookup};
use crate::field_mapping::{FieldMappings, ValueConverter};
use crate::metadata::{identity_key, SongMetadata};
use crate::tags::TagStore;

const NEURO: &str = "Neuro";
const EVIL: &str = "Evil";
const DUET: &str = "Neuro & Evil";

/// One committed song
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRow {
    pub path: PathBuf,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub cover_artist: String,
    pub version: f64,
    pub disc: String,
    pub track: String,
    pub date: String,
    pub comment: String,
    pub special: String,
    #[serde(skip)]
    pub descriptor: Descriptor,
}

impl CacheRow {
    pub fn new(path: &Path, descriptor: Descriptor) -> Self {
        let text = |key: &str| descriptor.field(key);
        Self {
            path: path.to_path_buf(),
            song_id: song_id(path, &descriptor),
            title: text(FieldMappings::TITLE),
            artist: text(FieldMappings::ARTIST),
            cover_artist: text(FieldMappings::COVER_ARTIST),
            version: version_of(&descriptor),
            disc: text(FieldMappings::DISC),
            track: text(FieldMappings::TRACK),
            date: text(FieldMappings::DATE),
            comment: text(FieldMappings::COMMENT),
            special: text(FieldMappings::SPECIAL),
            descriptor,
        }
    }
}

/// Row shape for listing songs in a caller-chosen order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewRow {
    pub path: PathBuf,
    pub file: String,
    pub title: String,
    pub artist: String,
    pub coverartist: String,
    pub version: f64,
    pub disc: String,
    pub track: String,
    pub date: String,
    pub comment: String,
    pub special: String,
}

impl ViewRow {
    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: file_name(path),
            ..Default::default()
        }
    }

    fn from_row(row: &CacheRow) -> Self {
        Self {
            path: row.path.clone(),
            file: file_name(&row.path),
            title: row.title.clone(),
            artist: row.artist.clone(),
            coverartist: row.cover_artist.clone(),
            version: row.version,
            disc: row.disc.clone(),
            track: row.track.clone(),
            date: row.date.clone(),
            comment: row.comment.clone(),
            special: row.special.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStatistics {
    pub all_songs: usize,
    pub unique_ta: usize,
    pub unique_tac: usize,
    pub neuro_solos_unique: usize,
    pub neuro_solos_total: usize,
    pub evil_solos_unique: usize,
    pub evil_solos_total: usize,
    pub duets_unique: usize,
    pub duets_total: usize,
    pub other_unique: usize,
    pub other_total: usize,
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    rows: Vec<CacheRow>,
    staging: BTreeMap<PathBuf, Descriptor>,
}

/// Committed rows with every staged path replaced by its staged descriptor
pub fn merge(committed: Vec<CacheRow>, staged: BTreeMap<PathBuf, Descriptor>) -> Vec<CacheRow> {
    let mut rows: Vec<CacheRow> = committed
        .into_iter()
        .filter(|row| !staged.contains_key(&row.path))
        .collect();
    rows.extend(
        staged
            .into_iter()
            .map(|(path, descriptor)| CacheRow::new(&path, descriptor)),
    );
    rows
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, path: &Path, descriptor: Descriptor) {
        self.staging.insert(path.to_path_buf(), descriptor);
    }

    pub fn commit(&mut self) {
        if self.staging.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut self.staging);
        self.rows = merge(std::mem::take(&mut self.rows), staged);
    }

    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }

    pub fn committed_len(&self) -> usize {
        self.rows.len()
    }

    /// Descriptor for `path`: staged, else committed, else read from the
    /// file and staged.
    pub fn file_data<S>(&mut self, path: &Path, store: &S) -> Descriptor
    where
        S: TagStore + ?Sized,
    {
        if let Some(staged) = self.staging.get(path) {
            return staged.clone();
        }
        if let Some(row) = self.rows.iter().find(|row| row.path == path) {
            return row.descriptor.clone();
        }

        let descriptor = match store.read_descriptor(path) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                debug!("{}", e);
                Descriptor::default()
            }
        };
        self.stage(path, descriptor.clone());
        descriptor
    }

    /// Metadata view with the latest-version flag and standard tags filled in
    pub fn metadata<S>(&mut self, path: &Path, store: &S) -> SongMetadata
    where
        S: TagStore + ?Sized,
    {
        let descriptor = self.file_data(path, store);
        let id = song_id(path, &descriptor);
        let is_latest = self.is_latest_version(&id, version_of(&descriptor));

        let id3 = match store.read_standard_tags(path) {
            Ok(tags) => tags,
            Err(e) => {
                debug!("{}", e);
                Default::default()
            }
        };

        SongMetadata::new(path, descriptor)
            .with_standard_tags(id3)
            .with_latest(is_latest)
    }

    /// Distinct versions of a song, ascending
    pub fn song_versions(&mut self, song_id: &str) -> Vec<f64> {
        self.commit();
        let mut versions: Vec<f64> = self
            .rows
            .iter()
            .filter(|row| row.song_id == song_id)
            .map(|row| row.version)
            .collect();
        versions.sort_by(|a, b| a.total_cmp(b));
        versions.dedup();
        versions
    }

    pub fn latest_version(&mut self, song_id: &str) -> f64 {
        self.song_versions(song_id).last().copied().unwrap_or(0.0)
    }

    pub fn is_latest_version(&mut self, song_id: &str, version: f64) -> bool {
        version == self.latest_version(song_id)
    }

    /// Move a song's entry to its new path
    pub fn rename<S>(&mut self, old: &Path, new: &Path, store: &S)
    where
        S: TagStore + ?Sized,
    {
        let descriptor = self.file_data(old, store);
        self.staging.remove(old);
        self.rows.retain(|row| row.path != old);
        self.stage(new, descriptor);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.staging.clear();
    }

    /// Rows for `paths` in the given order; unknown paths get empty rows
    pub fn view_rows(&mut self, paths: &[PathBuf]) -> Vec<ViewRow> {
        self.commit();
        paths
            .iter()
            .map(|path| match self.rows.iter().find(|row| &row.path == path) {
                Some(row) => ViewRow::from_row(row),
                None => ViewRow::empty(path),
            })
            .collect()
    }

    pub fn statistics(&mut self) -> LibraryStatistics {
        self.commit();
        let songs: Vec<&CacheRow> = self
            .rows
            .iter()
            .filter(|row| !row.title.trim().is_empty())
            .collect();

        let unique_ta = |rows: &[&CacheRow]| {
            rows.iter()
                .map(|r| (r.title.as_str(), r.artist.as_str()))
                .collect::<HashSet<_>>()
                .len()
        };
        let category = |pred: &dyn Fn(&str) -> bool| -> Vec<&CacheRow> {
            songs
                .iter()
                .copied()
                .filter(|r| pred(r.cover_artist.as_str()))
                .collect()
        };

        let neuro = category(&|c| c == NEURO);
        let evil = category(&|c| c == EVIL);
        let duets = category(&|c| c == DUET);
        let other = category(&|c| c != NEURO && c != EVIL && c != DUET);

        LibraryStatistics {
            all_songs: songs.len(),
            unique_ta: unique_ta(&songs),
            unique_tac: songs
                .iter()
                .map(|r| (r.title.as_str(), r.artist.as_str(), r.cover_artist.as_str()))
                .collect::<HashSet<_>>()
                .len(),
            neuro_solos_unique: unique_ta(&neuro),
            neuro_solos_total: neuro.len(),
            evil_solos_unique: unique_ta(&evil),
            evil_solos_total: evil.len(),
            duets_unique: unique_ta(&duets),
            duets_total: duets.len(),
            other_unique: unique_ta(&other),
            other_total: other.len(),
        }
    }
}

/// Identity key of a stored descriptor; the file stem stands in for a missing title
pub fn song_id(path: &Path, descriptor: &Descriptor) -> String {
    let meta = SongMetadata::new(path, descriptor.clone());
    identity_key(&meta.title(), &meta.artist(), &meta.cover_artist())
}

fn version_of(descriptor: &Descriptor) -> f64 {
    ValueConverter::parse_version(&descriptor.field(FieldMappings::VERSION))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
