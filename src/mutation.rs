// Writing a reconciled descriptor back into a file, then renaming the file
// to its canonical name.
//
// Writes are applied in order (descriptor, display tags, rename) and stop at
// the first failure. Nothing already written is rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::descriptor::NormalizedRecord;
use crate::error::{SyncError, SyncResult};
use crate::field_mapping::FieldMappings;
use crate::metadata::SongMetadata;
use crate::rules::{render_template, DisplayTags};
use crate::tags::{TagStore, TagUpdate};

pub const DEFAULT_RENAME_TEMPLATE: &str = "{title} - {artist}";

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Standard tag update for a record: display tags from the rules, numbering
/// and date from the record itself. Empty values are left alone.
pub fn tag_update(record: &NormalizedRecord, display: &DisplayTags) -> TagUpdate {
    let from_record = |key: &str| {
        record
            .get(key)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    TagUpdate {
        title: display.title.clone(),
        artist: display.artist.clone(),
        album: display.album.clone(),
        track: from_record(FieldMappings::TRACK),
        disc: from_record(FieldMappings::DISC),
        date: from_record(FieldMappings::DATE),
    }
}

/// Write `record` and `display` into `path` and rename it to the name
/// `template` renders. Returns the file's final path.
pub fn apply<S>(
    store: &S,
    path: &Path,
    record: &NormalizedRecord,
    display: &DisplayTags,
    template: &str,
) -> SyncResult<PathBuf>
where
    S: TagStore + ?Sized,
{
    store.write_descriptor(path, record)?;

    let update = tag_update(record, display);
    if !update.is_empty() {
        store.write_standard_tags(path, &update)?;
    }

    let meta = SongMetadata::new(path, record.to_descriptor());
    rename_to_canonical(path, template, &meta)
}

/// Filename stem for a song, with path-illegal characters replaced.
/// `None` when the template renders to nothing.
pub fn canonical_stem(template: &str, meta: &SongMetadata) -> Option<String> {
    let rendered: String = render_template(template, meta)
        .chars()
        .map(|c| {
            if c.is_whitespace() {
                ' '
            } else if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
    (!stem.is_empty()).then_some(stem)
}

/// First free path in `dir` for `stem`: the bare name, then `stem (1)`,
/// `stem (2)` and so on. The extension is kept as given. `current` is the
/// file being renamed and counts as free.
pub fn free_target(
    dir: &Path,
    stem: &str,
    extension: Option<&str>,
    current: Option<&Path>,
) -> PathBuf {
    let with_ext = |name: String| match extension {
        Some(ext) => dir.join(format!("{}.{}", name, ext)),
        None => dir.join(name),
    };

    let mut candidate = with_ext(stem.to_string());
    let mut counter = 1u32;
    while candidate.exists() && Some(candidate.as_path()) != current {
        candidate = with_ext(format!("{} ({})", stem, counter));
        counter += 1;
    }
    candidate
}

/// Rename `path` when its stem differs from the canonical one
pub fn rename_to_canonical(path: &Path, template: &str, meta: &SongMetadata) -> SyncResult<PathBuf> {
    let Some(stem) = canonical_stem(template, meta) else {
        debug!("{}: canonical name is empty, not renaming", path.display());
        return Ok(path.to_path_buf());
    };

    let current = path.file_stem().map(|s| s.to_string_lossy());
    if current.as_deref() == Some(stem.as_str()) {
        return Ok(path.to_path_buf());
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let target = free_target(dir, &stem, extension.as_deref(), Some(path));
    if target == path {
        return Ok(target);
    }

    fs::rename(path, &target).map_err(|e| SyncError::file_io(path, e))?;
    info!("Renamed {} -> {}", path.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::tags::memory::MemoryTagStore;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> NormalizedRecord {
        match value {
            serde_json::Value::Object(map) => NormalizedRecord::from_fields(&map),
            _ => unreachable!(),
        }
    }

    fn meta(payload: &str) -> SongMetadata {
        SongMetadata::new("/music/old.mp3", Descriptor::parse(payload).unwrap())
    }

    #[test]
    fn test_canonical_stem() {
        let m = meta(r#"{"Title":"AC/DC: Live?","Artist":"  Band \t Name "}"#);
        assert_eq!(
            canonical_stem(DEFAULT_RENAME_TEMPLATE, &m).as_deref(),
            Some("AC_DC_ Live_ - Band Name")
        );
        assert_eq!(canonical_stem("{comment}", &m), None);
        assert_eq!(canonical_stem("   ", &m), None);
    }

    #[test]
    fn test_free_target_counts_up() {
        let dir = TempDir::new().unwrap();
        assert_eq!(free_target(dir.path(), "X", Some("mp3"), None), dir.path().join("X.mp3"));

        fs::write(dir.path().join("X.mp3"), b"").unwrap();
        for n in 1..4 {
            fs::write(dir.path().join(format!("X ({}).mp3", n)), b"").unwrap();
        }
        assert_eq!(
            free_target(dir.path(), "X", Some("mp3"), None),
            dir.path().join("X (4).mp3")
        );
        assert_eq!(free_target(dir.path(), "X", None, None), dir.path().join("X"));

        let own = dir.path().join("X (2).mp3");
        assert_eq!(free_target(dir.path(), "X", Some("mp3"), Some(&own)), own);
    }

    #[test]
    fn test_numbered_file_keeps_its_own_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Song - Band.mp3"), b"first").unwrap();
        let numbered = dir.path().join("Song - Band (1).mp3");
        fs::write(&numbered, b"second").unwrap();

        let m = meta(r#"{"Title":"Song","Artist":"Band"}"#);
        let target = rename_to_canonical(&numbered, DEFAULT_RENAME_TEMPLATE, &m).unwrap();
        assert_eq!(target, numbered);
        assert_eq!(fs::read(&numbered).unwrap(), b"second");
        assert!(!dir.path().join("Song - Band (2).mp3").exists());
    }

    #[test]
    fn test_rename_to_canonical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.mp3");
        fs::write(&path, b"audio").unwrap();
        fs::write(dir.path().join("Song - Band.mp3"), b"other").unwrap();

        let m = meta(r#"{"Title":"Song","Artist":"Band"}"#);
        let renamed = rename_to_canonical(&path, DEFAULT_RENAME_TEMPLATE, &m).unwrap();
        assert_eq!(renamed, dir.path().join("Song - Band (1).mp3"));
        assert!(!path.exists());
        assert_eq!(fs::read(&renamed).unwrap(), b"audio");

        // already canonical
        let again = rename_to_canonical(&renamed, "{title} - {artist} (1)", &m).unwrap();
        assert_eq!(again, renamed);
    }

    #[test]
    fn test_apply_writes_then_renames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track01.mp3");
        fs::write(&path, b"audio").unwrap();
        let store = MemoryTagStore::default();

        let rec = record(json!({
            "xxHash": "1234",
            "Title": "Sound of Silence",
            "Artist": "Disturbed",
            "Track": "89/98",
            "Date": ""
        }));
        let display = DisplayTags {
            title: Some("Sound of Silence".into()),
            artist: None,
            album: Some("Karaoke".into()),
        };

        let target = apply(&store, &path, &rec, &display, DEFAULT_RENAME_TEMPLATE).unwrap();
        assert_eq!(target, dir.path().join("Sound of Silence - Disturbed.mp3"));
        assert!(target.exists());

        let written = Descriptor::parse(&store.payload(&path).unwrap()).unwrap();
        assert_eq!(written.fields().len(), 5);
        let tags = store.standard(&path);
        assert_eq!(tags.title, "Sound of Silence");
        assert_eq!(tags.album, "Karaoke");
        assert_eq!(tags.track, "89/98");
        assert_eq!(tags.artist, "");
        assert_eq!(tags.date, "");
    }

    #[test]
    fn test_apply_failure_stops_before_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track01.mp3");
        fs::write(&path, b"audio").unwrap();
        let store = MemoryTagStore::default().failing_on(&path);

        let rec = record(json!({"Title": "New", "Artist": "Band"}));
        let err = apply(&store, &path, &rec, &DisplayTags::default(), DEFAULT_RENAME_TEMPLATE)
            .unwrap_err();
        assert!(matches!(err, SyncError::Tag { .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_tag_update_skips_empty_record_fields() {
        let rec = record(json!({"Track": "3", "Discnumber": "", "Date": "2024"}));
        let update = tag_update(&rec, &DisplayTags::default());
        assert_eq!(update.track.as_deref(), Some("3"));
        assert_eq!(update.disc, None);
        assert_eq!(update.date.as_deref(), Some("2024"));
        assert_eq!(update.title, None);
    }
}
