// The reconciliation loop.
//
// Each local file goes through
// `Pending -> Fingerprinted -> Matched|Unmatched -> Unchanged|Drifted ->
// Mutated|MutationFailed`, one file at a time. A failure on one file is
// logged and counted; it never ends the run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{LibraryStatistics, MetadataCache};
use crate::descriptor::{DescriptorLookup, EmbeddedDescriptor};
use crate::drift;
use crate::field_mapping::FieldMappings;
use crate::fingerprint::fingerprint;
use crate::mutation::{self, DEFAULT_RENAME_TEMPLATE};
use crate::records::LookupTable;
use crate::rules::Preset;
use crate::tags::TagStore;

/// Default number of records that may go unmatched before the library is
/// reported as mostly missing
pub const DEFAULT_MISSING_SLACK: usize = 150;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub rename_template: String,
    pub missing_slack: usize,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            rename_template: DEFAULT_RENAME_TEMPLATE.to_string(),
            missing_slack: DEFAULT_MISSING_SLACK,
            dry_run: false,
        }
    }
}

/// Where a file's processing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// No fingerprint could be computed
    Unhashable,
    Unmatched,
    Unchanged,
    /// Drift found but left in place (dry run)
    Drifted,
    Mutated,
    MutationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStatus {
    UpToDate,
    SomeMissing,
    ManyMissing,
}

/// Classify unmatched records. "Many missing" means more than
/// `total - slack` records went unseen.
pub fn missing_status(total: usize, seen: usize, slack: usize) -> MissingStatus {
    let unseen = total.saturating_sub(seen);
    if unseen > total.saturating_sub(slack) {
        MissingStatus::ManyMissing
    } else if unseen == 0 {
        MissingStatus::UpToDate
    } else {
        MissingStatus::SomeMissing
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub scanned: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unchanged: usize,
    pub drifted: usize,
    pub updated: usize,
    pub failed: usize,
    pub unhashable: usize,
    pub records: usize,
    pub seen: usize,
    pub unseen: usize,
    pub missing: MissingStatus,
    /// `Track Title` of every record no file matched
    pub missing_records: Vec<String>,
    pub dry_run: bool,
    pub setup_secs: f64,
    pub processing_secs: f64,
    pub statistics: LibraryStatistics,
}

impl SyncSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            scanned: 0,
            matched: 0,
            unmatched: 0,
            unchanged: 0,
            drifted: 0,
            updated: 0,
            failed: 0,
            unhashable: 0,
            records: 0,
            seen: 0,
            unseen: 0,
            missing: MissingStatus::UpToDate,
            missing_records: Vec::new(),
            dry_run,
            setup_secs: 0.0,
            processing_secs: 0.0,
            statistics: LibraryStatistics::default(),
        }
    }

    fn record(&mut self, state: FileState) {
        self.scanned += 1;
        match state {
            FileState::Unhashable => self.unhashable += 1,
            FileState::Unmatched => self.unmatched += 1,
            FileState::Unchanged => {
                self.matched += 1;
                self.unchanged += 1;
            }
            FileState::Drifted => {
                self.matched += 1;
                self.drifted += 1;
            }
            FileState::Mutated => {
                self.matched += 1;
                self.drifted += 1;
                self.updated += 1;
            }
            FileState::MutationFailed => {
                self.matched += 1;
                self.drifted += 1;
                self.failed += 1;
            }
        }
    }

    /// Per-file errors of any kind
    pub fn errors(&self) -> usize {
        self.failed + self.unhashable
    }
}

pub struct Reconciler<'a, S: TagStore + ?Sized> {
    store: &'a S,
    preset: &'a Preset,
    options: &'a SyncOptions,
    cache: MetadataCache,
}

impl<'a, S: TagStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, preset: &'a Preset, options: &'a SyncOptions) -> Self {
        Self {
            store,
            preset,
            options,
            cache: MetadataCache::new(),
        }
    }

    pub fn cache(&mut self) -> &mut MetadataCache {
        &mut self.cache
    }

    /// Load every song's descriptor so latest-version checks see the whole
    /// library. Only presets with version rules need this.
    pub fn preload(&mut self, songs: &[PathBuf]) {
        for song in songs {
            self.cache.file_data(song, self.store);
        }
        self.cache.commit();
        debug!("Cached metadata for {} songs", self.cache.committed_len());
    }

    pub fn run(&mut self, songs: &[PathBuf], table: &mut LookupTable) -> SyncSummary {
        let start = Instant::now();
        let mut summary = SyncSummary::new(self.options.dry_run);

        if self.preset.needs_versions() {
            self.preload(songs);
        }
        for song in songs {
            let state = self.process_file(song, table);
            summary.record(state);
        }
        summary.processing_secs = start.elapsed().as_secs_f64();

        summary.records = table.len();
        summary.seen = table.seen_count();
        summary.unseen = summary.records - summary.seen;
        summary.missing = missing_status(summary.records, summary.seen, self.options.missing_slack);
        summary.missing_records = table
            .unseen()
            .map(|record| {
                format!(
                    "{} {}",
                    record.field(FieldMappings::TRACK),
                    record.field(FieldMappings::TITLE)
                )
            })
            .collect();
        summary.statistics = self.cache.statistics();

        self.report(&summary);
        summary
    }

    /// Take one file through the state machine
    pub fn process_file(&mut self, path: &Path, table: &mut LookupTable) -> FileState {
        let raw = match self.store.read_raw_descriptor(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        let embedded = EmbeddedDescriptor::from_payload(raw.as_deref());
        if let Some(descriptor) = embedded.descriptor() {
            self.cache.stage(path, descriptor.clone());
        }

        let embedded_id = embedded.field(FieldMappings::IDENTITY);
        let fp = if embedded_id.is_empty() {
            match fingerprint(path) {
                Some(fp) => fp,
                None => return FileState::Unhashable,
            }
        } else {
            embedded_id
        };
        debug!("{}: fingerprint {}", path.display(), fp);

        let Some(record) = table.mark_seen(&fp).cloned() else {
            debug!("{}: no remote record", path.display());
            return FileState::Unmatched;
        };

        let report = drift::compare(&fp, &embedded, &record);
        if !report.needs_update {
            return FileState::Unchanged;
        }
        info!(
            "{}: {} out of date",
            file_label(path),
            report.changed_fields().join(", ")
        );
        if self.options.dry_run {
            return FileState::Drifted;
        }

        self.cache.stage(path, report.normalized.to_descriptor());
        let meta = self.cache.metadata(path, self.store);
        let display = self.preset.derive(&meta);

        match mutation::apply(
            self.store,
            path,
            &report.normalized,
            &display,
            &self.options.rename_template,
        ) {
            Ok(target) => {
                if target != path {
                    self.cache.rename(path, &target, self.store);
                }
                FileState::Mutated
            }
            Err(e) => {
                error!("{}", e);
                FileState::MutationFailed
            }
        }
    }

    fn report(&self, summary: &SyncSummary) {
        info!("Run Ended");
        info!("Time to process all files: {:.2} seconds", summary.processing_secs);

        if summary.dry_run {
            info!("{} songs would be updated", summary.drifted);
        } else if summary.updated == 0 {
            info!("No song was changed");
        } else {
            info!("{} songs were updated", summary.updated);
        }
        if summary.errors() > 0 {
            warn!("{} songs could not be processed, check the log file for details", summary.errors());
        }

        match summary.missing {
            MissingStatus::ManyMissing => info!(
                "Many files are missing. If this is intentional, feel free to ignore this message."
            ),
            MissingStatus::UpToDate => info!("Your archive is fully up to date!"),
            MissingStatus::SomeMissing => {
                info!("Some files are missing, check the log file for details.");
                for missing in &summary.missing_records {
                    debug!("Missing {}", missing);
                }
            }
        }
        debug!("Library statistics: {:?}", summary.statistics);
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::records::RemoteRecord;
    use crate::rules::{Operator, Rule};
    use crate::tags::memory::MemoryTagStore;
    use std::fs;
    use tempfile::TempDir;

    const REMOTE: &str =
        r#"{"xxHash":"1234","Title":"Sound of Silence","Artist":"Disturbed","Version":"1"}"#;

    fn table(records: &[&str]) -> LookupTable {
        let mut table = LookupTable::new();
        for text in records {
            table.insert(RemoteRecord::parse(text).unwrap());
        }
        table
    }

    fn song(dir: &TempDir, name: &str, audio: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, audio).unwrap();
        path
    }

    #[test]
    fn test_missing_status() {
        assert_eq!(missing_status(0, 0, 150), MissingStatus::UpToDate);
        assert_eq!(missing_status(1000, 1000, 150), MissingStatus::UpToDate);
        assert_eq!(missing_status(1000, 900, 150), MissingStatus::SomeMissing);
        assert_eq!(missing_status(1000, 150, 150), MissingStatus::SomeMissing);
        assert_eq!(missing_status(1000, 149, 150), MissingStatus::ManyMissing);
        assert_eq!(missing_status(10, 9, 150), MissingStatus::ManyMissing);
        assert_eq!(missing_status(10, 9, 0), MissingStatus::SomeMissing);
    }

    #[test]
    fn test_drifted_file_is_rewritten_and_renamed() {
        let dir = TempDir::new().unwrap();
        let path = song(&dir, "track.mp3", b"audio");
        let store = MemoryTagStore::default()
            .with_payload(&path, r#"{"xxHash":"1234","Title":"Old Title"}"#);
        let mut table = table(&[REMOTE]);
        let preset = Preset::standard();
        let options = SyncOptions::default();

        let summary = Reconciler::new(&store, &preset, &options).run(&[path.clone()], &mut table);

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.seen, 1);
        assert_eq!(summary.missing, MissingStatus::UpToDate);

        let written = Descriptor::parse(&store.payload(&path).unwrap()).unwrap();
        assert_eq!(written.field("Title"), "Sound of Silence");
        assert_eq!(written.field("Artist"), "Disturbed");
        assert_eq!(written.field("Version"), "1");
        assert_eq!(store.standard(&path).title, "Sound of Silence");

        let renamed = dir.path().join("Sound of Silence - Disturbed.mp3");
        assert!(renamed.exists());
        assert!(!path.exists());
        assert_eq!(summary.statistics.all_songs, 1);
    }

    #[test]
    fn test_library_is_preloaded_only_for_version_rules() {
        let dir = TempDir::new().unwrap();
        let first = song(&dir, "first.mp3", b"a");
        let second = song(&dir, "second.mp3", b"b");
        let songs = vec![first.clone(), second.clone()];
        let options = SyncOptions::default();

        let store = MemoryTagStore::default()
            .with_payload(&first, REMOTE)
            .with_payload(&second, r#"{"xxHash":"77","Title":"Elsewhere"}"#);
        let preset = Preset::standard();
        let summary = Reconciler::new(&store, &preset, &options).run(&songs, &mut table(&[REMOTE]));
        assert_eq!(store.full_reads.get(), 0);
        assert_eq!(summary.statistics.all_songs, 2);

        let store = MemoryTagStore::default()
            .with_payload(&first, REMOTE)
            .with_payload(&second, r#"{"xxHash":"77","Title":"Elsewhere"}"#);
        let mut preset = Preset::standard();
        preset
            .album
            .push(Rule::new("title", Operator::IsLatestVersion, "", "Latest"));
        Reconciler::new(&store, &preset, &options).run(&songs, &mut table(&[REMOTE]));
        assert_eq!(store.full_reads.get(), 2);
    }

    #[test]
    fn test_unchanged_file_is_still_seen() {
        let dir = TempDir::new().unwrap();
        let path = song(&dir, "track.mp3", b"audio");
        let store = MemoryTagStore::default().with_payload(&path, REMOTE);
        let mut table = table(&[REMOTE]);
        let preset = Preset::standard();
        let options = SyncOptions::default();

        let mut reconciler = Reconciler::new(&store, &preset, &options);
        assert_eq!(reconciler.process_file(&path, &mut table), FileState::Unchanged);
        assert!(table.get("1234").unwrap().seen);
        assert!(path.exists());
    }

    #[test]
    fn test_content_hash_fallback() {
        let dir = TempDir::new().unwrap();
        let matched = song(&dir, "matched.mp3", b"some audio bytes");
        let stranger = song(&dir, "stranger.mp3", b"different audio");
        let fp = fingerprint(&matched).unwrap();

        let store = MemoryTagStore::default();
        let record = format!(r#"{{"xxHash":"{}","Title":"matched"}}"#, fp);
        let mut table = table(&[&record, REMOTE]);
        let preset = Preset::standard();
        let options = SyncOptions {
            rename_template: "{title}".to_string(),
            ..Default::default()
        };

        let mut reconciler = Reconciler::new(&store, &preset, &options);
        assert_eq!(reconciler.process_file(&stranger, &mut table), FileState::Unmatched);
        assert!(store.payload(&stranger).is_none());

        assert_eq!(reconciler.process_file(&matched, &mut table), FileState::Mutated);
        assert!(table.get(&fp).unwrap().seen);
        let written = Descriptor::parse(&store.payload(&matched).unwrap()).unwrap();
        assert_eq!(written.field("xxHash"), fp);
        // canonical name equals the current one
        assert!(matched.exists());
    }

    #[test]
    fn test_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let bad = song(&dir, "bad.mp3", b"a");
        let good = song(&dir, "good.mp3", b"b");
        let other = r#"{"xxHash":"5678","Title":"Other","Artist":"Band"}"#;
        let store = MemoryTagStore::default()
            .with_payload(&bad, r#"{"xxHash":"1234"}"#)
            .with_payload(&good, r#"{"xxHash":"5678"}"#)
            .failing_on(&bad);
        let mut table = table(&[REMOTE, other]);
        let preset = Preset::standard();
        let options = SyncOptions::default();

        let summary =
            Reconciler::new(&store, &preset, &options).run(&[bad.clone(), good], &mut table);

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.seen, 2);
        assert!(table.get("1234").unwrap().seen);
        assert!(bad.exists());
        assert!(dir.path().join("Other - Band.mp3").exists());
    }

    #[test]
    fn test_dry_run_leaves_files_alone() {
        let dir = TempDir::new().unwrap();
        let path = song(&dir, "track.mp3", b"audio");
        let old = r#"{"xxHash":"1234","Title":"Old Title"}"#;
        let store = MemoryTagStore::default().with_payload(&path, old);
        let mut table = table(&[REMOTE]);
        let preset = Preset::standard();
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let summary = Reconciler::new(&store, &preset, &options).run(&[path.clone()], &mut table);
        assert_eq!(summary.drifted, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(store.payload(&path).as_deref(), Some(old));
        assert!(path.exists());
    }

    #[test]
    fn test_unhashable_and_missing_records() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone.mp3");
        let store = MemoryTagStore::default();
        let mut table = table(&[
            REMOTE,
            r#"{"xxHash":"9","Track":"12/98","Title":"Absent"}"#,
        ]);
        let preset = Preset::standard();
        let options = SyncOptions {
            missing_slack: 0,
            ..Default::default()
        };

        let summary = Reconciler::new(&store, &preset, &options).run(&[gone], &mut table);
        assert_eq!(summary.unhashable, 1);
        assert_eq!(summary.errors(), 1);
        assert_eq!(summary.unseen, 2);
        assert_eq!(summary.missing, MissingStatus::SomeMissing);
        assert!(summary.missing_records.contains(&"12/98 Absent".to_string()));
        assert!(summary.seen <= summary.records);
    }
}
