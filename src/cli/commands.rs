// CLI command implementations
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use tracing::{error, info};

use crate::cli::config::{find_songs, resolve_songs_directory, Config, DirectoryPicker, PathConfig};
use crate::error::{SyncError, SyncResult};
use crate::fetch::{ArchiveFetcher, ArchiveSource};
use crate::records::LookupTable;
use crate::rules::{find_preset, Preset};
use crate::sync::{Reconciler, SyncSummary};
use crate::tags::TagStore;

/// Load the preset named on the command line, else the first one found in
/// the state directory, else the standard title/artist preset
pub fn load_preset(explicit: Option<&Path>, state_dir: &Path) -> Preset {
    let path = explicit.map(Path::to_path_buf).or_else(|| find_preset(state_dir));
    match path {
        None => Preset::standard(),
        Some(path) => Preset::load(&path).unwrap_or_else(|e| {
            error!("Unable to load with preset! {}", e);
            Preset::standard()
        }),
    }
}

/// Fetch and index the archive
pub fn load_records(source: &ArchiveSource) -> SyncResult<LookupTable> {
    let bytes = ArchiveFetcher::new()
        .and_then(|fetcher| fetcher.fetch(source))
        .map_err(|e| {
            error!("{}", e);
            SyncError::FatalSetup("Failed to retrieve zip data.".to_string())
        })?;
    let table = LookupTable::from_archive(Cursor::new(bytes))?;
    info!("Records loaded: {}", table.len());
    Ok(table)
}

/// One full run: archive, songs directory, reconciliation
pub fn run_sync<S>(
    config: &Config,
    store: &S,
    picker: &dyn DirectoryPicker,
) -> SyncResult<SyncSummary>
where
    S: TagStore + ?Sized,
{
    info!("Run start");
    let start = Instant::now();
    let state_dir = config.state_dir();

    let mut table = load_records(&config.archive_source())?;
    let preset = load_preset(config.preset.as_deref(), &state_dir);

    let saved = PathConfig::new(&state_dir);
    let songs_dir = resolve_songs_directory(config.path.as_deref(), &saved, picker).ok_or_else(
        || SyncError::FatalSetup("Unable to retrieve path information, ending program".to_string()),
    )?;
    saved.save(&songs_dir);

    let songs = find_songs(&songs_dir);
    if songs.is_empty() {
        return Err(SyncError::FatalSetup(
            "No song files found, please verify path".to_string(),
        ));
    }
    info!("Songs Found: {}", songs.len());

    let setup_secs = start.elapsed().as_secs_f64();
    let options = config.sync_options();
    let mut summary = Reconciler::new(store, &preset, &options).run(&songs, &mut table);
    summary.setup_secs = setup_secs;
    Ok(summary)
}
