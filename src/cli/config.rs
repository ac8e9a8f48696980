// CLI configuration
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::fetch::ArchiveSource;
use crate::logging::Verbosity;
use crate::mutation::DEFAULT_RENAME_TEMPLATE;
use crate::sync::{SyncOptions, DEFAULT_MISSING_SLACK};

/// File in the state directory remembering the last songs directory
pub const PATH_CONFIG_FILE: &str = "path_config.txt";

/// local-sync - Neuro Karaoke Archive metadata synchronizer
#[derive(Parser, Debug)]
#[command(name = "local-sync")]
#[command(about = "Neuro Karaoke Archive metadata synchronizer.", long_about = None)]
#[command(version)]
pub struct Config {
    /// Songs directory (overrides the saved one)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Metadata archive: a local zip or an alternate URL
    #[arg(long, value_name = "FILE|URL")]
    pub archive: Option<String>,

    /// Rule preset for display tags (HJSON or JSON)
    #[arg(long, value_name = "FILE")]
    pub preset: Option<PathBuf>,

    /// Directory holding path_config.txt and sync_log.txt
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// How many archive records may go unmatched before the library counts as mostly missing
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MISSING_SLACK)]
    pub missing_slack: usize,

    /// Template for canonical file names
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_RENAME_TEMPLATE)]
    pub rename_template: String,

    /// Report drift without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Summary output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (show per-file details)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format for the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned key/value table
    #[default]
    Pretty,
    /// Compact JSON
    Json,
}

impl Config {
    /// State directory: `--state-dir`, else the executable's directory
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    pub fn archive_source(&self) -> ArchiveSource {
        ArchiveSource::from_arg(self.archive.as_deref())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            rename_template: self.rename_template.clone(),
            missing_slack: self.missing_slack,
            dry_run: self.dry_run,
        }
    }
}

/// The saved songs directory
#[derive(Debug, Clone)]
pub struct PathConfig {
    file: PathBuf,
}

impl PathConfig {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            file: state_dir.join(PATH_CONFIG_FILE),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    pub fn load(&self) -> Option<PathBuf> {
        match fs::read_to_string(&self.file) {
            Ok(content) => {
                let content = content.trim();
                (!content.is_empty()).then(|| PathBuf::from(content))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                error!("Unable to load {}: {}", self.file.display(), e);
                None
            }
        }
    }

    /// Write `directory` unless it is already the saved value. Returns whether
    /// the file was written.
    pub fn save(&self, directory: &Path) -> bool {
        if self.load().as_deref() == Some(directory) {
            return false;
        }
        match fs::write(&self.file, directory.to_string_lossy().as_bytes()) {
            Ok(()) => {
                debug!("Saved songs directory to {}", self.file.display());
                true
            }
            Err(e) => {
                error!("Unable to save path to disk: {}", e);
                false
            }
        }
    }
}

/// Interactive fallback when no songs directory is configured
pub trait DirectoryPicker {
    fn pick(&self) -> Option<PathBuf>;
}

/// Prompts on stdin, only when stdin is a terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPicker;

impl DirectoryPicker for StdinPicker {
    fn pick(&self) -> Option<PathBuf> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            error!("Interactive selection unavailable. Please pass the path as an argument!");
            return None;
        }

        eprint!("Select the Neuro songs location: ");
        io::stderr().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() {
            return None;
        }
        let line = line.trim();
        if line.is_empty() {
            info!("No folder path selected");
            return None;
        }
        debug!("Selected folder path: {}", line);
        Some(PathBuf::from(line))
    }
}

/// Songs directory by priority: `--path`, the saved path, then the picker.
/// Each candidate must be an existing directory.
pub fn resolve_songs_directory(
    arg: Option<&Path>,
    saved: &PathConfig,
    picker: &dyn DirectoryPicker,
) -> Option<PathBuf> {
    if let Some(path) = arg.filter(|p| p.is_dir()) {
        return Some(path.to_path_buf());
    }
    if let Some(path) = saved.load().filter(|p| p.is_dir()) {
        return Some(path);
    }
    debug!("No path configuration found, loading selection prompt");
    picker.pick().filter(|p| p.is_dir())
}

/// Every `*.mp3` under `dir`, recursively, sorted
pub fn find_songs(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*.mp3", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut songs: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            error!("Invalid songs directory pattern: {}", e);
            Vec::new()
        }
    };
    songs.sort();
    songs
}
