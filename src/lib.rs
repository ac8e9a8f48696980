// local-sync - keeps a local MP3 library in line with the Neuro Karaoke
// Archive metadata.
//
// Every song is identified by a hash of its audio payload (or the `xxHash`
// already stored in its descriptor), matched against the archive's records,
// and rewritten and renamed when its embedded descriptor has drifted.

pub mod cache;
pub mod cli;
pub mod descriptor;
pub mod drift;
pub mod error;
pub mod fetch;
pub mod field_mapping;
pub mod fingerprint;
pub mod id3;
pub mod logging;
pub mod metadata;
pub mod mutation;
pub mod records;
pub mod rules;
pub mod sync;
pub mod tags;
pub mod utils;

pub use cache::{LibraryStatistics, MetadataCache};
pub use descriptor::{get_raw, Descriptor, DescriptorLookup, EmbeddedDescriptor, NormalizedRecord};
pub use drift::{compare, DriftReport, FieldDiff};
pub use error::{SyncError, SyncResult};
pub use fetch::{ArchiveFetcher, ArchiveSource, FetchError, DEFAULT_ARCHIVE_URL};
pub use field_mapping::MetadataField;
pub use fingerprint::fingerprint;
pub use metadata::SongMetadata;
pub use records::{LookupTable, RecordEntry, RemoteRecord};
pub use rules::{DisplayTags, Preset, Rule, RuleSet};
pub use sync::{FileState, MissingStatus, Reconciler, SyncOptions, SyncSummary};
pub use tags::{Id3TagStore, StandardTags, TagStore, TagUpdate};
