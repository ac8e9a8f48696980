// Remote record store.
//
// The archive is a zip of `.hjson` documents, one per canonical song version.
// Records are keyed by their own `xxHash` field. A record that fails to parse
// or has no identity is logged and skipped; duplicate identities keep the
// entry read last.

use std::collections::HashMap;
use std::io::{Read, Seek};

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::descriptor::{value_to_string, DescriptorLookup};
use crate::error::{SyncError, SyncResult};
use crate::field_mapping::FieldMappings;
use crate::utils::encoding::decode_document;
use crate::utils::hjson::parse_document;

/// Archive entries with this suffix hold records
pub const RECORD_SUFFIX: &str = ".hjson";

/// One authoritative song version from the archive
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    fields: Map<String, Value>,
}

impl RemoteRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse one record document (HJSON, so plain JSON works too)
    pub fn parse(text: &str) -> Result<Self, String> {
        match parse_document(text) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            Ok(_) => Err("record is not an object".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// The record's fingerprint, if it carries one
    pub fn identity(&self) -> Option<String> {
        self.fields
            .get(FieldMappings::IDENTITY)
            .map(value_to_string)
            .filter(|id| !id.is_empty())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl DescriptorLookup for RemoteRecord {
    fn field(&self, key: &str) -> String {
        self.fields.get(key).map(value_to_string).unwrap_or_default()
    }
}

/// A record plus whether a local file matched it this run
#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub record: RemoteRecord,
    pub seen: bool,
}

/// fingerprint -> record, built fresh for every run. Iteration follows
/// archive order.
#[derive(Debug, Default)]
pub struct LookupTable {
    entries: Vec<RecordEntry>,
    index: HashMap<String, usize>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record entry from a zip archive
    pub fn from_archive<R: Read + Seek>(reader: R) -> SyncResult<Self> {
        let mut archive =
            zip::ZipArchive::new(reader).map_err(|e| SyncError::Archive(e.to_string()))?;
        let mut table = Self::new();

        for i in 0..archive.len() {
            let (name, content) = {
                let mut file = match archive.by_index(i) {
                    Ok(file) => file,
                    Err(e) => {
                        error!("Unable to open archive entry #{}: {}", i, e);
                        continue;
                    }
                };

                let name = file.name().to_string();
                if file.is_dir() || !name.ends_with(RECORD_SUFFIX) {
                    continue;
                }

                let mut content = Vec::new();
                if let Err(e) = file.read_to_end(&mut content) {
                    let err = SyncError::RecordParse {
                        entry: name,
                        reason: e.to_string(),
                    };
                    error!("{}", err);
                    continue;
                }
                (name, content)
            };

            if let Err(e) = table.load_entry(&name, &content) {
                error!("{}", e);
            }
        }

        debug!("Loaded {} remote records", table.len());
        Ok(table)
    }

    /// Parse one archive entry into the table
    pub fn load_entry(&mut self, name: &str, content: &[u8]) -> SyncResult<()> {
        let text = decode_document(content);
        let record = RemoteRecord::parse(&text).map_err(|reason| SyncError::RecordParse {
            entry: entry_basename(name).to_string(),
            reason,
        })?;

        if !self.insert(record) {
            warn!("Record {} has no {} field, skipping", name, FieldMappings::IDENTITY);
        }
        Ok(())
    }

    /// Insert a record under its identity. Returns false when it has none.
    pub fn insert(&mut self, record: RemoteRecord) -> bool {
        let Some(identity) = record.identity() else {
            return false;
        };

        let entry = RecordEntry {
            record,
            seen: false,
        };
        match self.index.get(&identity) {
            Some(&slot) => {
                debug!("Duplicate record for {}, keeping the later entry", identity);
                self.entries[slot] = entry;
            }
            None => {
                self.index.insert(identity, self.entries.len());
                self.entries.push(entry);
            }
        }
        true
    }

    pub fn get(&self, fingerprint: &str) -> Option<&RecordEntry> {
        self.index.get(fingerprint).map(|&slot| &self.entries[slot])
    }

    /// Look up a fingerprint and flag the record as seen
    pub fn mark_seen(&mut self, fingerprint: &str) -> Option<&RemoteRecord> {
        let slot = *self.index.get(fingerprint)?;
        let entry = &mut self.entries[slot];
        entry.seen = true;
        Some(&entry.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn seen_count(&self) -> usize {
        self.entries.iter().filter(|e| e.seen).count()
    }

    pub fn unseen(&self) -> impl Iterator<Item = &RemoteRecord> {
        self.entries.iter().filter(|e| !e.seen).map(|e| &e.record)
    }
}

fn entry_basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip from (name, content) pairs
    pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
