// Field-by-field comparison of a file's embedded descriptor against its
// matched remote record.

use tracing::debug;

use crate::descriptor::{DescriptorLookup, NormalizedRecord};
use crate::records::RemoteRecord;

/// One field whose embedded value differs from the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: String,
    pub current: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub needs_update: bool,
    pub normalized: NormalizedRecord,
    pub differences: Vec<FieldDiff>,
}

impl DriftReport {
    /// Differing field names, for log lines
    pub fn changed_fields(&self) -> Vec<&str> {
        self.differences.iter().map(|d| d.field.as_str()).collect()
    }
}

/// Compare every field of `remote` against `embedded`.
///
/// Fields missing from the embedded descriptor read as "". Fields present
/// only in the embedded descriptor are ignored; the rewrite replaces them.
pub fn compare<D>(local_fingerprint: &str, embedded: &D, remote: &RemoteRecord) -> DriftReport
where
    D: DescriptorLookup + ?Sized,
{
    let normalized = NormalizedRecord::from_fields(remote.fields());

    let differences: Vec<FieldDiff> = normalized
        .iter()
        .filter_map(|(field, expected)| {
            let current = embedded.field(field);
            (current != expected).then(|| FieldDiff {
                field: field.to_string(),
                current,
                expected: expected.to_string(),
            })
        })
        .collect();

    for diff in &differences {
        debug!(
            "{}: {} differs ({:?} -> {:?})",
            local_fingerprint, diff.field, diff.current, diff.expected
        );
    }

    DriftReport {
        needs_update: !differences.is_empty(),
        normalized,
        differences,
    }
}
