// Job record stored by the shop

use serde::{Deserialize, Serialize};

/// Prefix of machine-generated record ids (`rec-<epoch millis>`)
pub const ID_PREFIX: &str = "rec-";

/// A single customer job.
///
/// Field names on the wire match the blobs written by the browser form
/// application (`ammount`, `returnDate`), so existing data loads unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Record {
    pub id: String,
    pub date: String,
    pub name: String,
    pub mobile: String,
    pub address: String,
    pub model: String,
    pub problem: String,
    pub ammount: String,
    pub status: String,
    pub return_date: String,
    /// Creation time in milliseconds since epoch; absent on legacy records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Record {
    /// Build the id for a record created at `ts` (milliseconds since epoch)
    pub fn generate_id(ts: i64) -> String {
        format!("{}{}", ID_PREFIX, ts)
    }

    /// Ordering key used for eviction.
    ///
    /// Prefers the stored creation timestamp. Legacy records fall back to the
    /// numeric suffix of a `rec-<n>` id; anything else is treated as `0`, the
    /// oldest possible age, so hand-entered ids go first under pressure.
    pub fn age_key(&self) -> i64 {
        if let Some(ts) = self.created_at {
            return ts;
        }
        self.id
            .strip_prefix(ID_PREFIX)
            .and_then(|rest| rest.split('-').next())
            .and_then(|n| n.parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// Raw field values as submitted from the entry form.
///
/// An empty `id` means "create"; a non-empty one means "update the record
/// with exactly this id".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordForm {
    pub id: String,
    pub date: String,
    pub name: String,
    pub mobile: String,
    pub address: String,
    pub model: String,
    pub problem: String,
    pub ammount: String,
    pub status: String,
    pub return_date: String,
}

impl RecordForm {
    /// Check the form before anything is written
    pub fn validate(&self) -> Result<(), crate::validate::ValidationError> {
        crate::validate::validate_mobile(&self.mobile)
    }

    /// True when this submission targets an existing record
    pub fn is_update(&self) -> bool {
        !self.id.is_empty()
    }

    /// Populate a form from a stored record, e.g. for editing
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            date: record.date.clone(),
            name: record.name.clone(),
            mobile: record.mobile.clone(),
            address: record.address.clone(),
            model: record.model.clone(),
            problem: record.problem.clone(),
            ammount: record.ammount.clone(),
            status: record.status.clone(),
            return_date: record.return_date.clone(),
        }
    }
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
