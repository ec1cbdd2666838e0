// Record book: the operations the entry form and table call into

use crate::backend::StorageBackend;
use crate::dates::{to_canonical, to_display};
use crate::message::{DEFAULT_SHOP_NAME, compose_message};
use crate::record::{Record, RecordForm, now_ms};
use crate::search::rank;
use crate::store::{LoadError, SaveError, SaveOutcome, Store};
use crate::validate::ValidationError;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BookError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no record with id '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Save(#[from] SaveError),
}

/// What a form submission did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub id: String,
    pub created: bool,
    pub save: SaveOutcome,
}

/// One table row with dates in display form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
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

impl From<&Record> for DisplayRow {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id.clone(),
            date: to_display(&r.date),
            name: r.name.clone(),
            mobile: r.mobile.clone(),
            address: r.address.clone(),
            model: r.model.clone(),
            problem: r.problem.clone(),
            ammount: r.ammount.clone(),
            status: r.status.clone(),
            return_date: to_display(&r.return_date),
        }
    }
}

/// Create, update, delete and search records over a `Store`.
///
/// Each call reads the whole collection, changes it in memory and writes it
/// back. A rejected form or unknown update id writes nothing. Mutations
/// refuse to run over a collection that cannot be read or parsed, while the
/// read-only queries treat it as empty.
pub struct RecordBook<B: StorageBackend> {
    store: Store<B>,
    shop_name: String,
    clock: Box<dyn Fn() -> i64>,
}

impl<B: StorageBackend> RecordBook<B> {
    pub fn new(store: Store<B>) -> Self {
        Self {
            store,
            shop_name: DEFAULT_SHOP_NAME.to_string(),
            clock: Box::new(now_ms),
        }
    }

    pub fn with_shop_name(mut self, shop_name: impl Into<String>) -> Self {
        self.shop_name = shop_name.into();
        self
    }

    /// Replace the millisecond clock used for new ids
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &Store<B> {
        &self.store
    }

    /// Save a submitted form.
    ///
    /// An empty id creates a new record with a generated `rec-<millis>` id
    /// appended at the end; otherwise the record with that exact id is
    /// replaced in place, keeping its creation time.
    pub fn submit_form(&self, form: RecordForm) -> Result<SubmitOutcome, BookError> {
        form.validate()?;
        let created = !form.is_update();

        let mut records = self.store.load_checked()?;
        let mut record = Record {
            id: form.id.clone(),
            date: to_canonical(&form.date),
            name: form.name,
            mobile: form.mobile,
            address: form.address,
            model: form.model,
            problem: form.problem,
            ammount: form.ammount,
            status: form.status,
            return_date: to_canonical(&form.return_date),
            created_at: None,
        };

        if created {
            let now = (self.clock)();
            record.id = Record::generate_id(now);
            record.created_at = Some(now);
        } else {
            let slot = records
                .iter_mut()
                .find(|r| r.id == form.id)
                .ok_or_else(|| BookError::NotFound(form.id.clone()))?;
            record.created_at = slot.created_at;
            *slot = record.clone();
        }

        let id = record.id.clone();
        debug!(id = %id, created, "submit_form: writing record");
        if created {
            records.push(record);
        }

        let save = self.store.save(records)?;
        Ok(SubmitOutcome { id, created, save })
    }

    /// Delete the record with this exact id
    pub fn delete(&self, id: &str) -> Result<SaveOutcome, BookError> {
        self.delete_many(&[id])
    }

    /// Delete every record whose id is in `ids`; the rest keep their order
    pub fn delete_many<S: AsRef<str>>(&self, ids: &[S]) -> Result<SaveOutcome, BookError> {
        let doomed: HashSet<&str> = ids.iter().map(|s| s.as_ref()).collect();
        let records = self.store.load_checked()?;
        let before = records.len();

        let kept: Vec<Record> = records.into_iter().filter(|r| !doomed.contains(r.id.as_str())).collect();
        info!(requested = doomed.len(), deleted = before - kept.len(), "Deleting records");

        Ok(self.store.save(kept)?)
    }

    /// Records matching `query`, best match first; everything for an empty query
    pub fn search(&self, query: &str) -> Vec<Record> {
        rank(self.store.load(), query)
    }

    /// Table rows for `query` with display-form dates
    pub fn display_rows(&self, query: &str) -> Vec<DisplayRow> {
        self.search(query).iter().map(DisplayRow::from).collect()
    }

    /// Record to load into the form, dates in canonical form for date inputs
    pub fn edit(&self, id: &str) -> Option<Record> {
        self.find(id).map(|mut r| {
            r.date = to_canonical(&r.date);
            r.return_date = to_canonical(&r.return_date);
            r
        })
    }

    /// Customer message for the record with this id
    pub fn message(&self, id: &str) -> Option<String> {
        self.find(id).map(|r| compose_message(&r, &self.shop_name))
    }

    fn find(&self, id: &str) -> Option<Record> {
        self.store.load().into_iter().find(|r| r.id == id)
    }
}
