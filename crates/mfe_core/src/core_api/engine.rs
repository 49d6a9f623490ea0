use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{self, Multiplicity, ValidationError, ValueType};
use crate::parser;
use crate::patch::{self, SaveOptions, SaveReport};
use crate::record::{Field, Monster};
use crate::search;

use super::error::{CoreError, CoreErrorCode};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// An editing session over one data file.
///
/// Holds the records as last loaded or saved, plus a detached working copy
/// for every record touched since. Working copies are keyed by the record's
/// name at load time, so a rename is only visible in the file after saving.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    records: Vec<Monster>,
    edits: BTreeMap<String, Monster>,
    options: SaveOptions,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Parses every record in the file at `path`.
    ///
    /// A malformed field fails the whole load; no partial list is returned.
    pub fn load_all(&self, path: &Path) -> Result<Vec<Monster>, CoreError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        let records = parser::parse_str(&text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("failed to parse {}: {e}", path.display()),
            )
        })?;
        debug!(path = %path.display(), count = records.len(), "loaded data file");
        Ok(records)
    }

    /// Re-reads the file and filters it by name.
    pub fn search_file(&self, path: &Path, term: &str) -> Result<Vec<Monster>, CoreError> {
        let records = self.load_all(path)?;
        Ok(search::search(&records, term).into_iter().cloned().collect())
    }

    pub fn open(&self, path: impl Into<PathBuf>) -> Result<Session, CoreError> {
        self.open_with_options(path, SaveOptions::default())
    }

    pub fn open_with_options(
        &self,
        path: impl Into<PathBuf>,
        options: SaveOptions,
    ) -> Result<Session, CoreError> {
        let path = path.into();
        let records = self.load_all(&path)?;
        Ok(Session {
            path,
            records,
            edits: BTreeMap::new(),
            options,
        })
    }
}

impl Session {
    pub fn records(&self) -> &[Monster] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&Monster> {
        self.records.iter().find(|m| m.name == name)
    }

    pub fn search(&self, term: &str) -> Vec<&Monster> {
        search::search(&self.records, term)
    }

    pub fn working_copy(&self, name: &str) -> Option<&Monster> {
        self.edits.get(name)
    }

    /// The working copy if one exists, else the original.
    pub fn current(&self, name: &str) -> Option<&Monster> {
        self.working_copy(name).or_else(|| self.record(name))
    }

    pub fn is_modified(&self, name: &str) -> bool {
        self.edits.contains_key(name)
    }

    pub fn modified_names(&self) -> Vec<&str> {
        self.edits.keys().map(String::as_str).collect()
    }

    /// Drops the working copy for `name`. Returns whether one existed.
    pub fn cancel(&mut self, name: &str) -> bool {
        self.edits.remove(name).is_some()
    }

    /// Overwrites a single-value field on the working copy.
    pub fn set_field(&mut self, name: &str, field: Field, raw: &str) -> Result<(), CoreError> {
        require_multiplicity(field, Multiplicity::Single)?;
        self.edit(name, |copy| codec::apply(copy, field, raw))
    }

    /// Appends an entry to a repeatable field on the working copy.
    pub fn append_field(&mut self, name: &str, field: Field, raw: &str) -> Result<(), CoreError> {
        require_multiplicity(field, Multiplicity::Repeatable)?;
        self.edit(name, |copy| codec::apply(copy, field, raw))
    }

    /// Removes one entry of a repeatable field and returns it.
    pub fn remove_field_entry(
        &mut self,
        name: &str,
        field: Field,
        index: usize,
    ) -> Result<String, CoreError> {
        require_multiplicity(field, Multiplicity::Repeatable)?;
        self.edit(name, |copy| {
            let list = copy
                .list_mut(field)
                .ok_or_else(|| wrong_multiplicity(field, Multiplicity::Repeatable))?;
            if index >= list.len() {
                return Err(ValidationError::IndexOutOfRange {
                    field,
                    index,
                    len: list.len(),
                });
            }
            Ok(list.remove(index))
        })
    }

    /// Unsets a field on the working copy so it is omitted when encoded.
    pub fn clear_field(&mut self, name: &str, field: Field) -> Result<(), CoreError> {
        if field == Field::Name {
            return Err(ValidationError::EmptyName.into());
        }
        self.edit(name, |copy| {
            match codec::spec_for(field).value_type {
                ValueType::Integer => {
                    if let Some(slot) = copy.int_slot_mut(field) {
                        *slot = None;
                    }
                }
                ValueType::Text => {
                    if let Some(list) = copy.list_mut(field) {
                        list.clear();
                    } else if let Some(slot) = copy.text_slot_mut(field) {
                        *slot = None;
                    }
                }
            }
            Ok(())
        })
    }

    /// Writes one record back to the data file.
    ///
    /// Without a working copy the original is written as is. On success the
    /// original takes the saved values and the working copy is dropped.
    pub fn save_one(&mut self, name: &str) -> Result<SaveReport, CoreError> {
        let edited = match self.current(name) {
            Some(m) => m.clone(),
            None => return Err(CoreError::not_found(name)),
        };
        let report = patch::patch_one(&self.path, name, &edited, &self.options)?;
        self.commit(name, &edited);
        Ok(report)
    }

    /// Writes every record with a working copy in one pass.
    ///
    /// Records missing from the file keep their working copy and are listed
    /// in [`SaveReport::missing`].
    pub fn save_all(&mut self) -> Result<SaveReport, CoreError> {
        let by_name: HashMap<String, Monster> = self
            .edits
            .iter()
            .map(|(name, m)| (name.clone(), m.clone()))
            .collect();
        let report = patch::patch_batch(
            &self.path,
            self.edits.keys().map(String::as_str),
            &by_name,
            &self.options,
        )?;
        for name in &report.applied {
            if let Some(edited) = by_name.get(name) {
                self.commit(name, edited);
            }
        }
        Ok(report)
    }

    fn commit(&mut self, name: &str, edited: &Monster) {
        if let Some(original) = self.records.iter_mut().find(|m| m.name == name) {
            original.merge_from(edited);
        }
        self.edits.remove(name);
    }

    /// Runs `f` on a scratch clone of the current state of `name` and keeps
    /// the result as the working copy only if `f` succeeds.
    fn edit<R, F>(&mut self, name: &str, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Monster) -> Result<R, ValidationError>,
    {
        let mut copy = self
            .current(name)
            .cloned()
            .ok_or_else(|| CoreError::not_found(name))?;
        let out = f(&mut copy)?;
        self.edits.insert(name.to_string(), copy);
        Ok(out)
    }
}

fn require_multiplicity(field: Field, expected: Multiplicity) -> Result<(), ValidationError> {
    if codec::spec_for(field).multiplicity != expected {
        return Err(wrong_multiplicity(field, expected));
    }
    Ok(())
}

fn wrong_multiplicity(field: Field, expected: Multiplicity) -> ValidationError {
    ValidationError::WrongMultiplicity {
        field,
        expected: match expected {
            Multiplicity::Single => "a single-value field",
            Multiplicity::Repeatable => "a repeatable field",
        },
    }
}
