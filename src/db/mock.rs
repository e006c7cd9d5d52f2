use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::{Db, StoredOccurrence, UnitOfWork};
use crate::aggregate::{
    Classification, Identification, Observation, Occurrence, Place, PlaceName, Specimen,
    SpecimenPreparation,
};
use crate::attachment::NewAttachment;
use crate::errors::BackendError;
use crate::geo;
use crate::Id;

/// The operations a [`MockDb`] can be told to fail.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum Operation {
    Classification,
    PlaceName,
    Place,
    Occurrence,
    Observation,
    Specimen,
    SpecimenPreparation,
    Identification,
    FindExtension,
    Attachment,
    AttachmentGroup,
    Commit,
}

impl Operation {
    pub(crate) fn aggregate_steps() -> [Operation; 8] {
        use Operation::*;

        [
            Classification,
            PlaceName,
            Place,
            Occurrence,
            Observation,
            Specimen,
            SpecimenPreparation,
            Identification,
        ]
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PlaceRow {
    pub(crate) coordinates: Option<String>,
    pub(crate) place_name_id: Id,
}

#[derive(Clone, Debug)]
pub(crate) struct OccurrenceRow {
    pub(crate) occurrence: Occurrence,
    pub(crate) classification_id: Id,
    pub(crate) place_id: Id,
}

#[derive(Clone, Debug)]
pub(crate) struct PreparationRow {
    pub(crate) occurrence_id: Id,
    pub(crate) specimen_id: Id,
}

#[derive(Clone, Debug)]
pub(crate) struct AttachmentGroupRow {
    pub(crate) occurrence_id: Id,
    pub(crate) attachment_id: Id,
}

/// Rows keyed by ID. Rows that reference an occurrence store its ID.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tables {
    pub(crate) classifications: BTreeMap<Id, Value>,
    pub(crate) place_names: BTreeMap<Id, Value>,
    pub(crate) places: BTreeMap<Id, PlaceRow>,
    pub(crate) occurrences: BTreeMap<Id, OccurrenceRow>,
    pub(crate) observations: BTreeMap<Id, Id>,
    pub(crate) specimens: BTreeMap<Id, Id>,
    pub(crate) specimen_preparations: BTreeMap<Id, PreparationRow>,
    pub(crate) identifications: BTreeMap<Id, Id>,
    pub(crate) attachments: BTreeMap<Id, NewAttachment>,
    pub(crate) attachment_groups: BTreeMap<Id, AttachmentGroupRow>,
}

impl Tables {
    pub(crate) fn row_count(&self) -> usize {
        self.classifications.len()
            + self.place_names.len()
            + self.places.len()
            + self.occurrences.len()
            + self.observations.len()
            + self.specimens.len()
            + self.specimen_preparations.len()
            + self.identifications.len()
            + self.attachments.len()
            + self.attachment_groups.len()
    }

    fn absorb(&mut self, staged: Tables) {
        self.classifications.extend(staged.classifications);
        self.place_names.extend(staged.place_names);
        self.places.extend(staged.places);
        self.occurrences.extend(staged.occurrences);
        self.observations.extend(staged.observations);
        self.specimens.extend(staged.specimens);
        self.specimen_preparations.extend(staged.specimen_preparations);
        self.identifications.extend(staged.identifications);
        self.attachments.extend(staged.attachments);
        self.attachment_groups.extend(staged.attachment_groups);
    }
}

#[derive(Default)]
struct State {
    committed: Tables,
    extensions: HashMap<String, Id>,
    next_id: Id,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, usize>,
    rollbacks: usize,
}

impl State {
    /// Counts a call to `operation` and fails it if it was scheduled
    /// to fail.
    fn call(&mut self, operation: Operation) -> Result<(), BackendError> {
        let count = self.calls.entry(operation).or_insert(0);
        *count += 1;
        let count = *count;

        if self.failures.get(&operation) == Some(&count) {
            let message = format!("injected failure in {:?}", operation);
            return Err(BackendError::Sqlx {
                source: sqlx::Error::Protocol(message),
            });
        }

        Ok(())
    }

    /// Hands out IDs the way a sequence does: never reused, even after
    /// a rollback.
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory database. Each unit of work stages its rows and
/// applies them on commit.
#[derive(Default)]
pub(crate) struct MockDb {
    state: Arc<Mutex<State>>,
}

impl MockDb {
    pub(crate) fn new() -> Self {
        let db = MockDb::default();

        {
            let mut state = db.state.lock().unwrap();
            for (id, extension) in [".jpg", ".png", ".pdf"].iter().enumerate() {
                state.extensions.insert(extension.to_string(), id as Id + 1);
            }
        }

        db
    }

    /// Makes the `nth` call (counting from 1) to `operation` fail.
    pub(crate) fn fail_on(&self, operation: Operation, nth: usize) {
        self.state.lock().unwrap().failures.insert(operation, nth);
    }

    pub(crate) fn committed(&self) -> Tables {
        self.state.lock().unwrap().committed.clone()
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }
}

impl Db for MockDb {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, BackendError>> {
        let uow = MockUnitOfWork {
            state: self.state.clone(),
            staged: Tables::default(),
        };

        async move { Ok(Box::new(uow) as Box<dyn UnitOfWork>) }.boxed()
    }

    fn retrieve_occurrence(
        &self,
        id: Id,
    ) -> BoxFuture<'_, Result<Option<StoredOccurrence>, BackendError>> {
        let result = stored_occurrence(&self.state.lock().unwrap().committed, id);

        async move { result }.boxed()
    }
}

fn stored_occurrence(tables: &Tables, id: Id) -> Result<Option<StoredOccurrence>, BackendError> {
    let row = match tables.occurrences.get(&id) {
        Some(row) => row,
        None => return Ok(None),
    };

    let place = &tables.places[&row.place_id];
    let count = |map: &BTreeMap<Id, Id>| map.values().filter(|o| **o == id).count() as i64;

    Ok(Some(StoredOccurrence {
        id,
        classification_id: row.classification_id,
        place_id: row.place_id,
        classification: tables.classifications[&row.classification_id].clone(),
        place_name: tables.place_names[&place.place_name_id].clone(),
        point: geo::decode_option(place.coordinates.as_deref())?,
        observations: count(&tables.observations),
        specimens: count(&tables.specimens),
        specimen_preparations: tables
            .specimen_preparations
            .values()
            .filter(|p| p.occurrence_id == id)
            .count() as i64,
        identifications: count(&tables.identifications),
        attachments: tables
            .attachment_groups
            .values()
            .filter(|g| g.occurrence_id == id)
            .map(|g| g.attachment_id)
            .collect(),
    }))
}

pub(crate) struct MockUnitOfWork {
    state: Arc<Mutex<State>>,
    staged: Tables,
}

impl MockUnitOfWork {
    fn insert<T>(
        &mut self,
        operation: Operation,
        table: impl FnOnce(&mut Tables) -> &mut BTreeMap<Id, T>,
        row: T,
    ) -> Result<Id, BackendError> {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.call(operation)?;
            state.next_id()
        };

        table(&mut self.staged).insert(id, row);

        Ok(id)
    }

    fn occurrence_exists(&self, id: Id) -> bool {
        self.staged.occurrences.contains_key(&id)
            || self.state.lock().unwrap().committed.occurrences.contains_key(&id)
    }
}

impl UnitOfWork for MockUnitOfWork {
    fn insert_classification<'a>(
        &'a mut self,
        classification: &'a Classification,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(
            Operation::Classification,
            |t| &mut t.classifications,
            classification.blob.clone(),
        );

        async move { result }.boxed()
    }

    fn insert_place_name<'a>(
        &'a mut self,
        place_name: &'a PlaceName,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(
            Operation::PlaceName,
            |t| &mut t.place_names,
            place_name.blob.clone(),
        );

        async move { result }.boxed()
    }

    fn insert_place<'a>(
        &'a mut self,
        place: &'a Place,
        place_name_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let row = PlaceRow {
            coordinates: place.coordinates.clone(),
            place_name_id,
        };
        let result = self.insert(Operation::Place, |t| &mut t.places, row);

        async move { result }.boxed()
    }

    fn insert_occurrence<'a>(
        &'a mut self,
        occurrence: &'a Occurrence,
        classification_id: Id,
        place_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let row = OccurrenceRow {
            occurrence: occurrence.clone(),
            classification_id,
            place_id,
        };
        let result = self.insert(Operation::Occurrence, |t| &mut t.occurrences, row);

        async move { result }.boxed()
    }

    fn insert_observation<'a>(
        &'a mut self,
        _observation: &'a Observation,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(
            Operation::Observation,
            |t| &mut t.observations,
            occurrence_id,
        );

        async move { result }.boxed()
    }

    fn insert_specimen<'a>(
        &'a mut self,
        _specimen: &'a Specimen,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(Operation::Specimen, |t| &mut t.specimens, occurrence_id);

        async move { result }.boxed()
    }

    fn insert_specimen_preparation<'a>(
        &'a mut self,
        _preparation: &'a SpecimenPreparation,
        occurrence_id: Id,
        specimen_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let row = PreparationRow {
            occurrence_id,
            specimen_id,
        };
        let result = self.insert(
            Operation::SpecimenPreparation,
            |t| &mut t.specimen_preparations,
            row,
        );

        async move { result }.boxed()
    }

    fn insert_identification<'a>(
        &'a mut self,
        _identification: &'a Identification,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(
            Operation::Identification,
            |t| &mut t.identifications,
            occurrence_id,
        );

        async move { result }.boxed()
    }

    fn find_extension<'a>(
        &'a mut self,
        extension: &'a str,
    ) -> BoxFuture<'a, Result<Option<Id>, BackendError>> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state
                .call(Operation::FindExtension)
                .map(|_| state.extensions.get(extension).copied())
        };

        async move { result }.boxed()
    }

    fn insert_attachment<'a>(
        &'a mut self,
        attachment: &'a NewAttachment,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = self.insert(
            Operation::Attachment,
            |t| &mut t.attachments,
            attachment.clone(),
        );

        async move { result }.boxed()
    }

    fn insert_attachment_group<'a>(
        &'a mut self,
        occurrence_id: Id,
        attachment_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>> {
        let result = if self.occurrence_exists(occurrence_id) {
            let row = AttachmentGroupRow {
                occurrence_id,
                attachment_id,
            };
            self.insert(Operation::AttachmentGroup, |t| &mut t.attachment_groups, row)
        } else {
            Err(BackendError::NonExistentOccurrence(occurrence_id))
        };

        async move { result }.boxed()
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
        let MockUnitOfWork { state, staged } = *self;

        let result = {
            let mut state = state.lock().unwrap();

            match state.call(Operation::Commit) {
                Ok(()) => {
                    state.committed.absorb(staged);
                    Ok(())
                }
                Err(e) => {
                    state.rollbacks += 1;
                    Err(e)
                }
            }
        };

        async move { result }.boxed()
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
        self.state.lock().unwrap().rollbacks += 1;

        async move { Ok(()) }.boxed()
    }
}
