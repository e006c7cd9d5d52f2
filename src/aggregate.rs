//! The entities written for one occurrence, before they have IDs.
//!
//! Foreign keys are not stored here: the writer fills them in from the
//! IDs generated earlier in the same unit of work.

use serde_json::Value;
use time::OffsetDateTime;

use crate::timezone::derive_offset;
use crate::Id;

/// A timestamp together with the offset string derived from it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventTime {
    pub at: Option<OffsetDateTime>,
    pub timezone: Option<String>,
}

impl EventTime {
    pub fn new(at: Option<OffsetDateTime>) -> Self {
        EventTime {
            at,
            timezone: derive_offset(at),
        }
    }
}

/// Every entity created for one submission.
#[derive(Clone, Debug)]
pub struct AggregateGraph {
    pub classification: Classification,
    pub place_name: PlaceName,
    pub place: Place,
    pub occurrence: Occurrence,
    pub observation: Observation,
    pub specimen: Option<SpecimenRecord>,
    pub identification: Option<Identification>,
}

/// Taxonomic ranks as a JSON object; ranks not provided are `null`.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub blob: Value,
}

/// A place name as a JSON object (`{"name": …}`).
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceName {
    pub blob: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    /// The encoded point, or `None` when no location was recorded.
    pub coordinates: Option<String>,
    pub accuracy: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Occurrence {
    pub project_id: Option<Id>,
    pub user_id: Id,
    pub individual_id: Option<Id>,
    pub lifestage: Option<String>,
    pub sex: Option<String>,
    pub body_length: Option<String>,
    pub created: EventTime,
    pub language_id: Option<Id>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub user_id: Id,
    pub method_id: Id,
    pub behavior: Option<String>,
    pub observed: EventTime,
}

/// A specimen and the event that prepared it. They only exist as a
/// pair.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecimenRecord {
    pub specimen: Specimen,
    pub preparation: SpecimenPreparation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Specimen {
    pub method_id: Id,
    pub institution_id: Id,
    pub collection_id: Id,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpecimenPreparation {
    pub user_id: Id,
    pub method_id: Id,
    pub prepared: EventTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Identification {
    pub user_id: Id,
    pub identified: EventTime,
    pub source_info: Option<String>,
}
