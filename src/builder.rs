use serde::Serialize;
use serde_json::Value;

use crate::aggregate::{
    AggregateGraph, Classification, EventTime, Identification, Observation, Occurrence, Place,
    PlaceName, Specimen, SpecimenPreparation, SpecimenRecord,
};
use crate::errors::BackendError;
use crate::geo::{self, GeoPoint};
use crate::submission::{ClassificationInput, Submission};

/// The stored shape of a classification. Field order is the order the
/// ranks appear in the blob.
#[derive(Serialize)]
struct ClassificationBlob<'a> {
    species: Option<&'a str>,
    genus: Option<&'a str>,
    family: Option<&'a str>,
    order: Option<&'a str>,
    class: Option<&'a str>,
    phylum: Option<&'a str>,
    kingdom: Option<&'a str>,
    others: Option<&'a str>,
}

impl<'a> From<&'a ClassificationInput> for ClassificationBlob<'a> {
    fn from(c: &'a ClassificationInput) -> Self {
        ClassificationBlob {
            species: c.species.as_deref(),
            genus: c.genus.as_deref(),
            family: c.family.as_deref(),
            order: c.order.as_deref(),
            class: c.class.as_deref(),
            phylum: c.phylum.as_deref(),
            kingdom: c.kingdom.as_deref(),
            others: c.others.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct PlaceNameBlob<'a> {
    name: Option<&'a str>,
}

/// Maps a submission onto the entities to create. Performs no I/O.
///
/// Fails only if the coordinates are a partial or non-finite point, or
/// if a blob cannot be serialized.
pub fn build(submission: &Submission) -> Result<AggregateGraph, BackendError> {
    let classification = Classification {
        blob: to_blob("classification", &ClassificationBlob::from(&submission.classification))?,
    };

    let place_name = PlaceName {
        blob: to_blob(
            "place name",
            &PlaceNameBlob {
                name: submission.place_name.as_deref(),
            },
        )?,
    };

    let point = GeoPoint {
        lat: submission.latitude,
        lng: submission.longitude,
    };
    let place = Place {
        coordinates: geo::encode(&point)?,
        accuracy: submission.accuracy,
    };

    let occurrence = Occurrence {
        project_id: submission.project_id,
        user_id: submission.user_id,
        individual_id: submission.individual_id,
        lifestage: submission.lifestage.clone(),
        sex: submission.sex.clone(),
        body_length: submission.body_length.clone(),
        created: EventTime::new(submission.created_at),
        language_id: submission.language_id,
        note: submission.note.clone(),
    };

    let observation = Observation {
        user_id: submission.observation.observation_user_id,
        method_id: submission.observation.observation_method_id,
        behavior: submission.observation.behavior.clone(),
        observed: EventTime::new(submission.observation.observed_at),
    };

    let specimen = submission.specimen.as_ref().map(|s| SpecimenRecord {
        specimen: Specimen {
            method_id: s.specimen_methods_id,
            institution_id: s.institution_id,
            collection_id: s.collection_id,
        },
        preparation: SpecimenPreparation {
            user_id: s.specimen_user_id,
            method_id: s.specimen_methods_id,
            prepared: EventTime::new(s.created_at),
        },
    });

    let identification = submission
        .identification
        .as_ref()
        .map(|i| Identification {
            user_id: i.identification_user_id,
            identified: EventTime::new(i.identified_at),
            source_info: i.source_info.clone(),
        });

    Ok(AggregateGraph {
        classification,
        place_name,
        place,
        occurrence,
        observation,
        specimen,
        identification,
    })
}

fn to_blob(entity: &'static str, value: &impl Serialize) -> Result<Value, BackendError> {
    serde_json::to_value(value).map_err(|source| BackendError::Blob { entity, source })
}
