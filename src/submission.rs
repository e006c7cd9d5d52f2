use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::normalization;
use crate::Id;

/// One occurrence as submitted by the browser client. Timestamps are
/// RFC 3339 strings carrying the offset of the place they were taken.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Submission {
    /// The user submitting the occurrence.
    pub user_id: Id,

    pub project_id: Option<Id>,

    pub individual_id: Option<Id>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub lifestage: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub sex: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub body_length: Option<String>,

    /// When the occurrence happened, if known.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,

    pub language_id: Option<Id>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    /// Accuracy of the coordinates in metres.
    pub accuracy: Option<f64>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub place_name: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub note: Option<String>,

    #[serde(default)]
    pub classification: ClassificationInput,

    pub observation: ObservationInput,

    pub specimen: Option<SpecimenInput>,

    pub identification: Option<IdentificationInput>,
}

/// The taxonomic ranks provided. Every rank is optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ClassificationInput {
    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub species: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub genus: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub family: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub order: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub class: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub phylum: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub kingdom: Option<String>,

    /// Anything that doesn’t fit a rank.
    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub others: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ObservationInput {
    pub observation_user_id: Id,

    pub observation_method_id: Id,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub behavior: Option<String>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub observed_at: Option<OffsetDateTime>,
}

/// How the organism was collected and prepared as a specimen.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpecimenInput {
    /// The user who prepared the specimen.
    pub specimen_user_id: Id,

    pub specimen_methods_id: Id,

    pub institution_id: Id,

    pub collection_id: Id,

    /// When the specimen was prepared.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdentificationInput {
    pub identification_user_id: Id,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub identified_at: Option<OffsetDateTime>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub source_info: Option<String>,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::Submission;

    #[test]
    fn minimal_submission_parses() {
        let submission: Submission = serde_json::from_str(
            r#"{
                "user_id": 1,
                "observation": { "observation_user_id": 1, "observation_method_id": 2 }
            }"#,
        )
        .expect("parse minimal submission");

        assert_eq!(submission.user_id, 1);
        assert!(submission.latitude.is_none());
        assert!(submission.classification.species.is_none());
        assert!(submission.specimen.is_none());
        assert!(submission.identification.is_none());
    }

    #[test]
    fn timestamps_keep_their_offset() {
        let submission: Submission = serde_json::from_str(
            r#"{
                "user_id": 1,
                "created_at": "2024-05-01T10:00:00+05:30",
                "observation": {
                    "observation_user_id": 1,
                    "observation_method_id": 2,
                    "observed_at": "2024-05-01T09:15:00-03:00"
                }
            }"#,
        )
        .expect("parse submission with timestamps");

        assert_eq!(
            submission.created_at,
            Some(datetime!(2024-05-01 10:00 +05:30))
        );
        assert_eq!(
            submission.observation.observed_at.map(|t| t.offset().whole_hours()),
            Some(-3)
        );
    }

    #[test]
    fn text_is_normalized_but_empty_is_kept() {
        let submission: Submission = serde_json::from_str(
            r#"{
                "user_id": 1,
                "place_name": "  Kyoto ",
                "note": "",
                "classification": { "species": " Parus minor" },
                "observation": { "observation_user_id": 1, "observation_method_id": 2 }
            }"#,
        )
        .expect("parse submission with text");

        assert_eq!(submission.place_name.as_deref(), Some("Kyoto"));
        assert_eq!(submission.note.as_deref(), Some(""));
        assert!(submission.lifestage.is_none());
        assert_eq!(
            submission.classification.species.as_deref(),
            Some("Parus minor")
        );
    }
}
