use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::{
    Classification, Identification, Observation, Occurrence, Place, PlaceName, Specimen,
    SpecimenPreparation,
};
use crate::attachment::NewAttachment;
use crate::errors::BackendError;
use crate::geo::GeoPoint;
use crate::Id;

#[cfg(test)]
pub(crate) mod mock;

/// Access to the database. Handed to each component when it is
/// constructed.
pub trait Db: Send + Sync {
    /// Starts a unit of work.
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, BackendError>>;

    /// Reads back an occurrence and a summary of what references it.
    fn retrieve_occurrence(
        &self,
        id: Id,
    ) -> BoxFuture<'_, Result<Option<StoredOccurrence>, BackendError>>;
}

/// One database transaction. Nothing written through it is visible to
/// anyone else until [`UnitOfWork::commit`]; dropping it without
/// committing discards everything.
pub trait UnitOfWork: Send {
    fn insert_classification<'a>(
        &'a mut self,
        classification: &'a Classification,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_place_name<'a>(
        &'a mut self,
        place_name: &'a PlaceName,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_place<'a>(
        &'a mut self,
        place: &'a Place,
        place_name_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_occurrence<'a>(
        &'a mut self,
        occurrence: &'a Occurrence,
        classification_id: Id,
        place_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_observation<'a>(
        &'a mut self,
        observation: &'a Observation,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_specimen<'a>(
        &'a mut self,
        specimen: &'a Specimen,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_specimen_preparation<'a>(
        &'a mut self,
        preparation: &'a SpecimenPreparation,
        occurrence_id: Id,
        specimen_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_identification<'a>(
        &'a mut self,
        identification: &'a Identification,
        occurrence_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    /// Looks up a file extension (lower case, with leading dot).
    /// Returns `None` when the extension is not in the reference table.
    fn find_extension<'a>(
        &'a mut self,
        extension: &'a str,
    ) -> BoxFuture<'a, Result<Option<Id>, BackendError>>;

    fn insert_attachment<'a>(
        &'a mut self,
        attachment: &'a NewAttachment,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn insert_attachment_group<'a>(
        &'a mut self,
        occurrence_id: Id,
        attachment_id: Id,
    ) -> BoxFuture<'a, Result<Id, BackendError>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>>;

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>>;
}

/// An occurrence as stored, with counts of the rows that reference it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredOccurrence {
    pub id: Id,
    pub classification_id: Id,
    pub place_id: Id,
    pub classification: Value,
    pub place_name: Value,
    pub point: GeoPoint,
    pub observations: i64,
    pub specimens: i64,
    pub specimen_preparations: i64,
    pub identifications: i64,
    pub attachments: Vec<Id>,
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::Value;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
        Postgres, Transaction,
    };

    use super::{StoredOccurrence, UnitOfWork};
    use crate::aggregate::{
        Classification, Identification, Observation, Occurrence, Place, PlaceName, Specimen,
        SpecimenPreparation,
    };
    use crate::attachment::NewAttachment;
    use crate::errors::BackendError;
    use crate::geo;
    use crate::Id;

    const ATTACHMENT_GROUPS_OCCURRENCE_CONSTRAINT: &str = "attachment_groups_occurrence_id_fkey";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are
    // object safe
    impl super::Db for PgDb {
        fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, BackendError>> {
            async move {
                let tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                Ok(Box::new(PgUnitOfWork { tx }) as Box<dyn UnitOfWork>)
            }
            .boxed()
        }

        fn retrieve_occurrence(
            &self,
            id: Id,
        ) -> BoxFuture<'_, Result<Option<StoredOccurrence>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_occurrence.sql"));

                let row: Option<PgRow> = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                let row = match row {
                    Some(row) => row,
                    None => return Ok(None),
                };

                let coordinates: Option<String> = try_get(&row, "coordinates")?;
                let point = geo::decode_option(coordinates.as_deref())?;

                let attachments = sqlx::query_as::<_, (Id,)>(include_str!(
                    "queries/retrieve_attachment_ids.sql"
                ))
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(|(attachment_id,)| attachment_id)
                .collect();

                Ok(Some(StoredOccurrence {
                    id,
                    classification_id: try_get(&row, "classification_id")?,
                    place_id: try_get(&row, "place_id")?,
                    classification: try_get::<Option<Value>>(&row, "classification")?
                        .unwrap_or(Value::Null),
                    place_name: try_get::<Option<Value>>(&row, "place_name")?
                        .unwrap_or(Value::Null),
                    point,
                    observations: try_get(&row, "observations")?,
                    specimens: try_get(&row, "specimens")?,
                    specimen_preparations: try_get(&row, "specimen_preparations")?,
                    identifications: try_get(&row, "identifications")?,
                    attachments,
                }))
            }
            .boxed()
        }
    }

    pub struct PgUnitOfWork {
        tx: Transaction<'static, Postgres>,
    }

    impl UnitOfWork for PgUnitOfWork {
        fn insert_classification<'a>(
            &'a mut self,
            classification: &'a Classification,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) =
                    sqlx::query_as(include_str!("queries/create_classification.sql"))
                        .bind(&classification.blob)
                        .fetch_one(&mut *self.tx)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_place_name<'a>(
            &'a mut self,
            place_name: &'a PlaceName,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_place_name.sql"))
                    .bind(&place_name.blob)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_place<'a>(
            &'a mut self,
            place: &'a Place,
            place_name_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_place.sql"))
                    .bind(&place.coordinates)
                    .bind(place_name_id)
                    .bind(place.accuracy)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_occurrence<'a>(
            &'a mut self,
            occurrence: &'a Occurrence,
            classification_id: Id,
            place_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_occurrence.sql"))
                    .bind(occurrence.project_id)
                    .bind(occurrence.user_id)
                    .bind(occurrence.individual_id)
                    .bind(&occurrence.lifestage)
                    .bind(&occurrence.sex)
                    .bind(classification_id)
                    .bind(place_id)
                    .bind(&occurrence.body_length)
                    .bind(occurrence.language_id)
                    .bind(&occurrence.note)
                    .bind(occurrence.created.at)
                    .bind(&occurrence.created.timezone)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_observation<'a>(
            &'a mut self,
            observation: &'a Observation,
            occurrence_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_observation.sql"))
                    .bind(observation.user_id)
                    .bind(occurrence_id)
                    .bind(observation.method_id)
                    .bind(&observation.behavior)
                    .bind(observation.observed.at)
                    .bind(&observation.observed.timezone)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_specimen<'a>(
            &'a mut self,
            specimen: &'a Specimen,
            occurrence_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_specimen.sql"))
                    .bind(occurrence_id)
                    .bind(specimen.method_id)
                    .bind(specimen.institution_id)
                    .bind(specimen.collection_id)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_specimen_preparation<'a>(
            &'a mut self,
            preparation: &'a SpecimenPreparation,
            occurrence_id: Id,
            specimen_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) =
                    sqlx::query_as(include_str!("queries/create_specimen_preparation.sql"))
                        .bind(occurrence_id)
                        .bind(preparation.user_id)
                        .bind(specimen_id)
                        .bind(preparation.prepared.at)
                        .bind(preparation.method_id)
                        .bind(&preparation.prepared.timezone)
                        .fetch_one(&mut *self.tx)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_identification<'a>(
            &'a mut self,
            identification: &'a Identification,
            occurrence_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) =
                    sqlx::query_as(include_str!("queries/create_identification.sql"))
                        .bind(identification.user_id)
                        .bind(occurrence_id)
                        .bind(&identification.source_info)
                        .bind(identification.identified.at)
                        .bind(&identification.identified.timezone)
                        .fetch_one(&mut *self.tx)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn find_extension<'a>(
            &'a mut self,
            extension: &'a str,
        ) -> BoxFuture<'a, Result<Option<Id>, BackendError>> {
            async move {
                let id: Option<Id> =
                    sqlx::query_as::<_, (Id,)>(include_str!("queries/retrieve_extension.sql"))
                        .bind(extension)
                        .fetch_optional(&mut *self.tx)
                        .await
                        .map_err(map_sqlx_error)?
                        .map(|(id,)| id);

                Ok(id)
            }
            .boxed()
        }

        fn insert_attachment<'a>(
            &'a mut self,
            attachment: &'a NewAttachment,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_attachment.sql"))
                    .bind(&attachment.file_path)
                    .bind(&attachment.original_filename)
                    .bind(attachment.extension_id)
                    .bind(attachment.user_id)
                    .bind(attachment.uploaded)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn insert_attachment_group<'a>(
            &'a mut self,
            occurrence_id: Id,
            attachment_id: Id,
        ) -> BoxFuture<'a, Result<Id, BackendError>> {
            async move {
                let (id,): (Id,) =
                    sqlx::query_as(include_str!("queries/create_attachment_group.sql"))
                        .bind(occurrence_id)
                        .bind(attachment_id)
                        .fetch_one(&mut *self.tx)
                        .await
                        .map_err(|e| match e {
                            sqlx::Error::Database(ref d)
                                if d.constraint()
                                    == Some(ATTACHMENT_GROUPS_OCCURRENCE_CONSTRAINT) =>
                            {
                                BackendError::NonExistentOccurrence(occurrence_id)
                            }
                            e => map_sqlx_error(e),
                        })?;

                Ok(id)
            }
            .boxed()
        }

        fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
            async move { self.tx.commit().await.map_err(map_sqlx_error) }.boxed()
        }

        fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
            async move { self.tx.rollback().await.map_err(map_sqlx_error) }.boxed()
        }
    }

    fn try_get<'a, T: sqlx::Type<Postgres> + sqlx::decode::Decode<'a, Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, BackendError> {
        use sqlx::Row;

        row.try_get(column).map_err(map_sqlx_error)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }
}
