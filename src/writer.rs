use std::sync::Arc;

use log::{debug, o, warn, Logger};

use crate::aggregate::AggregateGraph;
use crate::db::{Db, UnitOfWork};
use crate::errors::BackendError;
use crate::pipeline::{plan, Keys, Step};
use crate::Id;

/// Writes whole aggregates, one unit of work each.
#[derive(Clone)]
pub struct AggregateWriter {
    logger: Arc<Logger>,
    db: Arc<dyn Db>,
}

impl AggregateWriter {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db>) -> Self {
        AggregateWriter { logger, db }
    }

    /// Creates every row of `graph` and returns the new occurrence’s
    /// ID. Either all rows are committed or none are; the error names
    /// the first step that failed.
    ///
    /// Writing the same graph twice creates two occurrences.
    pub async fn write(&self, graph: &AggregateGraph) -> Result<Id, BackendError> {
        let steps = plan(graph);
        let logger = self.logger.new(o!("steps" => steps.len()));

        debug!(logger, "Starting unit of work...");
        let mut uow = self.db.begin().await?;

        match run_steps(&logger, uow.as_mut(), graph, &steps).await {
            Ok(id) => {
                uow.commit().await?;
                debug!(logger, "Committed aggregate"; "occurrence_id" => id);

                Ok(id)
            }
            Err(e) => {
                warn!(logger, "Rolling back aggregate"; "error" => %e, "cause" => ?e.root_cause());

                if let Err(rollback_error) = uow.rollback().await {
                    warn!(logger, "Rollback failed"; "error" => ?rollback_error);
                }

                Err(e)
            }
        }
    }
}

async fn run_steps(
    logger: &Logger,
    uow: &mut dyn UnitOfWork,
    graph: &AggregateGraph,
    steps: &[Step],
) -> Result<Id, BackendError> {
    let mut keys = Keys::new();

    for step in steps.iter().copied() {
        debug!(logger, "Creating row"; "step" => step.name());

        let id = run_step(uow, graph, &keys, step)
            .await
            .map_err(|e| e.at_step(step.name()))?;

        keys.record(step, id);
    }

    keys.get(Step::Occurrence).ok_or(BackendError::MissingDependency {
        step: "aggregate",
        dependency: Step::Occurrence.name(),
    })
}

async fn run_step(
    uow: &mut dyn UnitOfWork,
    graph: &AggregateGraph,
    keys: &Keys,
    step: Step,
) -> Result<Id, BackendError> {
    let absent = || BackendError::MissingDependency {
        step: step.name(),
        dependency: "its entity",
    };

    match step {
        Step::Classification => uow.insert_classification(&graph.classification).await,
        Step::PlaceName => uow.insert_place_name(&graph.place_name).await,
        Step::Place => {
            let place_name_id = keys.require(step, Step::PlaceName)?;
            uow.insert_place(&graph.place, place_name_id).await
        }
        Step::Occurrence => {
            let classification_id = keys.require(step, Step::Classification)?;
            let place_id = keys.require(step, Step::Place)?;
            uow.insert_occurrence(&graph.occurrence, classification_id, place_id)
                .await
        }
        Step::Observation => {
            let occurrence_id = keys.require(step, Step::Occurrence)?;
            uow.insert_observation(&graph.observation, occurrence_id)
                .await
        }
        Step::Specimen => {
            let record = graph.specimen.as_ref().ok_or_else(absent)?;
            let occurrence_id = keys.require(step, Step::Occurrence)?;
            uow.insert_specimen(&record.specimen, occurrence_id).await
        }
        Step::SpecimenPreparation => {
            let record = graph.specimen.as_ref().ok_or_else(absent)?;
            let occurrence_id = keys.require(step, Step::Occurrence)?;
            let specimen_id = keys.require(step, Step::Specimen)?;
            uow.insert_specimen_preparation(&record.preparation, occurrence_id, specimen_id)
                .await
        }
        Step::Identification => {
            let identification = graph.identification.as_ref().ok_or_else(absent)?;
            let occurrence_id = keys.require(step, Step::Occurrence)?;
            uow.insert_identification(identification, occurrence_id)
                .await
        }
    }
}
