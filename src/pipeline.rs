//! The order in which an aggregate’s rows are created.
//!
//! Each [`Step`] names the earlier steps whose generated IDs it needs
//! as foreign keys. [`plan`] lists the steps a particular graph needs,
//! and [`Keys::require`] refuses to hand out an ID that has not been
//! generated yet, so a step can never run ahead of its dependencies.

use std::collections::HashMap;
use std::fmt;

use crate::aggregate::AggregateGraph;
use crate::errors::BackendError;
use crate::Id;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Step {
    Classification,
    PlaceName,
    Place,
    Occurrence,
    Observation,
    Specimen,
    SpecimenPreparation,
    Identification,
}

impl Step {
    /// The steps whose IDs this step consumes.
    pub fn dependencies(self) -> &'static [Step] {
        use Step::*;

        match self {
            Classification | PlaceName => &[],
            Place => &[PlaceName],
            Occurrence => &[Classification, Place],
            Observation | Specimen | Identification => &[Occurrence],
            SpecimenPreparation => &[Occurrence, Specimen],
        }
    }

    pub fn name(self) -> &'static str {
        use Step::*;

        match self {
            Classification => "classification",
            PlaceName => "place name",
            Place => "place",
            Occurrence => "occurrence",
            Observation => "observation",
            Specimen => "specimen",
            SpecimenPreparation => "specimen preparation",
            Identification => "identification",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lists the steps needed to write `graph`, each after everything it
/// depends on.
pub fn plan(graph: &AggregateGraph) -> Vec<Step> {
    let mut steps = vec![
        Step::Classification,
        Step::PlaceName,
        Step::Place,
        Step::Occurrence,
        Step::Observation,
    ];

    if graph.specimen.is_some() {
        steps.push(Step::Specimen);
        steps.push(Step::SpecimenPreparation);
    }

    if graph.identification.is_some() {
        steps.push(Step::Identification);
    }

    steps
}

/// The IDs generated so far in one unit of work.
#[derive(Debug, Default)]
pub struct Keys {
    generated: HashMap<Step, Id>,
}

impl Keys {
    pub fn new() -> Self {
        Keys::default()
    }

    /// Returns the ID `step` needs from `dependency`. Fails if
    /// `dependency` is not declared by `step` or has not run.
    pub fn require(&self, step: Step, dependency: Step) -> Result<Id, BackendError> {
        let missing = || BackendError::MissingDependency {
            step: step.name(),
            dependency: dependency.name(),
        };

        if !step.dependencies().contains(&dependency) {
            return Err(missing());
        }

        self.generated.get(&dependency).copied().ok_or_else(missing)
    }

    pub fn record(&mut self, step: Step, id: Id) {
        self.generated.insert(step, id);
    }

    pub fn get(&self, step: Step) -> Option<Id> {
        self.generated.get(&step).copied()
    }
}
