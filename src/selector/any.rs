//! The unconditional selector; usually last in the pipeline.
use super::{Candidate, Selector, Tuning};

pub struct Any {
    tuning: Tuning,
}

impl Any {
    pub fn new(tuning: Tuning) -> Any {
        Any { tuning }
    }
}

impl Selector for Any {
    fn name(&self) -> &'static str {
        "Any"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, _candidate: &Candidate) -> bool {
        true
    }
}
