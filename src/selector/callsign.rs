//! Match specific callsigns, by regular expression or by list.
use std::collections::BTreeSet;

use regex::Regex;

use super::{Candidate, Error, Selector, Tuning};

pub struct CallSign {
    tuning: Tuning,
    regexp: Option<Regex>,
    list: BTreeSet<String>,
}

impl CallSign {
    pub fn new(tuning: Tuning) -> Result<CallSign, Error> {
        let regexp = tuning.regexp.as_deref().map(Regex::new).transpose()?;
        let list = tuning.strings();
        if regexp.is_none() && list.is_empty() {
            return Err(Error::Missing {
                selector: "CallSign",
                setting: "regexp or list",
            });
        }
        Ok(CallSign {
            tuning,
            regexp,
            list,
        })
    }
}

impl Selector for CallSign {
    fn name(&self) -> &'static str {
        "CallSign"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        let call = &candidate.row.call;
        self.regexp
            .as_ref()
            .map(|regexp| regexp.is_match(call))
            .unwrap_or(false)
            || self.list.contains(call)
    }
}
