//! Award-chasing selectors: new DXCC entities and tagged CQs.
use std::collections::{BTreeSet, HashSet};

use super::{Candidate, Error, Selector, Shared, Tuning};

/// Prefer countries not yet worked on this band. A country counts as
/// worked once `worked_count` contacts with it are logged.
pub struct Dxcc100 {
    tuning: Tuning,
    worked: HashSet<String>,
}

impl Dxcc100 {
    pub fn new(tuning: Tuning) -> Dxcc100 {
        Dxcc100 {
            tuning,
            worked: HashSet::new(),
        }
    }
}

impl Selector for Dxcc100 {
    fn name(&self) -> &'static str {
        "DXCC100"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        !self.worked.contains(&candidate.row.country)
    }

    fn filter(
        &mut self,
        shared: &mut Shared,
        band: u32,
        rows: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, Error> {
        self.worked = shared
            .store()
            .worked_countries(band, self.tuning.worked_count)?;
        let reverse = self.tuning.reverse;
        Ok(rows
            .into_iter()
            .filter(|candidate| self.matches(candidate) != reverse)
            .collect())
    }
}

/// Match the CQ's extra tag (DX, POTA, a continent code, ...).
pub struct Extra {
    tuning: Tuning,
    list: BTreeSet<String>,
}

impl Extra {
    pub fn new(tuning: Tuning) -> Extra {
        let list = tuning.strings();
        Extra { tuning, list }
    }
}

impl Selector for Extra {
    fn name(&self) -> &'static str {
        "Extra"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        candidate
            .row
            .extra
            .as_deref()
            .map(|extra| self.list.contains(extra))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::super::test_support::{sighting, sighting_from, test_store};
    use super::super::{Candidate, Pipeline};
    use super::*;
    use crate::config::ConfigItem;
    use crate::store::Status;

    #[test]
    fn extra_tag_membership_with_reverse() {
        let tuning = Tuning {
            list: vec![ConfigItem::Text("POTA".to_string())],
            ..Tuning::default()
        };
        let selector = Extra::new(tuning);
        let pota = Candidate::new(sighting_from("K1ABC", 20, -5, "United States", "NA", Some("POTA")));
        let plain = Candidate::new(sighting("W1AW", 20, -5));
        assert!(selector.matches(&pota));
        assert!(!selector.matches(&plain));
    }

    #[test]
    fn dxcc100_skips_worked_countries() {
        let store = test_store(&[
            sighting_from("PY2XYZ", 20, -9, "Brazil", "SA", None),
            sighting_from("W1AW", 20, -3, "United States", "NA", None),
        ]);
        // two logged US contacts on the band make the US "worked"
        for call in ["K1ONE", "K1TWO"] {
            store
                .upsert(&sighting_from(call, 20, -5, "United States", "NA", None))
                .unwrap();
            store.set_status(call, 20, Status::Logged).unwrap();
        }

        let selectors: Vec<Box<dyn Selector>> =
            vec![Box::new(Dxcc100::new(Tuning::default()))];
        let mut pipeline =
            Pipeline::for_tests(selectors, store, BTreeSet::new(), "NA");
        let selected = pipeline.select(20).unwrap().unwrap();
        assert_eq!(selected.row.call, "PY2XYZ");
        assert_eq!(selected.selector, "DXCC100");
    }
}
