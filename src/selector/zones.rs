//! CQ-zone and ITU-zone selectors.
use std::collections::BTreeSet;

use tracing::warn;

use super::{Candidate, Selector, Tuning};

fn zone_set(tuning: &Tuning) -> BTreeSet<u16> {
    let mut zones = BTreeSet::new();
    for item in tuning.strings() {
        match item.parse() {
            Ok(zone) => {
                zones.insert(zone);
            }
            Err(_) => warn!("zone {item:?} is not an integer"),
        }
    }
    zones
}

pub struct CqZone {
    tuning: Tuning,
    zones: BTreeSet<u16>,
}

impl CqZone {
    pub fn new(tuning: Tuning) -> CqZone {
        let zones = zone_set(&tuning);
        CqZone { tuning, zones }
    }
}

impl Selector for CqZone {
    fn name(&self) -> &'static str {
        "CQZone"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        self.zones.contains(&candidate.row.cqzone)
    }
}

pub struct ItuZone {
    tuning: Tuning,
    zones: BTreeSet<u16>,
}

impl ItuZone {
    pub fn new(tuning: Tuning) -> ItuZone {
        let zones = zone_set(&tuning);
        ItuZone { tuning, zones }
    }
}

impl Selector for ItuZone {
    fn name(&self) -> &'static str {
        "ITUZone"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        self.zones.contains(&candidate.row.ituzone)
    }
}
