//! The selector pipeline: ordered, pluggable policies that pick which CQ
//! to answer in the next transmit slot.
//!
//! Every selector shares one candidate-fetch stage (recent, unanswered
//! rows for the band, behind a short-lived memo) and one post-filter
//! (`select_record`): SNR bounds, the blacklist and the optional LOTW
//! gate. What distinguishes a selector is its predicate over a candidate
//! row. The set of selector names is closed at compile time; configuration
//! can only order and tune them.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigItem, Document};
use crate::dxcc::Dxcc;
use crate::lotw::Lotw;
use crate::store::{Sighting, Store};

mod any;
mod callsign;
mod grid;
mod land;
mod special;
mod zones;

pub use any::Any;
pub use callsign::CallSign;
pub use grid::Grid;
pub use land::{Continent, Country};
pub use special::{Dxcc100, Extra};
pub use zones::{CqZone, ItuZone};

pub const CONTINENTS: &[&str] = &["AF", "AS", "EU", "NA", "OC", "SA"];

const CACHE_TTL: Duration = Duration::from_secs(3);

fn default_min_snr() -> i32 {
    -50
}

fn default_max_snr() -> i32 {
    50
}

fn default_delta() -> i64 {
    29
}

fn default_worked_count() -> u32 {
    2
}

/// Per-selector tuning, one configuration section per selector name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tuning {
    #[serde(default = "default_min_snr")]
    pub min_snr: i32,
    #[serde(default = "default_max_snr")]
    pub max_snr: i32,
    #[serde(default = "default_delta")]
    pub delta: i64,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub lotw_users_only: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub my_continent: Option<String>,
    #[serde(default)]
    pub list: Vec<ConfigItem>,
    #[serde(default)]
    pub regexp: Option<String>,
    #[serde(default = "default_worked_count")]
    pub worked_count: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            min_snr: default_min_snr(),
            max_snr: default_max_snr(),
            delta: default_delta(),
            reverse: false,
            lotw_users_only: false,
            debug: false,
            my_continent: None,
            list: Vec::new(),
            regexp: None,
            worked_count: default_worked_count(),
        }
    }
}

impl Tuning {
    pub fn strings(&self) -> BTreeSet<String> {
        self.list.iter().map(ConfigItem::as_string).collect()
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown selector {0}")]
    Unknown(String),
    #[error("selector {selector} needs a {setting} setting")]
    Missing {
        selector: &'static str,
        setting: &'static str,
    },
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("{0} is not a valid continent")]
    BadContinent(String),
    #[error("{0} is not a DXCC entity")]
    BadCountry(String),
    #[error("selector section error: {0}")]
    Section(#[from] serde_yaml::Error),
    #[error("operator registry error")]
    Lotw(#[from] crate::lotw::Error),
    #[error("prefix database error")]
    Dxcc(#[from] crate::dxcc::Error),
    #[error("store error")]
    Store(#[from] rusqlite::Error),
}

/// A fetched row plus its ranking coefficient.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: Sighting,
    pub coef: f64,
}

impl Candidate {
    fn new(row: Sighting) -> Candidate {
        let coef = row.distance * 10f64.powf(f64::from(row.snr) / 10.0);
        Candidate { row, coef }
    }
}

/// The station the pipeline settled on, tagged with the selector that
/// picked it.
#[derive(Debug)]
pub struct Selected {
    pub row: Sighting,
    pub selector: &'static str,
}

pub trait Selector {
    fn name(&self) -> &'static str;
    fn tuning(&self) -> &Tuning;

    /// Predicate over one candidate, before the reverse flag is applied.
    fn matches(&self, candidate: &Candidate) -> bool;

    /// Band-level filter; the default applies `matches` XOR `reverse`.
    fn filter(
        &mut self,
        _shared: &mut Shared,
        _band: u32,
        rows: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, Error> {
        let reverse = self.tuning().reverse;
        Ok(rows
            .into_iter()
            .filter(|candidate| self.matches(candidate) != reverse)
            .collect())
    }
}

struct CandidateCache {
    band: u32,
    delta: i64,
    fetched: Instant,
    rows: Vec<Candidate>,
    hits: u64,
    misses: u64,
}

impl CandidateCache {
    fn empty() -> CandidateCache {
        CandidateCache {
            band: 0,
            delta: 0,
            // an empty cache is always stale; `fetched` is never read
            // before the first fill
            fetched: Instant::now(),
            rows: Vec::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, band: u32, delta: i64) -> Option<Vec<Candidate>> {
        if self.band == band
            && self.delta == delta
            && !self.rows.is_empty()
            && self.fetched.elapsed() < CACHE_TTL
        {
            self.hits += 1;
            return Some(self.rows.clone());
        }
        None
    }

    fn put(&mut self, band: u32, delta: i64, rows: Vec<Candidate>) {
        self.misses += 1;
        self.band = band;
        self.delta = delta;
        self.fetched = Instant::now();
        self.rows = rows;
    }
}

/// State shared by every selector in the pipeline: the read connection,
/// the candidate memo, the blacklist and the optional operator registry.
pub struct Shared {
    store: Store,
    cache: CandidateCache,
    blacklist: BTreeSet<String>,
    lotw: Option<Lotw>,
    my_continent: String,
}

impl Shared {
    /// The common candidate-fetch stage: unanswered rows for the band
    /// heard within `delta` seconds, with the coefficient attached, and
    /// "CQ DX" calls from our own continent dropped (a DX solicitation
    /// from the same continent is not a DX contact).
    fn candidates(&mut self, band: u32, tuning: &Tuning) -> Result<Vec<Candidate>, Error> {
        let rows = match self.cache.get(band, tuning.delta) {
            Some(rows) => rows,
            None => {
                let rows: Vec<Candidate> = self
                    .store
                    .candidates(band, tuning.delta)?
                    .into_iter()
                    .map(Candidate::new)
                    .collect();
                self.cache.put(band, tuning.delta, rows.clone());
                rows
            }
        };

        let continent = tuning.my_continent.as_deref().unwrap_or(&self.my_continent);
        Ok(rows
            .into_iter()
            .filter(|candidate| {
                !(candidate.row.extra.as_deref() == Some("DX")
                    && candidate.row.continent == continent)
            })
            .collect())
    }

    /// The common post-filter: strongest signal first, bounded SNR, no
    /// blacklisted calls, optionally LOTW members only.
    fn select_record(&mut self, mut rows: Vec<Candidate>, tuning: &Tuning) -> Option<Sighting> {
        rows.sort_by(|a, b| b.row.snr.cmp(&a.row.snr));
        for candidate in rows {
            let row = candidate.row;
            if row.snr <= tuning.min_snr || row.snr >= tuning.max_snr {
                continue;
            }
            if self.blacklist.contains(&row.call) {
                debug!("{} is blacklisted", row.call);
                continue;
            }
            if tuning.lotw_users_only {
                if let Some(lotw) = self.lotw.as_mut() {
                    if !lotw.contains(&row.call) {
                        debug!("{} is not an lotw user", row.call);
                        continue;
                    }
                }
            }
            return Some(row);
        }
        None
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

type Registry = &'static [(&'static str, fn(Tuning, &Dxcc) -> Result<Box<dyn Selector>, Error>)];

/// The closed set of selector names configuration may reference.
const REGISTRY: Registry = &[
    ("Any", |tuning, _| Ok(Box::new(Any::new(tuning)))),
    ("CallSign", |tuning, _| Ok(Box::new(CallSign::new(tuning)?))),
    ("Grid", |tuning, _| Ok(Box::new(Grid::new(tuning)?))),
    ("Continent", |tuning, _| {
        Ok(Box::new(Continent::new(tuning)?))
    }),
    ("Country", |tuning, dxcc| {
        Ok(Box::new(Country::new(tuning, dxcc)?))
    }),
    ("CQZone", |tuning, _| Ok(Box::new(CqZone::new(tuning)))),
    ("ITUZone", |tuning, _| Ok(Box::new(ItuZone::new(tuning)))),
    ("Extra", |tuning, _| Ok(Box::new(Extra::new(tuning)))),
    ("DXCC100", |tuning, _| Ok(Box::new(Dxcc100::new(tuning)))),
];

pub fn build(name: &str, tuning: Tuning, dxcc: &Dxcc) -> Result<Box<dyn Selector>, Error> {
    match REGISTRY.iter().find(|(known, _)| *known == name) {
        Some((_, constructor)) => constructor(tuning, dxcc),
        None => Err(Error::Unknown(name.to_string())),
    }
}

pub struct Pipeline {
    selectors: Vec<Box<dyn Selector>>,
    shared: Shared,
}

impl Pipeline {
    /// Instantiate the configured selectors, in order. The operator's
    /// continent comes from the prefix database unless a section
    /// overrides it.
    pub fn from_config(
        document: &Document,
        store: Store,
        dxcc: Arc<Dxcc>,
    ) -> Result<Pipeline, Error> {
        let mut selectors = Vec::new();
        let mut wants_lotw = false;
        for name in &document.ft8ctrl.call_selector {
            let tuning = match document.section(name) {
                Some(section) if !section.is_null() => serde_yaml::from_value(section.clone())?,
                _ => Tuning::default(),
            };
            wants_lotw |= tuning.lotw_users_only;
            selectors.push(build(name, tuning, &dxcc)?);
        }

        let lotw = if wants_lotw {
            Some(Lotw::open(&document.ft8ctrl.lotw_cache())?)
        } else {
            None
        };
        let my_continent = dxcc.lookup(&document.ft8ctrl.my_call)?.continent.clone();

        Ok(Pipeline {
            selectors,
            shared: Shared {
                store,
                cache: CandidateCache::empty(),
                blacklist: document.blacklist(),
                lotw,
                my_continent,
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        selectors: Vec<Box<dyn Selector>>,
        store: Store,
        blacklist: BTreeSet<String>,
        my_continent: &str,
    ) -> Pipeline {
        Pipeline {
            selectors,
            shared: Shared {
                store,
                cache: CandidateCache::empty(),
                blacklist,
                lotw: None,
                my_continent: my_continent.to_string(),
            },
        }
    }

    /// Walk the pipeline in order; the first selector with a surviving
    /// candidate wins.
    pub fn select(&mut self, band: u32) -> Result<Option<Selected>, Error> {
        for selector in &mut self.selectors {
            let tuning = selector.tuning().clone();
            let rows = self.shared.candidates(band, &tuning)?;
            let rows = selector.filter(&mut self.shared, band, rows)?;
            if let Some(row) = self.shared.select_record(rows, &tuning) {
                debug!(
                    "select: {}, from: {}, snr: {}, distance: {:.0}km, band: {}m, selector: {}",
                    row.call,
                    row.country,
                    row.snr,
                    row.distance,
                    row.band,
                    selector.name()
                );
                return Ok(Some(Selected {
                    row,
                    selector: selector.name(),
                }));
            }
        }
        Ok(None)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.selectors.iter().map(|s| s.name()).collect()
    }

    /// Human-readable cache statistics for the CACHE console command.
    pub fn cache_stats(&self) -> String {
        let candidates = format!(
            "candidates: hits={} misses={} rows={}",
            self.shared.cache.hits,
            self.shared.cache.misses,
            self.shared.cache.rows.len()
        );
        match &self.shared.lotw {
            Some(lotw) => {
                let (hits, misses, entries) = lotw.cache_stats();
                format!("{candidates}; lotw: hits={hits} misses={misses} entries={entries}")
            }
            None => candidates,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::{Envelope, Status};
    use chrono::Utc;

    pub fn sighting(call: &str, band: u32, snr: i32) -> Sighting {
        sighting_from(call, band, snr, "United States", "NA", None)
    }

    pub fn sighting_from(
        call: &str,
        band: u32,
        snr: i32,
        country: &str,
        continent: &str,
        extra: Option<&str>,
    ) -> Sighting {
        Sighting {
            call: call.to_string(),
            extra: extra.map(str::to_string),
            time: Utc::now(),
            status: Status::Candidate,
            snr,
            grid: Some("FN31".to_string()),
            lat: 41.0,
            lon: -74.0,
            distance: 4500.0,
            azimuth: 70,
            country: country.to_string(),
            continent: continent.to_string(),
            cqzone: 5,
            ituzone: 8,
            frequency: 14_074_000,
            band,
            packet: Envelope {
                time: Utc::now(),
                new: true,
                snr,
                delta_time: 0.2,
                delta_frequency: 1500,
                mode: Some("~".to_string()),
                message: Some(format!("CQ {call} FN31")),
                low_confidence: false,
                off_air: false,
            },
        }
    }

    pub fn candidate(call: &str, snr: i32) -> Candidate {
        Candidate::new(sighting(call, 20, snr))
    }

    pub fn test_store(rows: &[Sighting]) -> Store {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cqcalls.db");
        let store = Store::create(&path).unwrap();
        for row in rows {
            store.upsert(row).unwrap();
        }
        // keep the backing file alive for the life of the test store
        std::mem::forget(dir);
        store
    }
}

#[cfg(test)]
mod test {
    use super::test_support::*;
    use super::*;

    #[test]
    fn coefficient_scales_distance_by_snr() {
        let strong = candidate("W1AW", 0);
        assert!((strong.coef - strong.row.distance).abs() < 1e-9);
        let weak = candidate("W1AW", -10);
        assert!((weak.coef - strong.row.distance / 10.0).abs() < 1e-9);
    }

    #[test]
    fn pipeline_returns_first_non_empty_selector() {
        let store = test_store(&[sighting("W1AW", 20, -5)]);
        let selectors: Vec<Box<dyn Selector>> = vec![
            Box::new(Extra::new(Tuning::default())), // matches nothing here
            Box::new(Any::new(Tuning::default())),
        ];
        let mut pipeline =
            Pipeline::for_tests(selectors, store, BTreeSet::new(), "NA");
        let selected = pipeline.select(20).unwrap().unwrap();
        assert_eq!(selected.row.call, "W1AW");
        assert_eq!(selected.selector, "Any");
    }

    #[test]
    fn dx_from_own_continent_is_discarded() {
        let store = test_store(&[
            sighting_from("W2ABC", 20, -3, "United States", "NA", Some("DX")),
            sighting_from("PY2XYZ", 20, -9, "Brazil", "SA", Some("DX")),
        ]);
        let selectors: Vec<Box<dyn Selector>> = vec![Box::new(Any::new(Tuning::default()))];
        let mut pipeline =
            Pipeline::for_tests(selectors, store, BTreeSet::new(), "NA");
        let selected = pipeline.select(20).unwrap().unwrap();
        assert_eq!(selected.row.call, "PY2XYZ");
    }

    #[test]
    fn select_record_prefers_strong_signals_within_bounds() {
        let store = test_store(&[]);
        let selectors: Vec<Box<dyn Selector>> = vec![Box::new(Any::new(Tuning::default()))];
        let mut pipeline =
            Pipeline::for_tests(selectors, store, BTreeSet::new(), "NA");

        let rows = vec![
            candidate("W1AW", -5),
            candidate("K1ABC", 2),
            candidate("N1XYZ", 55), // outside max_snr
        ];
        let tuning = Tuning::default();
        let picked = pipeline.shared.select_record(rows, &tuning).unwrap();
        assert_eq!(picked.call, "K1ABC");
    }

    #[test]
    fn blacklisted_calls_never_win() {
        let store = test_store(&[sighting("W1SPM", 20, 10)]);
        let selectors: Vec<Box<dyn Selector>> = vec![Box::new(Any::new(Tuning::default()))];
        let blacklist = BTreeSet::from(["W1SPM".to_string()]);
        let mut pipeline = Pipeline::for_tests(selectors, store, blacklist, "NA");
        assert!(pipeline.select(20).unwrap().is_none());
    }

    #[test]
    fn cache_serves_repeat_requests() {
        let store = test_store(&[sighting("W1AW", 20, -5)]);
        let selectors: Vec<Box<dyn Selector>> = vec![Box::new(Any::new(Tuning::default()))];
        let mut pipeline =
            Pipeline::for_tests(selectors, store, BTreeSet::new(), "NA");
        pipeline.select(20).unwrap();
        pipeline.select(20).unwrap();
        assert_eq!(pipeline.shared.cache.hits, 1);
        assert_eq!(pipeline.shared.cache.misses, 1);
    }

    #[test]
    fn unknown_selector_name_is_rejected() {
        let dxcc = crate::dxcc::Dxcc::from_csv(
            "K,United States,291,NA,5,8,37.53,-91.67,5.0,W;".as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            build("Sideband", Tuning::default(), &dxcc),
            Err(Error::Unknown(_))
        ));
    }
}
