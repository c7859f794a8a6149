//! DXCC prefix database: callsign → country, continent and zones.
//!
//! The source is the big CTY list maintained at country-files.com. Each row
//! carries a primary prefix, the entity data, and a trailing field of alias
//! prefixes with optional zone/continent overrides in `(cq)`, `[itu]` and
//! `{cont}` markers. A parsed copy is kept in a keyed cache file so later
//! startups skip the CSV entirely.
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CTY_URL: &str = "https://www.country-files.com/bigcty/cty.csv";
const CTY_FILE: &str = "cty.csv";
const CACHE_FILE: &str = "cty_cache.json";
const REFRESH: Duration = Duration::from_secs(7 * 86400);

static ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^=?(?P<prefix>\w+)(?:/\w+)?(?:\((?P<cqzone>\d+)\))?(?:\[(?P<ituzone>\d+)\])?(?:\{(?P<continent>\w+)\})?",
    )
    .unwrap()
});

#[derive(Error, Debug)]
pub enum Error {
    #[error("no DXCC entity matches {0}")]
    UnknownPrefix(String),
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("malformed prefix row: {0}")]
    Malformed(String),
    #[error("csv error")]
    Csv(#[from] csv::Error),
    #[error("cache file error")]
    Cache(#[from] serde_json::Error),
    #[error("prefix list fetch failed")]
    Fetch(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub prefix: String,
    pub country: String,
    pub ctn: String,
    pub continent: String,
    pub cqzone: u16,
    pub ituzone: u16,
    pub lat: f64,
    pub lon: f64,
    pub tz: f64,
}

#[derive(Serialize, Deserialize)]
struct MetaData {
    entities: HashMap<String, BTreeSet<String>>,
    max_prefix_length: usize,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    #[serde(rename = "_meta_data_")]
    meta: MetaData,
    records: HashMap<String, Record>,
}

pub struct Dxcc {
    map: HashMap<String, Record>,
    entities: HashMap<String, BTreeSet<String>>,
    max_len: usize,
}

impl Dxcc {
    /// Open the database under `home`, using the keyed cache when present
    /// and rebuilding it from the (possibly refreshed) CSV otherwise.
    pub fn load(home: &Path) -> Result<Self, Error> {
        fs::create_dir_all(home)?;
        let cache = home.join(CACHE_FILE);
        if cache.exists() {
            match Self::from_cache(&cache) {
                Ok(dxcc) => {
                    debug!("prefix database loaded from cache ({} records)", dxcc.map.len());
                    return Ok(dxcc);
                }
                Err(err) => warn!("prefix cache unusable, rebuilding: {err}"),
            }
        }

        let source = home.join(CTY_FILE);
        refresh_source(&source)?;
        let dxcc = Self::from_csv(fs::File::open(&source)?)?;
        if let Err(err) = dxcc.write_cache(&cache) {
            warn!("could not persist prefix cache: {err}");
        }
        info!("prefix database ready ({} records)", dxcc.map.len());
        Ok(dxcc)
    }

    pub fn from_csv<R: io::Read>(reader: R) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut map = HashMap::new();
        for row in rdr.records() {
            for record in parse_row(&row?)? {
                map.insert(record.prefix.clone(), record);
            }
        }
        Ok(Self::build(map))
    }

    fn build(map: HashMap<String, Record>) -> Self {
        let max_len = map.keys().map(String::len).max().unwrap_or(0);
        let mut entities: HashMap<String, BTreeSet<String>> = HashMap::new();
        for record in map.values() {
            entities
                .entry(record.country.clone())
                .or_default()
                .insert(record.prefix.clone());
        }
        Dxcc {
            map,
            entities,
            max_len,
        }
    }

    fn from_cache(path: &Path) -> Result<Self, Error> {
        let cached: CacheFile = serde_json::from_reader(io::BufReader::new(fs::File::open(path)?))?;
        Ok(Dxcc {
            map: cached.records,
            entities: cached.meta.entities,
            max_len: cached.meta.max_prefix_length,
        })
    }

    fn write_cache(&self, path: &Path) -> Result<(), Error> {
        let cached = CacheFile {
            meta: MetaData {
                entities: self.entities.clone(),
                max_prefix_length: self.max_len,
            },
            records: self.map.clone(),
        };
        serde_json::to_writer(io::BufWriter::new(fs::File::create(path)?), &cached)?;
        Ok(())
    }

    /// Longest-prefix match on an uppercased callsign.
    pub fn lookup(&self, call: &str) -> Result<&Record, Error> {
        let call = call.to_uppercase();
        for len in (1..=self.max_len.min(call.len())).rev() {
            if !call.is_char_boundary(len) {
                continue;
            }
            if let Some(record) = self.map.get(&call[..len]) {
                return Ok(record);
            }
        }
        Err(Error::UnknownPrefix(call))
    }

    pub fn is_entity(&self, country: &str) -> bool {
        self.entities.contains_key(country)
    }

    pub fn entities(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.entities
    }

    pub fn get_entity(&self, country: &str) -> Option<&BTreeSet<String>> {
        self.entities.get(country)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn clean_prefix(raw: &str) -> String {
    let raw = raw.trim_start_matches('*');
    raw.split('/').next().unwrap_or(raw).to_string()
}

fn parse_row(row: &csv::StringRecord) -> Result<Vec<Record>, Error> {
    let field = |idx: usize| {
        row.get(idx)
            .ok_or_else(|| Error::Malformed(format!("{row:?}")))
    };
    let numeric = |idx: usize| -> Result<f64, Error> {
        field(idx)?
            .trim()
            .parse()
            .map_err(|_| Error::Malformed(format!("{row:?}")))
    };

    let base = Record {
        prefix: clean_prefix(field(0)?),
        country: field(1)?.to_string(),
        ctn: field(2)?.to_string(),
        continent: field(3)?.to_string(),
        cqzone: numeric(4)? as u16,
        ituzone: numeric(5)? as u16,
        lat: numeric(6)?,
        lon: numeric(7)?,
        tz: numeric(8)?,
    };

    let mut records = vec![base.clone()];
    let aliases = field(9)?.replace(';', "");
    for tag in aliases.split_whitespace() {
        match ALIAS.captures(tag) {
            Some(caps) => {
                let mut record = base.clone();
                record.prefix = caps["prefix"].to_string();
                if let Some(zone) = caps.name("cqzone") {
                    record.cqzone = zone.as_str().parse().unwrap_or(base.cqzone);
                }
                if let Some(zone) = caps.name("ituzone") {
                    record.ituzone = zone.as_str().parse().unwrap_or(base.ituzone);
                }
                if let Some(continent) = caps.name("continent") {
                    record.continent = continent.as_str().to_string();
                }
                records.push(record);
            }
            None => warn!("no match for prefix tag {tag}"),
        }
    }
    Ok(records)
}

/// Fetch the CSV when the local copy is missing or older than a week. A
/// failed fetch falls back to the stale copy when one exists.
fn refresh_source(path: &Path) -> Result<(), Error> {
    if let Ok(meta) = fs::metadata(path) {
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok());
        if matches!(age, Some(age) if age < REFRESH) {
            return Ok(());
        }
    }

    info!("fetching prefix list from {CTY_URL}");
    let fetched = reqwest::blocking::get(CTY_URL).and_then(|resp| {
        resp.error_for_status().and_then(|resp| resp.text())
    });
    match fetched {
        Ok(body) => {
            fs::write(path, body)?;
            Ok(())
        }
        Err(err) if path.exists() => {
            warn!("prefix list fetch failed, using stale copy: {err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "\
K,United States,291,NA,5,8,37.53,-91.67,5.0,=K1ABC(4) W N AA;
VE,Canada,1,NA,5,9,45.0,-80.0,5.0,VA VB VY2;
PY,Brazil,108,SA,11,15,-10.0,-53.0,3.0,PP PQ ZZ;
F,France,227,EU,14,27,46.0,-2.0,-1.0,TM HW{EU};
";

    fn sample() -> Dxcc {
        Dxcc::from_csv(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let dxcc = sample();
        assert_eq!(dxcc.lookup("W1AW").unwrap().country, "United States");
        assert_eq!(dxcc.lookup("VE3XYZ").unwrap().country, "Canada");
        assert_eq!(dxcc.lookup("PY2XYZ").unwrap().continent, "SA");
    }

    #[test]
    fn exact_alias_overrides_zone() {
        let dxcc = sample();
        let record = dxcc.lookup("K1ABC").unwrap();
        assert_eq!(record.cqzone, 4);
        // the base record is untouched
        assert_eq!(dxcc.lookup("K9XX").unwrap().cqzone, 5);
    }

    #[test]
    fn lookup_uppercases() {
        assert_eq!(sample().lookup("w1aw").unwrap().country, "United States");
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        assert!(matches!(
            sample().lookup("ZK9QQQ"),
            Err(Error::UnknownPrefix(_))
        ));
    }

    #[test]
    fn entity_queries() {
        let dxcc = sample();
        assert!(dxcc.is_entity("Canada"));
        assert!(!dxcc.is_entity("Atlantis"));
        let prefixes = dxcc.get_entity("United States").unwrap();
        assert!(prefixes.contains("W"));
        assert!(prefixes.contains("K1ABC"));
    }

    #[test]
    fn cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cty_cache.json");
        let dxcc = sample();
        dxcc.write_cache(&path).unwrap();
        let reloaded = Dxcc::from_cache(&path).unwrap();
        assert_eq!(reloaded.len(), dxcc.len());
        assert_eq!(
            reloaded.lookup("K1ABC").unwrap(),
            dxcc.lookup("K1ABC").unwrap()
        );
    }
}
