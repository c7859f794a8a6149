//! Cache of callsigns recently active on Logbook of The World.
//!
//! The ARRL publishes a CSV of `callsign,last-upload-date` rows. Stations
//! seen within the last 270 days are kept in a keyed cache file together
//! with an `__age__` entry recording the refresh time; the cache itself
//! expires after 7 days. Selectors use membership as a "likely to confirm"
//! filter.
use std::collections::HashMap;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDate};
use lru::LruCache;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LOTW_URL: &str = "https://lotw.arrl.org/lotw-user-activity.csv";
const CACHE_EXPIRE: Duration = Duration::from_secs(7 * 86400);
const LAST_SEEN_DAYS: i64 = 270;
const MEMO_SIZE: usize = 512;
const AGE_KEY: &str = "__age__";

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("cache file error")]
    Cache(#[from] serde_json::Error),
    #[error("user activity fetch failed")]
    Fetch(#[from] reqwest::Error),
}

pub struct Lotw {
    users: HashMap<String, String>,
    memo: LruCache<String, bool>,
    hits: u64,
    misses: u64,
}

impl Lotw {
    /// Open the registry, refreshing the cache file from the ARRL when it
    /// is missing or expired. A failed refresh falls back to the stale
    /// cache when one exists.
    pub fn open(cache: &Path) -> Result<Self, Error> {
        if !cache_fresh(cache) {
            info!("LOTW cache expired, reloading from {LOTW_URL}");
            match fetch_users() {
                Ok(users) => write_cache(cache, &users)?,
                Err(err) if cache.exists() => {
                    warn!("LOTW fetch failed, using stale cache: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        let mut users: HashMap<String, String> =
            serde_json::from_reader(io::BufReader::new(fs::File::open(cache)?))?;
        users.remove(AGE_KEY);
        info!("LOTW lookup database ready ({} users)", users.len());
        Ok(Lotw {
            users,
            memo: LruCache::new(NonZeroUsize::new(MEMO_SIZE).unwrap()),
            hits: 0,
            misses: 0,
        })
    }

    /// Default cache location, shared across runs of the controller.
    pub fn default_cache_path() -> PathBuf {
        std::env::temp_dir().join("lotw_cache.json")
    }

    pub fn contains(&mut self, call: &str) -> bool {
        let call = call.trim().to_uppercase();
        if let Some(&known) = self.memo.get(&call) {
            self.hits += 1;
            return known;
        }
        self.misses += 1;
        let known = self.users.contains_key(&call);
        debug!("{call} in LOTW: {known}");
        self.memo.put(call, known);
        known
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// (hits, misses, entries) of the membership memo.
    pub fn cache_stats(&self) -> (u64, u64, usize) {
        (self.hits, self.misses, self.memo.len())
    }

    #[cfg(test)]
    pub(crate) fn from_users(users: HashMap<String, String>) -> Self {
        Lotw {
            users,
            memo: LruCache::new(NonZeroUsize::new(MEMO_SIZE).unwrap()),
            hits: 0,
            misses: 0,
        }
    }
}

fn cache_fresh(cache: &Path) -> bool {
    let Ok(meta) = fs::metadata(cache) else {
        return false;
    };
    let age = meta
        .modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok());
    matches!(age, Some(age) if age < CACHE_EXPIRE)
}

fn fetch_users() -> Result<HashMap<String, String>, Error> {
    // The LOTW host has a history of certificate trouble; membership data
    // is not sensitive, so validation stays off for this one fetch.
    let client = reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?;
    let body = client.get(LOTW_URL).send()?.error_for_status()?.text()?;
    Ok(parse_users(&body, Local::now().date_naive()))
}

fn parse_users(body: &str, today: NaiveDate) -> HashMap<String, String> {
    let cutoff = today - chrono::Duration::days(LAST_SEEN_DAYS);
    let mut users = HashMap::new();
    for line in body.lines() {
        let mut fields = line.split(',');
        let (Some(call), Some(date)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(last_seen) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
            continue;
        };
        if last_seen >= cutoff {
            users.insert(call.trim().to_uppercase(), date.trim().to_string());
        }
    }
    users
}

fn write_cache(cache: &Path, users: &HashMap<String, String>) -> Result<(), Error> {
    let mut keyed = users.clone();
    let age = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    keyed.insert(AGE_KEY.to_string(), age.to_string());
    serde_json::to_writer(io::BufWriter::new(fs::File::create(cache)?), &keyed)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn old_entries_are_discarded() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let body = "W1AW,2024-05-30,12:00:00\nK1OLD,2022-01-01,09:30:00\nN0DATE\n";
        let users = parse_users(body, today);
        assert!(users.contains_key("W1AW"));
        assert!(!users.contains_key("K1OLD"));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn membership_is_memoized() {
        let mut users = HashMap::new();
        users.insert("W1AW".to_string(), "2024-05-30".to_string());
        let mut lotw = Lotw::from_users(users);

        assert!(lotw.contains("w1aw "));
        assert!(lotw.contains("W1AW"));
        assert!(!lotw.contains("PY2XYZ"));
        let (hits, misses, entries) = lotw.cache_stats();
        assert_eq!((hits, misses, entries), (1, 2, 2));
    }

    #[test]
    fn cache_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotw_cache.json");
        let mut users = HashMap::new();
        users.insert("W1AW".to_string(), "2024-05-30".to_string());
        write_cache(&path, &users).unwrap();

        let mut lotw = Lotw::open(&path).unwrap();
        assert_eq!(lotw.len(), 1);
        assert!(lotw.contains("W1AW"));
    }
}
