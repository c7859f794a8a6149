//! The sighting store: one row per (callsign, band) heard calling CQ.
//!
//! A single SQLite file serializes one writer thread against any number of
//! readers (selectors, inspection tools). Rows move through status 0
//! (candidate) → 1 (replying) → 2 (logged) and never regress; logged rows
//! are immune to the upsert.
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

pub mod purge;
pub mod tagged;
pub mod writer;

pub use writer::{Command, Writer};

const BUSY_TIMEOUT: Duration = Duration::from_secs(15);
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SQL_TABLE: &str = "
CREATE TABLE IF NOT EXISTS cqcalls
(
  call TEXT,
  extra TEXT,
  time TIMESTAMP,
  status INTEGER,
  snr INTEGER,
  grid TEXT,
  lat REAL,
  lon REAL,
  distance REAL,
  azimuth REAL,
  country TEXT,
  continent TEXT,
  cqzone INTEGER,
  ituzone INTEGER,
  frequency INTEGER,
  band INTEGER,
  packet JSON
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_call ON cqcalls (call, band);
CREATE INDEX IF NOT EXISTS idx_time ON cqcalls (time DESC);
CREATE INDEX IF NOT EXISTS idx_grid ON cqcalls (grid ASC);
";

const SQL_INSERT: &str = "
INSERT INTO cqcalls VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
ON CONFLICT(call, band) DO UPDATE SET snr = excluded.snr, packet = excluded.packet
WHERE status <> 2
";
const SQL_STATUS: &str =
    "UPDATE cqcalls SET status = ?1 WHERE status <> 2 AND call = ?2 AND band = ?3";
const SQL_DELETE: &str = "DELETE FROM cqcalls WHERE status = 1 AND call = ?1 AND band = ?2";
const SQL_PURGE: &str = "DELETE FROM cqcalls WHERE status < 2 AND time < datetime('now', ?1)";

/// Derive the band (meters) from a dial frequency in Hz. Frequencies
/// outside the table map to 0.
pub fn get_band(frequency: u64) -> u32 {
    match frequency / 1_000_000 {
        1 => 160,
        3 => 80,
        7 => 40,
        10 => 30,
        14 => 20,
        18 => 17,
        21 => 15,
        24 => 12,
        28 => 10,
        50 => 6,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Candidate,
    Replying,
    Logged,
}

impl Status {
    pub fn as_i64(self) -> i64 {
        match self {
            Status::Candidate => 0,
            Status::Replying => 1,
            Status::Logged => 2,
        }
    }

    fn from_i64(value: i64) -> Status {
        match value {
            1 => Status::Replying,
            2 => Status::Logged,
            _ => Status::Candidate,
        }
    }
}

/// The decoded transmission that produced a sighting, kept verbatim so a
/// Reply can echo it back to the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Time", with = "tagged::datetime")]
    pub time: DateTime<Utc>,
    #[serde(rename = "New")]
    pub new: bool,
    #[serde(rename = "SNR")]
    pub snr: i32,
    #[serde(rename = "DeltaTime")]
    pub delta_time: f64,
    #[serde(rename = "DeltaFrequency")]
    pub delta_frequency: u32,
    #[serde(rename = "Mode")]
    pub mode: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "LowConfidence")]
    pub low_confidence: bool,
    #[serde(rename = "OffAir")]
    pub off_air: bool,
}

impl From<&crate::packet::decode::Packet> for Envelope {
    fn from(packet: &crate::packet::decode::Packet) -> Envelope {
        Envelope {
            time: packet.datetime(),
            new: packet.new,
            snr: packet.snr,
            delta_time: packet.delta_time,
            delta_frequency: packet.delta_frequency,
            mode: packet.mode.clone(),
            message: packet.message.clone(),
            low_confidence: packet.low_confidence,
            off_air: packet.off_air,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sighting {
    pub call: String,
    pub extra: Option<String>,
    pub time: DateTime<Utc>,
    pub status: Status,
    pub snr: i32,
    pub grid: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub distance: f64,
    pub azimuth: u32,
    pub country: String,
    pub continent: String,
    pub cqzone: u16,
    pub ituzone: u16,
    pub frequency: u64,
    pub band: u32,
    pub packet: Envelope,
}

impl Sighting {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Sighting> {
        let time: String = row.get("time")?;
        let time = NaiveDateTime::parse_from_str(&time, TIME_FORMAT)
            .map_err(|err| conversion_error(row, "time", err))?;
        let packet: String = row.get("packet")?;
        let packet: Envelope = serde_json::from_str(&packet)
            .map_err(|err| conversion_error(row, "packet", err))?;
        Ok(Sighting {
            call: row.get("call")?,
            extra: row.get("extra")?,
            time: DateTime::from_naive_utc_and_offset(time, Utc),
            status: Status::from_i64(row.get("status")?),
            snr: row.get("snr")?,
            grid: row.get("grid")?,
            lat: row.get("lat")?,
            lon: row.get("lon")?,
            distance: row.get("distance")?,
            azimuth: row.get::<_, f64>("azimuth")? as u32,
            country: row.get("country")?,
            continent: row.get("continent")?,
            cqzone: row.get::<_, i64>("cqzone")? as u16,
            ituzone: row.get::<_, i64>("ituzone")? as u16,
            frequency: row.get::<_, i64>("frequency")? as u64,
            band: row.get::<_, i64>("band")? as u32,
            packet,
        })
    }
}

fn conversion_error(
    row: &rusqlite::Row,
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    let index = row.as_ref().column_index(column).unwrap_or(usize::MAX);
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

/// True when an error is transient lock contention rather than a real
/// failure; the enqueue-and-retry design absorbs these.
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Store> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        register_regexp(&conn)?;
        Ok(Store { conn })
    }

    /// Open and make sure the schema exists; called once at startup.
    pub fn create<P: AsRef<Path>>(path: P) -> rusqlite::Result<Store> {
        let store = Store::open(path)?;
        store.conn.execute_batch(SQL_TABLE)?;
        Ok(store)
    }

    /// Insert or refresh a sighting. Returns false when the row was left
    /// untouched because the station is already logged on this band.
    pub fn upsert(&self, sighting: &Sighting) -> rusqlite::Result<bool> {
        let packet = serde_json::to_string(&sighting.packet)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        let count = self.conn.execute(
            SQL_INSERT,
            params![
                sighting.call,
                sighting.extra,
                sighting.time.format(TIME_FORMAT).to_string(),
                sighting.status.as_i64(),
                sighting.snr,
                sighting.grid,
                sighting.lat,
                sighting.lon,
                sighting.distance,
                sighting.azimuth,
                sighting.country,
                sighting.continent,
                sighting.cqzone,
                sighting.ituzone,
                sighting.frequency as i64,
                sighting.band,
                packet,
            ],
        )?;
        Ok(count > 0)
    }

    pub fn set_status(&self, call: &str, band: u32, status: Status) -> rusqlite::Result<usize> {
        self.conn
            .execute(SQL_STATUS, params![status.as_i64(), call, band])
    }

    pub fn delete(&self, call: &str, band: u32) -> rusqlite::Result<usize> {
        self.conn.execute(SQL_DELETE, params![call, band])
    }

    /// Drop un-worked rows older than the retry window.
    pub fn purge(&self, minutes: u32) -> rusqlite::Result<usize> {
        self.conn
            .execute(SQL_PURGE, params![format!("-{minutes} minute")])
    }

    /// Rows eligible for selection: unanswered CQs on this band heard
    /// within the last `delta` seconds.
    pub fn candidates(&self, band: u32, delta: i64) -> rusqlite::Result<Vec<Sighting>> {
        self.query(
            "SELECT * FROM cqcalls WHERE status = 0 AND band = ?1 AND time > datetime('now', ?2)
             ORDER BY time ASC",
            params![band, format!("-{delta} second")],
        )
    }

    pub fn by_call(&self, expr: &str, band: Option<u32>) -> rusqlite::Result<Vec<Sighting>> {
        match band {
            Some(band) => self.query(
                "SELECT * FROM cqcalls WHERE call REGEXP ?1 AND band = ?2 ORDER BY time ASC",
                params![expr, band],
            ),
            None => self.query(
                "SELECT * FROM cqcalls WHERE call REGEXP ?1 ORDER BY time ASC",
                params![expr],
            ),
        }
    }

    pub fn by_country(&self, country: &str, band: Option<u32>) -> rusqlite::Result<Vec<Sighting>> {
        match band {
            Some(band) => self.query(
                "SELECT * FROM cqcalls WHERE country = ?1 AND band = ?2 ORDER BY time ASC",
                params![country, band],
            ),
            None => self.query(
                "SELECT * FROM cqcalls WHERE country = ?1 ORDER BY time ASC",
                params![country],
            ),
        }
    }

    pub fn by_status(&self, status: Status, band: Option<u32>) -> rusqlite::Result<Vec<Sighting>> {
        match band {
            Some(band) => self.query(
                "SELECT * FROM cqcalls WHERE status = ?1 AND band = ?2 ORDER BY time ASC",
                params![status.as_i64(), band],
            ),
            None => self.query(
                "SELECT * FROM cqcalls WHERE status = ?1 ORDER BY time ASC",
                params![status.as_i64()],
            ),
        }
    }

    pub fn recent(&self, minutes: u32, band: Option<u32>) -> rusqlite::Result<Vec<Sighting>> {
        let window = format!("-{minutes} minute");
        match band {
            Some(band) => self.query(
                "SELECT * FROM cqcalls WHERE time > datetime('now', ?1) AND band = ?2
                 ORDER BY time ASC",
                params![window, band],
            ),
            None => self.query(
                "SELECT * FROM cqcalls WHERE time > datetime('now', ?1) ORDER BY time ASC",
                params![window],
            ),
        }
    }

    /// Countries already logged at least `count` times on this band.
    pub fn worked_countries(&self, band: u32, count: u32) -> rusqlite::Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT country FROM cqcalls WHERE status = 2 AND band = ?1
             GROUP BY country HAVING count(*) >= ?2",
        )?;
        let rows = stmt.query_map(params![band, count], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> rusqlite::Result<Vec<Sighting>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Sighting::from_row)?;
        rows.collect()
    }
}

/// `REGEXP(pattern, value)` → 0|1 with search (not anchored) semantics,
/// compiled once per statement via the auxiliary-data slot.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regexp: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<Regex, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let value = ctx.get_raw(1).as_str().map_err(|err| {
                rusqlite::Error::UserFunctionError(err.into())
            })?;
            Ok(regexp.is_match(value))
        },
    )
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
