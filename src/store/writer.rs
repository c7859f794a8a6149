//! The single writer to the sighting store.
//!
//! Commands arrive on a FIFO channel from the sequencer, so per-(call,
//! band) writes apply in enqueue order. Inserts are enriched here —
//! geodesy against the operator's origin, entity data from the prefix
//! database — keeping the sequencer loop free of lookups.
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::dxcc::{self, Dxcc};
use crate::geo::{self, GridCache};
use crate::store::{Envelope, Sighting, Status, Store};

#[derive(Debug)]
pub enum Command {
    Insert(CqCall),
    Status {
        call: String,
        status: Status,
        band: u32,
    },
    Delete {
        call: String,
        band: u32,
    },
}

/// A CQ as heard on the air, before enrichment.
#[derive(Debug)]
pub struct CqCall {
    pub call: String,
    pub extra: Option<String>,
    pub grid: Option<String>,
    pub frequency: u64,
    pub band: u32,
    pub packet: Envelope,
}

pub struct Writer {
    store: Store,
    receiver: UnboundedReceiver<Command>,
    origin: (f64, f64),
    grids: GridCache,
    dxcc: Arc<Dxcc>,
}

impl Writer {
    pub fn new(
        store: Store,
        receiver: UnboundedReceiver<Command>,
        origin: (f64, f64),
        dxcc: Arc<Dxcc>,
    ) -> Writer {
        Writer {
            store,
            receiver,
            origin,
            grids: GridCache::new(),
            dxcc,
        }
    }

    /// Consume the command channel until every sender is gone.
    pub fn run(mut self) {
        info!("database writer thread started");
        while let Some(command) = self.receiver.blocking_recv() {
            match command {
                Command::Insert(cq) => self.insert(cq),
                Command::Status { call, status, band } => {
                    if let Err(err) = self.store.set_status(&call, band, status) {
                        self.report(&err);
                    }
                }
                Command::Delete { call, band } => {
                    if let Err(err) = self.store.delete(&call, band) {
                        self.report(&err);
                    }
                }
            }
        }
    }

    fn insert(&mut self, cq: CqCall) {
        let (lat, lon) = match cq.grid.as_deref() {
            Some(grid) => match self.grids.latlon(grid) {
                Ok(latlon) => latlon,
                Err(err) => {
                    warn!("{err}");
                    return;
                }
            },
            None => (0.0, 0.0),
        };

        let entity = match self.dxcc.lookup(&cq.call) {
            Ok(entity) => entity,
            Err(dxcc::Error::UnknownPrefix(call)) => {
                error!("DXCC entity for {call} not found, this is probably a fake callsign");
                return;
            }
            Err(err) => {
                error!("prefix lookup failed: {err}");
                return;
            }
        };

        let sighting = Sighting {
            time: cq.packet.time,
            status: Status::Candidate,
            snr: cq.packet.snr,
            lat,
            lon,
            distance: geo::distance(self.origin, (lat, lon)),
            azimuth: geo::azimuth(self.origin, (lat, lon)),
            country: entity.country.clone(),
            continent: entity.continent.clone(),
            cqzone: entity.cqzone,
            ituzone: entity.ituzone,
            call: cq.call,
            extra: cq.extra,
            grid: cq.grid,
            frequency: cq.frequency,
            band: cq.band,
            packet: cq.packet,
        };

        match self.store.upsert(&sighting) {
            Ok(true) => debug!(
                "db write: {}, {}, {:?}, {}",
                sighting.call, sighting.continent, sighting.grid, sighting.country
            ),
            Ok(false) => debug!(
                "db write: already worked {} on {}m",
                sighting.call, sighting.band
            ),
            Err(err) => self.report(&err),
        }
    }

    fn report(&self, err: &rusqlite::Error) {
        if crate::store::is_busy(err) {
            warn!("queue len: {} - error: {err}", self.receiver.len());
        } else {
            error!("{err}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn sample_dxcc() -> Arc<Dxcc> {
        let csv = "\
K,United States,291,NA,5,8,37.53,-91.67,5.0,W N;
PY,Brazil,108,SA,11,15,-10.0,-53.0,3.0,PP;
";
        Arc::new(Dxcc::from_csv(csv.as_bytes()).unwrap())
    }

    fn cq(call: &str, grid: Option<&str>) -> CqCall {
        CqCall {
            call: call.to_string(),
            extra: None,
            grid: grid.map(str::to_string),
            frequency: 14_074_000,
            band: 20,
            packet: Envelope {
                time: Utc::now(),
                new: true,
                snr: -5,
                delta_time: 0.2,
                delta_frequency: 1500,
                mode: Some("~".to_string()),
                message: Some(format!("CQ {call} {}", grid.unwrap_or(""))),
                low_confidence: false,
                off_air: false,
            },
        }
    }

    fn writer(dir: &TempDir) -> (Writer, mpsc::UnboundedSender<Command>) {
        let store = Store::create(dir.path().join("cqcalls.db")).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        // origin: CM87 (San Francisco Bay)
        let origin = crate::geo::grid_to_latlon("CM87").unwrap();
        (Writer::new(store, rx, origin, sample_dxcc()), tx)
    }

    #[test]
    fn insert_enriches_the_sighting() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, _tx) = writer(&dir);
        writer.insert(cq("W1AW", Some("FN31")));

        let rows = writer.store.by_call("W1AW", Some(20)).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.country, "United States");
        assert_eq!(row.continent, "NA");
        assert_eq!(row.band, 20);
        assert_eq!(row.lat, 41.0);
        assert_eq!(row.lon, -74.0);
        assert!(row.distance > 3000.0 && row.distance < 6000.0);
        assert!(row.azimuth < 360);
    }

    #[test]
    fn unknown_prefix_drops_the_sighting() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, _tx) = writer(&dir);
        writer.insert(cq("ZK9QQQ", Some("FN31")));
        assert!(writer.store.by_call(".", None).unwrap().is_empty());
    }

    #[test]
    fn gridless_cq_is_stored_without_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, _tx) = writer(&dir);
        writer.insert(cq("PY2XYZ", None));
        let rows = writer.store.by_call("PY2XYZ", None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].lat, rows[0].lon), (0.0, 0.0));
    }

    #[test]
    fn commands_apply_in_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, tx) = writer(&dir);
        tx.send(Command::Insert(cq("W1AW", Some("FN31")))).unwrap();
        tx.send(Command::Status {
            call: "W1AW".to_string(),
            status: Status::Replying,
            band: 20,
        })
        .unwrap();
        drop(tx);
        writer.run();

        let store = Store::open(dir.path().join("cqcalls.db")).unwrap();
        let rows = store.by_status(Status::Replying, Some(20)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].call, "W1AW");
    }
}
