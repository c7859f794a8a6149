//! Periodic eviction of stale, un-worked sightings.
use std::time::Duration;

use tracing::{debug, error, info};

use crate::store::Store;

const CYCLE: Duration = Duration::from_secs(60);

pub struct Purge {
    store: Store,
    retry_minutes: u32,
}

impl Purge {
    pub fn new(store: Store, retry_minutes: u32) -> Purge {
        Purge {
            store,
            retry_minutes,
        }
    }

    pub fn run(self) {
        info!(
            "purge thread started (retry_time {} minutes)",
            self.retry_minutes
        );
        loop {
            match self.store.purge(self.retry_minutes) {
                Ok(count) => debug!("purged {count} records"),
                Err(err) => error!("{err}"),
            }
            std::thread::sleep(CYCLE);
        }
    }
}
