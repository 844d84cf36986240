//! Per-host download concurrency limiting
//!
//! Each host gets its own semaphore, created on first use, so that at most
//! `limit` downloads to one host run at the same time. A host's entry is
//! removed again once nobody holds or waits for one of its slots. A limit of
//! zero disables the whole mechanism.

use crate::url::host_of;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type HostMap = Arc<Mutex<HashMap<String, Arc<Semaphore>>>>;

pub struct HostLimiter {
    limit: usize,
    hosts: HostMap,
}

impl HostLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            hosts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns true if downloads are limited per host
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Waits for a download slot on the host of `url`
    ///
    /// Returns `None` without waiting when limiting is disabled or the URL has
    /// no recognizable host. The slot is released when the permit drops.
    pub async fn acquire(&self, url: &str) -> Option<HostPermit> {
        if !self.is_enabled() {
            return None;
        }

        let host = host_of(url)?;
        let semaphore = {
            let mut hosts = self.hosts.lock();
            Arc::clone(
                hosts
                    .entry(host.clone())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.limit))),
            )
        };

        // Registered before waiting so a cancelled wait still cleans up
        let mut permit = HostPermit {
            host,
            semaphore,
            permit: None,
            hosts: Arc::clone(&self.hosts),
        };
        permit.permit = Arc::clone(&permit.semaphore).acquire_owned().await.ok();
        permit.permit.as_ref()?;

        Some(permit)
    }

    /// Number of hosts with a download running or waiting
    #[cfg(test)]
    pub(crate) fn tracked_hosts(&self) -> usize {
        self.hosts.lock().len()
    }
}

/// A download slot on one host; released on drop
pub struct HostPermit {
    host: String,
    semaphore: Arc<Semaphore>,
    permit: Option<OwnedSemaphorePermit>,
    hosts: HostMap,
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        self.permit.take();

        // Acquirers clone the semaphore under this lock, so a count of two
        // (the map and this guard) means the host is idle
        let mut hosts = self.hosts.lock();
        let idle = hosts
            .get(&self.host)
            .map_or(false, |current| {
                Arc::ptr_eq(current, &self.semaphore) && Arc::strong_count(current) == 2
            });
        if idle {
            hosts.remove(&self.host);
        }
    }
}
