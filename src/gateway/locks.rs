//! Per-address mutual exclusion for the field bus (C3).
//!
//! Two in-flight requests to the same board address must never interleave
//! their transactions; requests to different addresses must never wait on
//! each other. A `DashMap<u8, Arc<Mutex<()>>>` with lazy insertion covers
//! both: a fresh board address gets its lock created on first use, and a
//! sparse deployment (a handful of addresses out of 255 possible) never
//! pays for slots it doesn't use.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily-populated registry of per-address locks.
#[derive(Debug, Default)]
pub struct AddressLocks {
    locks: DashMap<u8, Arc<Mutex<()>>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn entry(&self, address: u8) -> Arc<Mutex<()>> {
        self.locks
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `address`, blocking out any other transaction
    /// to the same board until the guard is dropped.
    pub async fn acquire(&self, address: u8) -> OwnedMutexGuard<()> {
        self.entry(address).lock_owned().await
    }

    /// Number of addresses that currently have a lock entry (not
    /// necessarily held) — used for diagnostics.
    pub fn tracked_addresses(&self) -> usize {
        self.locks.len()
    }

    /// Number of addresses whose lock is currently held.
    pub fn held_count(&self) -> usize {
        self.locks
            .iter()
            .filter(|entry| entry.value().try_lock().is_err())
            .count()
    }
}
