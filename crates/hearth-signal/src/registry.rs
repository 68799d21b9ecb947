//! Snapshot-swapped device-kind registry.
//!
//! The registry is read on every mapped message and written only when the
//! device inventory changes, so reads clone an `Arc` snapshot under a brief
//! read lock and writes build a fresh map and swap it in. Lookups are
//! case-insensitive on the device id.

use hearth_types::DeviceKind;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type KindTable = HashMap<String, DeviceKind>;

/// Static device-id → kind table, swapped atomically on update.
///
/// Locks are held only for the map clone/swap and never across `.await`
/// points, so a synchronous lock is safe here.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    table: RwLock<Arc<KindTable>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the given entries.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, DeviceKind)>,
        S: Into<String>,
    {
        let registry = Self::new();
        registry.replace(entries);
        registry
    }

    /// Looks up the kind for a device id, case-insensitively.
    pub fn lookup(&self, device_id: &str) -> Option<DeviceKind> {
        let snapshot = self.snapshot();
        snapshot.get(&device_id.to_ascii_lowercase()).copied()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Replaces the whole table with a fresh snapshot.
    pub fn replace<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = (S, DeviceKind)>,
        S: Into<String>,
    {
        let table: KindTable = entries
            .into_iter()
            .map(|(id, kind)| (id.into().to_ascii_lowercase(), kind))
            .collect();
        self.swap(Arc::new(table));
    }

    /// Adds or updates a single entry by building and swapping a new snapshot.
    pub fn insert(&self, device_id: &str, kind: DeviceKind) {
        let mut table: KindTable = self.snapshot().as_ref().clone();
        table.insert(device_id.to_ascii_lowercase(), kind);
        self.swap(Arc::new(table));
    }

    fn snapshot(&self) -> Arc<KindTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, table: Arc<KindTable>) {
        match self.table.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }
}
