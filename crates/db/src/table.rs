// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The partitioned table engine (§4.3).

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{error, warn};
use vra_core::AgentError;
use vra_scheduler::{InstanceKey, TaskClassId, TaskScheduler};

use crate::entry::{Entry, EntryId, NotifyKind};
use crate::hooks::{ResyncSource, TableHooks};
use crate::lifetime::{LifetimeActor, LifetimeManager};
use crate::listener::{ListenerId, TableListener};

/// A mutation submitted against a table key.
pub enum Oper<V> {
    AddOrUpdate(V),
    Delete,
}

struct Request<K, V> {
    key: K,
    oper: Oper<V>,
}

/// Construction-time tuning knobs for a [`Table`] (§4.3, §6).
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Number of shards; must be a power of two.
    pub shards: NonZeroUsize,
    /// Requests drained from a shard queue per batch.
    pub batch_size: usize,
    /// Queue depth above which `enqueue` starts returning `Overload`.
    pub high_water_mark: usize,
    /// How long a deleted-but-not-retired entry is given before the delete
    /// timer fires.
    pub delete_timeout: Duration,
    /// Whether delete-timer expiry aborts the process (production default)
    /// or only logs (used by tests).
    pub fatal_on_delete_timeout: bool,
    /// Lifetime manager scan interval.
    pub retirement_interval: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            shards: NonZeroUsize::MIN,
            batch_size: 64,
            high_water_mark: 4096,
            delete_timeout: Duration::from_secs(30),
            fatal_on_delete_timeout: true,
            retirement_interval: Duration::from_millis(200),
        }
    }
}

struct Shard<K, V> {
    map: RwLock<BTreeMap<K, Arc<Entry<K, V>>>>,
    sender: Sender<Request<K, V>>,
    receiver: Receiver<Request<K, V>>,
    delete_timers: Mutex<std::collections::HashMap<K, tokio::task::JoinHandle<()>>>,
}

struct TableShared<K, V, H> {
    name: String,
    config: TableConfig,
    scheduler: Arc<TaskScheduler>,
    class_id: TaskClassId,
    lifetime: Arc<LifetimeManager>,
    hooks: H,
    shards: Vec<Shard<K, V>>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn TableListener<K, V>>)>>,
    next_entry_id: AtomicU64,
    resync: Option<Arc<dyn ResyncSource<K, V>>>,
}

/// A partitioned, versioned, reference-counted key/value table (§4.3).
///
/// Cloning a `Table` is cheap and shares the underlying shards; this is the
/// handle every component that needs to read or mutate the table holds.
pub struct Table<K, V, H> {
    shared: Arc<TableShared<K, V, H>>,
}

impl<K, V, H> Clone for Table<K, V, H> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<K, V, H> Table<K, V, H>
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    pub fn new(
        name: impl Into<String>,
        scheduler: Arc<TaskScheduler>,
        class_id: TaskClassId,
        hooks: H,
        config: TableConfig,
    ) -> Self {
        let name = name.into();
        let shards = (0..config.shards.get())
            .map(|_| {
                let (sender, receiver) = crossbeam_channel::unbounded();
                Shard {
                    map: RwLock::new(BTreeMap::new()),
                    sender,
                    receiver,
                    delete_timers: Mutex::new(std::collections::HashMap::new()),
                }
            })
            .collect();

        let lifetime = LifetimeManager::new(
            Arc::clone(&scheduler),
            class_id,
            InstanceKey::new(format!("{name}#lifetime")),
            config.retirement_interval,
        );

        Self {
            shared: Arc::new(TableShared {
                name,
                config,
                scheduler,
                class_id,
                lifetime,
                hooks,
                shards,
                listeners: RwLock::new(Vec::new()),
                next_entry_id: AtomicU64::new(1),
                resync: None,
            }),
        }
    }

    /// Attach a resync source. Must be called before the table is cloned;
    /// cloning shares the single `Arc<TableShared>` this mutates in place.
    pub fn with_resync(mut self, resync: Arc<dyn ResyncSource<K, V>>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.resync = Some(resync);
        }
        self
    }

    pub fn register_listener(&self, listener: Arc<dyn TableListener<K, V>>) -> ListenerId {
        let id = ListenerId::new();
        self.shared.listeners.write().push((id, listener));
        id
    }

    pub fn unregister_listener(&self, id: ListenerId) {
        self.shared.listeners.write().retain(|(existing, _)| *existing != id);
    }

    /// The table's name, as used for its scheduler instance keys.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of shards (`P`); walkers submit one scan task per shard.
    pub fn shard_count(&self) -> usize {
        self.shared.shards.len()
    }

    /// The scheduler class this table's shard drains (and walker scans)
    /// run under.
    pub fn class_id(&self) -> TaskClassId {
        self.shared.class_id
    }

    /// The scheduler this table (and anything walking it) submits work to.
    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.shared.scheduler
    }

    /// A point-in-time snapshot of a single shard's entries, cloned
    /// `Arc<Entry<_>>` handles so concurrent retirement cannot shrink the
    /// snapshot mid-iteration (§4.4).
    pub fn shard_snapshot(&self, idx: usize) -> Vec<Arc<Entry<K, V>>> {
        self.shared.shards[idx].map.read().values().cloned().collect()
    }

    /// A point-in-time, key-ordered snapshot spanning every shard.
    ///
    /// §3 requires total key order only *within* a shard; this merges all
    /// shards' sorted entries into one global key order for consumers that
    /// need a single table-wide sweep regardless of hash-based shard
    /// placement (e.g. the flow aging loop's "successor of the last visited
    /// key, wrapping at the end" cursor, §4.5).
    pub fn snapshot_all(&self) -> Vec<Arc<Entry<K, V>>> {
        let mut all: Vec<Arc<Entry<K, V>>> = self
            .shared
            .shards
            .iter()
            .flat_map(|shard| shard.map.read().values().cloned().collect::<Vec<_>>())
            .collect();
        all.sort_by(|a, b| a.key().cmp(b.key()));
        all
    }

    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let mask = self.shared.shards.len() - 1;
        (hasher.finish() as usize) & mask
    }

    /// Look up an entry by key. `include_deleted` controls whether entries
    /// between `Delete` and retirement are still visible (§4.2: "the owning
    /// entry MUST remain findable by key" until `Destroy`).
    pub fn find(&self, key: &K, include_deleted: bool) -> Option<Arc<Entry<K, V>>> {
        let shard = &self.shared.shards[self.shard_index(key)];
        let map = shard.map.read();
        map.get(key).filter(|e| include_deleted || !e.is_deleted()).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.shards.iter().map(|s| s.map.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submit an add/update or delete request. Returns `Overload` instead of
    /// queuing when the target shard's backlog exceeds the configured
    /// high-water mark; the request is never silently dropped (§7) — the
    /// caller (and its scheduler class) is expected to back off and retry.
    pub fn enqueue(&self, key: K, oper: Oper<V>) -> Result<(), AgentError> {
        let idx = self.shard_index(&key);
        let shard = &self.shared.shards[idx];
        if shard.receiver.len() >= self.shared.config.high_water_mark {
            return Err(AgentError::overload(format!(
                "table {} shard {idx} backlog exceeds high water mark",
                self.shared.name
            )));
        }
        shard
            .sender
            .send(Request { key, oper })
            .map_err(|_| AgentError::invariant("table shard queue disconnected"))?;
        self.submit_drain(idx);
        Ok(())
    }

    fn submit_drain(&self, idx: usize) {
        let shared = Arc::clone(&self.shared);
        let instance_key = InstanceKey::shard(&shared.name, idx);
        let class_id = shared.class_id;
        shared.scheduler.clone().enqueue(class_id, instance_key, async move {
            drain_shard(shared, idx);
        });
    }
}

fn drain_shard<K, V, H>(shared: Arc<TableShared<K, V, H>>, idx: usize)
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    let shard = &shared.shards[idx];
    let batch_size = shared.config.batch_size;
    let mut batch = Vec::with_capacity(batch_size);
    for _ in 0..batch_size {
        match shard.receiver.try_recv() {
            Ok(req) => batch.push(req),
            Err(_) => break,
        }
    }
    if batch.is_empty() {
        return;
    }

    let mut notifications: Vec<(NotifyKind, Arc<Entry<K, V>>)> = Vec::with_capacity(batch.len());
    {
        let mut map = shard.map.write();
        for req in batch {
            match req.oper {
                Oper::AddOrUpdate(data) => {
                    let data = shared.hooks.alloc(&req.key, data);
                    if let Some(entry) = map.get(&req.key) {
                        if entry.is_deleted() {
                            warn!(table = %shared.name, "dropping add for key pending delete");
                            continue;
                        }
                        shared.hooks.on_change(entry, &data);
                        entry.set_payload(data);
                        notifications.push((NotifyKind::Change, Arc::clone(entry)));
                    } else {
                        let id: EntryId = shared.next_entry_id.fetch_add(1, Ordering::Relaxed);
                        let entry = Arc::new(Entry::new(id, req.key.clone(), data));
                        shared.hooks.add(&entry);
                        map.insert(req.key, Arc::clone(&entry));
                        notifications.push((NotifyKind::Add, entry));
                    }
                }
                Oper::Delete => {
                    if let Some(entry) = map.get(&req.key) {
                        if entry.is_deleted() {
                            continue;
                        }
                        entry.mark_deleted();
                        shared.hooks.delete(entry);
                        notifications.push((NotifyKind::Delete, Arc::clone(entry)));
                        start_delete_timer(&shared, idx, req.key.clone(), Arc::clone(entry));
                        shared.lifetime.register(Arc::new(EntryRetirement {
                            shared: Arc::clone(&shared),
                            shard_idx: idx,
                            key: req.key.clone(),
                            entry: Arc::clone(entry),
                        }));
                    } else {
                        warn!(table = %shared.name, "delete for unknown key dropped");
                    }
                }
            }
        }
    }

    let listeners = shared.listeners.read().clone();
    for (kind, entry) in notifications {
        if !shared.hooks.can_notify(&entry) {
            continue;
        }
        for (_, listener) in &listeners {
            listener.notify(kind, &entry);
        }
    }

    if shard.receiver.len() > 0 {
        let shared = Arc::clone(&shared);
        let instance_key = InstanceKey::shard(&shared.name, idx);
        let class_id = shared.class_id;
        shared.scheduler.clone().enqueue(class_id, instance_key, async move {
            drain_shard(shared, idx);
        });
    }
}

fn start_delete_timer<K, V, H>(shared: &Arc<TableShared<K, V, H>>, idx: usize, key: K, entry: Arc<Entry<K, V>>)
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    let shared_for_timer = Arc::clone(shared);
    let key_for_timer = key.clone();
    let timeout = shared.config.delete_timeout;
    let fatal = shared.config.fatal_on_delete_timeout;
    let table_name = shared.name.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if entry.is_retired() {
            return;
        }
        error!(
            table = %table_name,
            holders = entry.holder_count(),
            "delete timer expired before entry retired"
        );
        if fatal {
            std::process::exit(1);
        }
    });
    shared_for_timer.shards[idx].delete_timers.lock().insert(key_for_timer, handle);
}

/// The lifetime actor for a single deleted table entry: ready once every
/// holder has released, destroys by removing the row from its shard map and
/// consulting the reuse/resync protocol for a pending re-creation (§4.3).
struct EntryRetirement<K, V, H> {
    shared: Arc<TableShared<K, V, H>>,
    shard_idx: usize,
    key: K,
    entry: Arc<Entry<K, V>>,
}

impl<K, V, H> LifetimeActor for EntryRetirement<K, V, H>
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    fn may_delete(&self) -> bool {
        self.entry.holder_count() == 0
    }

    fn shutdown(&self) {}

    fn destroy(&self) {
        let shard = &self.shared.shards[self.shard_idx];
        if let Some(handle) = shard.delete_timers.lock().remove(&self.key) {
            handle.abort();
        }
        self.entry.mark_retired();
        shard.map.write().remove(&self.key);

        if let Some(resync) = &self.shared.resync {
            if let Some(data) = resync.pending_recreate(&self.key) {
                let table = Table { shared: Arc::clone(&self.shared) };
                if let Err(err) = table.enqueue(self.key.clone(), Oper::AddOrUpdate(data)) {
                    error!(%err, "failed to re-enqueue pending recreate after retire");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
