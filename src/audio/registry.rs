use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::task::JoinHandle;
use tracing::debug;

struct WorkerSlot {
    id: u64,
    handle: JoinHandle<()>,
}

/// Supervised queue workers, at most one per guild.
///
/// Callers hold the guild's state lock around `start`, `abort` and `retire`,
/// which is what makes the check-then-spawn in the controller atomic.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: DashMap<GuildId, WorkerSlot>,
    started: DashMap<GuildId, u64>,
    next_id: AtomicU64,
}

impl WorkerRegistry {
    pub fn is_running(&self, guild_id: GuildId) -> bool {
        self.workers
            .get(&guild_id)
            .is_some_and(|slot| !slot.handle.is_finished())
    }

    /// Spawns the worker built by `make` and registers it for `guild_id`,
    /// replacing (and aborting) any previous slot.
    pub fn start<F, Fut>(&self, guild_id: GuildId, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = tokio::spawn(make(id));

        if let Some(previous) = self.workers.insert(guild_id, WorkerSlot { id, handle }) {
            previous.handle.abort();
        }
        *self.started.entry(guild_id).or_insert(0) += 1;

        debug!("🧵 Worker {} iniciado para guild {}", id, guild_id);
        id
    }

    /// Aborts the registered worker; returns whether one was live.
    pub fn abort(&self, guild_id: GuildId) -> bool {
        match self.workers.remove(&guild_id) {
            Some((_, slot)) => {
                let live = !slot.handle.is_finished();
                slot.handle.abort();
                debug!("🛑 Worker {} abortado en guild {}", slot.id, guild_id);
                live
            }
            None => false,
        }
    }

    /// Called by a worker on its way out; a newer worker's slot is left alone.
    pub fn retire(&self, guild_id: GuildId, id: u64) {
        if self.workers.remove_if(&guild_id, |_, slot| slot.id == id).is_some() {
            debug!("Worker {} retirado en guild {}", id, guild_id);
        }
    }

    /// Number of workers ever started for `guild_id`.
    pub fn workers_started(&self, guild_id: GuildId) -> u64 {
        self.started.get(&guild_id).map(|count| *count).unwrap_or(0)
    }
}
