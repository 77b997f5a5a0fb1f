use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::channel::ResultSender;
use crate::plugin::PluginRegistry;
use crate::scan::{scan_evidence, WorkerRuleCache};
use crate::store::CompiledRuleStore;
use crate::types::{MatchRecord, RunConfig};

enum SlotMessage {
    Job(PathBuf),
    Stop,
}

type IdleQueue = Arc<(Mutex<VecDeque<usize>>, Condvar)>;

/// A pool of persistent worker threads, one per configured slot (§4.3).
/// Each slot owns its own [`WorkerRuleCache`], so a ruleset is deserialized
/// at most once per slot rather than once per job — the isolation §4.3
/// requires ("no heap state is shared between them") falls directly out of
/// giving each thread its own cache and its own bounded channel, the same
/// actor-per-slot shape used for the interpreter pool this module is
/// descended from.
///
/// Slots are addressed by index rather than by handing channel senders
/// back and forth: the idle queue holds the indices of free slots, and
/// `slot_senders[i]` is the fixed channel a job (or the shutdown `Stop`)
/// for slot `i` is delivered through.
pub struct WorkerPool {
    idle: IdleQueue,
    slot_senders: Vec<SyncSender<SlotMessage>>,
    handles: Vec<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        store: Arc<CompiledRuleStore>,
        config: Arc<RunConfig>,
        results: ResultSender,
        cancellation: CancellationToken,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        let size = size.max(1);
        let idle: IdleQueue = Arc::new((Mutex::new((0..size).collect()), Condvar::new()));
        let mut handles = Vec::with_capacity(size);
        let mut slot_senders = Vec::with_capacity(size);

        for slot in 0..size {
            let (tx, rx) = mpsc::sync_channel::<SlotMessage>(1);
            slot_senders.push(tx);

            handles.push(start_slot_thread(
                slot,
                rx,
                Arc::clone(&store),
                Arc::clone(&config),
                results.clone(),
                cancellation.clone(),
                Arc::clone(&idle),
                Arc::clone(&plugins),
            ));
        }

        WorkerPool {
            idle,
            slot_senders,
            handles,
            cancellation,
        }
    }

    /// Blocks the calling (dispatcher) thread until a slot is free, then
    /// hands it `path`. Returns `false` without dispatching if cancellation
    /// has already been requested (§5: "tells the pool to stop accepting
    /// new jobs").
    pub fn dispatch(&self, path: PathBuf) -> bool {
        if self.cancellation.is_cancelled() {
            return false;
        }

        let slot = match self.claim_slot() {
            Some(slot) => slot,
            None => return false,
        };

        self.slot_senders[slot].send(SlotMessage::Job(path)).is_ok()
    }

    fn claim_slot(&self) -> Option<usize> {
        let (lock, cvar) = &*self.idle;
        let mut queue = lock.lock().unwrap();
        while queue.is_empty() {
            if self.cancellation.is_cancelled() {
                return None;
            }
            queue = cvar.wait(queue).unwrap();
        }
        queue.pop_front()
    }

    /// Blocks until a slot is idle, with no cancellation short-circuit.
    /// Unlike `claim_slot`, this must not give up: a job already in flight
    /// when cancellation fires still runs to completion and requeues its
    /// slot (workers only skip *future* jobs, §4.3), so every slot is
    /// guaranteed to show up here eventually.
    fn wait_for_any_idle_slot(&self) -> usize {
        let (lock, cvar) = &*self.idle;
        let mut queue = lock.lock().unwrap();
        while queue.is_empty() {
            queue = cvar.wait(queue).unwrap();
        }
        queue.pop_front().unwrap()
    }

    /// Waits for every slot to become idle (so no job is in flight), then
    /// tells each one to stop and joins its thread. Called once the
    /// Dispatcher has submitted every evidence.
    ///
    /// This must wait for genuine idleness regardless of cancellation state
    /// — `claim_slot`'s cancellation bail-out is correct for `dispatch`
    /// (stop accepting new work) but wrong here: it would hand back a
    /// colliding fallback slot index for any slot still busy when
    /// cancellation fired, so that slot's `Stop` never reaches it and its
    /// thread blocks on `rx.recv()` forever, hanging this `join`.
    pub fn shutdown(mut self) {
        let size = self.slot_senders.len();
        for _ in 0..size {
            let slot = self.wait_for_any_idle_slot();
            let _ = self.slot_senders[slot].send(SlotMessage::Stop);
        }

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn start_slot_thread(
    slot: usize,
    rx: Receiver<SlotMessage>,
    store: Arc<CompiledRuleStore>,
    config: Arc<RunConfig>,
    results: ResultSender,
    cancellation: CancellationToken,
    idle: IdleQueue,
    plugins: Arc<PluginRegistry>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut cache = WorkerRuleCache::new();

        // Workers ignore the interrupt signal themselves (§4.3 "Signal
        // discipline"); only the parent dispatcher reacts to it, by
        // stopping new dispatch and eventually calling `shutdown`, which
        // is what actually ends this loop.
        loop {
            let message = match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            };

            match message {
                SlotMessage::Stop => break,
                SlotMessage::Job(path) => {
                    if !cancellation.is_cancelled() {
                        let records: Vec<MatchRecord> =
                            scan_evidence(&path, &store, &config, &mut cache);
                        for record in records {
                            // Push to the ResultChannel first, then invoke
                            // callbacks (§4.3 step 4) — a callback that
                            // panics must never keep the record from
                            // reaching the output file (§8).
                            let sent = results.send_record(record.clone()).is_ok();
                            plugins.invoke_callbacks(&record);
                            if !sent {
                                break;
                            }
                        }
                    } else {
                        debug!(slot, "cancellation observed, skipping remaining job");
                    }

                    let (lock, cvar) = &*idle;
                    lock.lock().unwrap().push_back(slot);
                    cvar.notify_one();
                }
            }
        }
    })
}
