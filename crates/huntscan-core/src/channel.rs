use std::sync::mpsc::{self, Receiver, SendError, SyncSender};

use crate::types::MatchRecord;

/// Either a hit produced by a worker, or the distinguished terminal value
/// (§3 `done_sentinel`). Ordering from a single producer is preserved;
/// ordering across producers is undefined (§4.4).
#[derive(Debug)]
pub enum ResultMessage {
    Record(MatchRecord),
    Done,
}

/// Multi-producer, single-consumer bounded handoff from workers to the
/// reader (§4.4). Backpressure is the bound on the underlying channel: if
/// workers outpace the reader they block on send (§5).
#[derive(Clone)]
pub struct ResultSender {
    inner: SyncSender<ResultMessage>,
}

impl ResultSender {
    pub fn send_record(&self, record: MatchRecord) -> Result<(), SendError<ResultMessage>> {
        self.inner.send(ResultMessage::Record(record))
    }

    /// The Dispatcher enqueues exactly one of these after every per-evidence
    /// job has been submitted and drained (§4.4).
    pub fn send_done(&self) -> Result<(), SendError<ResultMessage>> {
        self.inner.send(ResultMessage::Done)
    }
}

pub struct ResultReceiver {
    inner: Receiver<ResultMessage>,
}

impl ResultReceiver {
    pub fn recv(&self) -> Option<ResultMessage> {
        self.inner.recv().ok()
    }
}

/// `capacity` bounds how many in-flight records can queue before a worker's
/// send blocks (§5 backpressure).
pub fn result_channel(capacity: usize) -> (ResultSender, ResultReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (ResultSender { inner: tx }, ResultReceiver { inner: rx })
}
