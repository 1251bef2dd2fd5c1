//! Two-phase barrier used by the parallel layer.
//!
//! The protocol: every worker reports one partial result, the coordinator
//! folds the partials into a global answer, and every worker receives a
//! reply before continuing. Structuring this as one primitive (instead of
//! ad hoc channel plumbing per call site) makes the no-worker-proceeds-
//! early guarantee obvious and lets the protocol be tested in isolation.
//!
//! The coordinator may abandon the exchange instead of replying; every
//! worker blocked in [`WorkerHandle::exchange`] then observes `None` and
//! unwinds its own way. Workers never see each other's channels, so a
//! worker cannot unblock (or deadlock) its peers.

use crossbeam_channel::{Receiver, Sender, bounded};

/// Coordinator half: collects one partial per worker, answers each worker.
pub(crate) struct Coordinator<P, G> {
    report_rx: Receiver<(usize, P)>,
    reply_txs: Vec<Sender<G>>,
}

/// Worker half: one per worker, consumed by the exchange.
pub(crate) struct WorkerHandle<P, G> {
    id: usize,
    report_tx: Sender<(usize, P)>,
    reply_rx: Receiver<G>,
}

/// Create the coordination channels for `workers` participants.
pub(crate) fn rendezvous<P, G>(workers: usize) -> (Coordinator<P, G>, Vec<WorkerHandle<P, G>>) {
    let (report_tx, report_rx) = bounded(workers);
    let mut reply_txs = Vec::with_capacity(workers);
    let handles = (0..workers)
        .map(|id| {
            let (reply_tx, reply_rx) = bounded(1);
            reply_txs.push(reply_tx);
            WorkerHandle {
                id,
                report_tx: report_tx.clone(),
                reply_rx,
            }
        })
        .collect();
    (
        Coordinator {
            report_rx,
            reply_txs,
        },
        handles,
    )
}

impl<P, G> WorkerHandle<P, G> {
    /// Report this worker's partial and block until the coordinator
    /// answers. `None` means the coordinator abandoned the protocol and no
    /// global answer will come.
    pub(crate) fn exchange(self, partial: P) -> Option<G> {
        if self.report_tx.send((self.id, partial)).is_err() {
            return None;
        }
        self.reply_rx.recv().ok()
    }
}

impl<P, G> Coordinator<P, G> {
    /// Block until every worker has reported (or its handle was dropped).
    /// Partials arrive tagged with worker ids; arrival order is
    /// scheduling-dependent.
    pub(crate) fn collect(&self) -> Vec<(usize, P)> {
        let expected = self.reply_txs.len();
        let mut partials = Vec::with_capacity(expected);
        for _ in 0..expected {
            match self.report_rx.recv() {
                Ok(report) => partials.push(report),
                Err(_) => break,
            }
        }
        partials
    }

    /// Send each worker its personal reply.
    pub(crate) fn reply_each(self, mut replies: Vec<(usize, G)>) {
        for (id, reply) in replies.drain(..) {
            if let Some(tx) = self.reply_txs.get(id) {
                let _ = tx.send(reply);
            }
        }
    }

    /// Send every worker the same reply.
    pub(crate) fn broadcast(self, reply: G)
    where
        G: Clone,
    {
        for tx in &self.reply_txs {
            let _ = tx.send(reply.clone());
        }
    }

    /// Abandon the exchange: drop the reply channels so every waiting
    /// worker unblocks with `None`.
    pub(crate) fn abandon(self) {
        drop(self);
    }
}
