//! Bidirectional message channels between units
//!
//! A channel is a pair of [`Endpoint`]s; an envelope sent on one endpoint is
//! delivered, in send order, to the other endpoint only. Endpoints are plain
//! owned values: transferring one to a unit is a move, so "each endpoint has
//! exactly one owner" is enforced by the type system rather than checked at
//! runtime.
//!
//! A unit's shell attaches every received endpoint's receiving half to its
//! select loop and keeps the sending half as an [`Outlet`] it can hand to the
//! application worker.

use crate::error::{HexmindError, Result};
use crate::protocol::Envelope;
use crossbeam_channel::{bounded, Receiver, Sender};

/// One side of a bidirectional channel
pub struct Endpoint {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Endpoint {
    /// Send an envelope to the peer endpoint
    pub fn send(&self, env: Envelope) -> Result<()> {
        self.tx
            .send(env)
            .map_err(|e| HexmindError::Channel(format!("peer endpoint closed: {e}")))
    }

    /// Receive the next envelope from the peer, blocking
    pub fn recv(&self) -> Result<Envelope> {
        self.rx
            .recv()
            .map_err(|_| HexmindError::Channel("peer endpoint closed".into()))
    }

    /// Receive without blocking, `None` when empty
    pub fn try_recv(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Receive with a deadline
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Envelope> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| HexmindError::Timeout("no envelope from peer".into()))
    }

    /// Split into a send-only outlet and the raw receiver.
    ///
    /// The shell feeds the receiver into its multiplexer and keeps the outlet
    /// for the worker.
    pub fn split(self) -> (Outlet, Receiver<Envelope>) {
        (Outlet { tx: self.tx }, self.rx)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("pending", &self.rx.len())
            .finish()
    }
}

/// Send-only handle onto a channel endpoint
#[derive(Clone)]
pub struct Outlet {
    tx: Sender<Envelope>,
}

impl Outlet {
    pub fn send(&self, env: Envelope) -> Result<()> {
        self.tx
            .send(env)
            .map_err(|e| HexmindError::Channel(format!("peer endpoint closed: {e}")))
    }
}

impl std::fmt::Debug for Outlet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outlet").finish()
    }
}

/// Create one channel: two endpoints cross-wired with bounded buffers
pub fn pair(capacity: usize) -> (Endpoint, Endpoint) {
    let (a_tx, b_rx) = bounded(capacity);
    let (b_tx, a_rx) = bounded(capacity);
    (
        Endpoint { tx: a_tx, rx: a_rx },
        Endpoint { tx: b_tx, rx: b_rx },
    )
}
