//! Typed message protocol between the bootstrapper and the units
//!
//! Every logical event that crosses a channel is one [`Envelope`]. The set of
//! variants is closed: dispatch is exhaustive `match`, so extending the
//! protocol is a compile-time-visible change rather than a new string tag.
//!
//! The wire table:
//!
//! | variant | payload | direction |
//! |---|---|---|
//! | [`Envelope::Port`] | peer role + endpoint | bootstrapper → unit |
//! | [`Envelope::Memory`] | shared buffer + board config | bootstrapper → unit |
//! | [`Envelope::Item`] | queue name + encoded item | any → unit |
//! | [`Envelope::ItemBulk`] | queue name + ordered encoded items | any → unit |
//! | [`Envelope::Reset`] | board config | bootstrapper → search unit |
//! | [`Envelope::Search`] | — | bootstrapper → search unit |
//! | [`Envelope::Move`] | search result | search unit → bootstrapper |
//! | [`Envelope::Ready`] | — | evaluator unit → bootstrapper |
//! | [`Envelope::SetupFailed`] | reason | unit → bootstrapper |
//! | [`Envelope::Shutdown`] | — | bootstrapper → unit |
//! | [`Envelope::Unsupported`] | original tag | any (logged and dropped) |

use crate::board::BoardConfig;
use crate::channel::Endpoint;
use crate::memory::SharedMemory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed role a unit runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Drives the game-tree search and answers `reset`/`search` commands
    Search,
    /// Fans work out from the distributor queue to the evaluators
    Distributor,
    /// Scores positions from the eval queue
    Evaluator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Search => write!(f, "search"),
            Role::Distributor => write!(f, "distributor"),
            Role::Evaluator => write!(f, "evaluator"),
        }
    }
}

/// Identifies the unit on the far side of a channel endpoint.
///
/// Endpoints are stored keyed by peer, so a unit routes outbound traffic by
/// role rather than by positional port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    Search,
    Distributor,
    /// Evaluator with its 1-based worker number
    Evaluator(u32),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Search => write!(f, "search"),
            Peer::Distributor => write!(f, "distributor"),
            Peer::Evaluator(n) => write!(f, "evaluator-{n}"),
        }
    }
}

/// Names of the logical queues shared by convention between units.
///
/// The name is the routing key of the injection protocol: an
/// [`Envelope::Item`] carrying `QueueName::Eval` appends to the receiving
/// unit's eval queue, wherever the item originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    /// Candidate nodes selected for expansion (evaluators → search)
    Selector,
    /// Nodes awaiting fan-out (search → distributor)
    Distributor,
    /// Control commands (stop, run id changes)
    Control,
    /// Positions awaiting evaluation (distributor → evaluators)
    Eval,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::Selector,
        QueueName::Distributor,
        QueueName::Control,
        QueueName::Eval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Selector => "selector",
            QueueName::Distributor => "distributor",
            QueueName::Control => "control",
            QueueName::Eval => "eval",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A move returned by the search unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Cell notation, e.g. `"g7"`
    pub notation: String,
    /// Score from the searching side's perspective
    pub score: f64,
}

impl Move {
    pub fn new(notation: impl Into<String>, score: f64) -> Self {
        Self {
            notation: notation.into(),
            score,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+.3})", self.notation, self.score)
    }
}

/// One message crossing a channel endpoint
#[derive(Debug)]
pub enum Envelope {
    /// Assign a channel endpoint connected to `peer`
    Port { peer: Peer, endpoint: Endpoint },
    /// Hand off the shared memory buffer and board/session configuration.
    /// `worker_num` is set for evaluator units only.
    Memory {
        memory: SharedMemory,
        board: BoardConfig,
        worker_num: Option<u32>,
    },
    /// Inject a single encoded item into the named queue
    Item { queue: QueueName, item: Vec<u8> },
    /// Inject a batch of encoded items, preserving order
    ItemBulk {
        queue: QueueName,
        items: Vec<Vec<u8>>,
    },
    /// Re-initialize the search unit's board
    Reset { board: BoardConfig },
    /// Start a search; the unit answers with `Move`
    Search,
    /// Result of a search
    Move { mv: Move },
    /// An evaluator unit finished its bootstrap
    Ready,
    /// Environment loading or module activation failed; the unit is gone
    SetupFailed { role: Role, reason: String },
    /// Tear the unit down
    Shutdown,
    /// A message nobody recognizes. Logged and dropped, never fatal.
    Unsupported { tag: String },
}

impl Envelope {
    /// Short tag for logging, mirroring the source protocol's `type` strings
    pub fn tag(&self) -> &str {
        match self {
            Envelope::Port { .. } => "port",
            Envelope::Memory { .. } => "memory",
            Envelope::Item { .. } => "item",
            Envelope::ItemBulk { .. } => "item_bulk",
            Envelope::Reset { .. } => "reset",
            Envelope::Search => "search",
            Envelope::Move { .. } => "move",
            Envelope::Ready => "ready",
            Envelope::SetupFailed { .. } => "setup_failed",
            Envelope::Shutdown => "shutdown",
            Envelope::Unsupported { .. } => "unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_are_stable() {
        assert_eq!(QueueName::Selector.to_string(), "selector");
        assert_eq!(QueueName::Eval.to_string(), "eval");
        assert_eq!(QueueName::ALL.len(), 4);
    }

    #[test]
    fn test_envelope_tags() {
        assert_eq!(Envelope::Search.tag(), "search");
        assert_eq!(Envelope::Ready.tag(), "ready");
        let env = Envelope::Unsupported {
            tag: "telemetry".into(),
        };
        assert_eq!(env.tag(), "unsupported");
    }

    #[test]
    fn test_move_display() {
        let mv = Move::new("g7", 0.25);
        assert_eq!(mv.to_string(), "g7 (+0.250)");
    }

    #[test]
    fn test_peer_display_includes_index() {
        assert_eq!(Peer::Evaluator(3).to_string(), "evaluator-3");
    }
}
