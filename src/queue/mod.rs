//! Named logical queues fed by local calls or channel injection
//!
//! A [`Queue`] is the inbox application workers consume from. Producers on
//! the same thread call [`Queue::put`]; envelopes arriving over a channel are
//! routed by queue name through [`QueueSet::inject`], decoded with the
//! queue's codec, and appended in arrival order. The consumer never learns
//! which path an item took.
//!
//! Bulk injection decodes the whole batch before appending any of it, so a
//! batch is observably equivalent to injecting each item individually in the
//! same order — no reordering, and a decode failure never leaves a partial
//! batch behind.

pub mod codec;
pub mod items;

pub use codec::Codec;
pub use items::{
    ControlCodec, ControlItem, DistributorCodec, DistributorItem, EvalCodec, EvalItem,
    SelectorCodec, SelectorItem,
};

use crate::board::Board;
use crate::error::{HexmindError, Result};
use crate::protocol::{QueueName, Role};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// A codec-bound FIFO of decoded items
pub struct Queue<C: Codec> {
    codec: C,
    tx: Sender<C::Item>,
    rx: Receiver<C::Item>,
}

impl<C: Codec> Queue<C> {
    pub fn new(codec: C) -> Self {
        // Unbounded: the queue is the unit's inbox, and the shell must never
        // block on its own injection path while the consumer is mid-item.
        let (tx, rx) = unbounded();
        Self { codec, tx, rx }
    }

    pub fn name(&self) -> QueueName {
        self.codec.queue()
    }

    /// Append an already-decoded item (local producer path)
    pub fn put(&self, item: C::Item) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| HexmindError::Channel(format!("queue '{}' consumer gone", self.name())))
    }

    /// Decode one encoded item and append it
    pub fn inject(&self, bytes: &[u8]) -> Result<()> {
        let item = self.codec.decode(bytes)?;
        self.put(item)
    }

    /// Decode a batch and append all of it, preserving order.
    /// Nothing is appended if any element fails to decode.
    pub fn inject_bulk(&self, items: &[Vec<u8>]) -> Result<()> {
        let decoded: Vec<C::Item> = items
            .iter()
            .map(|bytes| self.codec.decode(bytes))
            .collect::<Result<_>>()?;
        for item in decoded {
            self.put(item)?;
        }
        Ok(())
    }

    /// Encode an item for sending over a channel (producer side)
    pub fn encode(&self, item: &C::Item) -> Vec<u8> {
        self.codec.encode(item)
    }

    /// A blocking consumer handle. The handle stays usable after the owning
    /// unit drops the queue; it then drains the backlog and reports
    /// disconnection.
    pub fn consumer(&self) -> QueueConsumer<C::Item> {
        QueueConsumer {
            name: self.name(),
            rx: self.rx.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Receiving half of a queue, held by the consumer loop
#[derive(Clone)]
pub struct QueueConsumer<T> {
    name: QueueName,
    rx: Receiver<T>,
}

impl<T> QueueConsumer<T> {
    pub fn name(&self) -> QueueName {
        self.name
    }

    /// Block for the next item; errors once all producers are gone
    pub fn recv(&self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| HexmindError::Channel(format!("queue '{}' closed", self.name)))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| HexmindError::Timeout(format!("no item on queue '{}'", self.name)))
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// The queues one unit owns, by role.
///
/// All codecs are bound from the same [`Board`], so every unit sharing a
/// queue name agrees on the board byte length.
#[derive(Clone, Default)]
pub struct QueueSet {
    pub selector: Option<Arc<Queue<SelectorCodec>>>,
    pub distributor: Option<Arc<Queue<DistributorCodec>>>,
    pub control: Option<Arc<Queue<ControlCodec>>>,
    pub eval: Option<Arc<Queue<EvalCodec>>>,
}

impl QueueSet {
    /// Construct the queues a role needs, codecs bound to `board`
    pub fn for_role(role: Role, board: &Board) -> Self {
        let board_len = board.byte_length();
        let mut set = QueueSet::default();
        match role {
            Role::Search => {
                set.selector = Some(Arc::new(Queue::new(SelectorCodec { board_len })));
                set.distributor = Some(Arc::new(Queue::new(DistributorCodec { board_len })));
                set.control = Some(Arc::new(Queue::new(ControlCodec)));
            }
            Role::Distributor => {
                set.selector = Some(Arc::new(Queue::new(SelectorCodec { board_len })));
                set.distributor = Some(Arc::new(Queue::new(DistributorCodec { board_len })));
                set.control = Some(Arc::new(Queue::new(ControlCodec)));
                set.eval = Some(Arc::new(Queue::new(EvalCodec { board_len })));
            }
            Role::Evaluator => {
                set.selector = Some(Arc::new(Queue::new(SelectorCodec { board_len })));
                set.eval = Some(Arc::new(Queue::new(EvalCodec { board_len })));
            }
        }
        set
    }

    /// Route one encoded item to the named queue
    pub fn inject(&self, name: QueueName, bytes: &[u8]) -> Result<()> {
        match name {
            QueueName::Selector => self.require(&self.selector, name)?.inject(bytes),
            QueueName::Distributor => self.require(&self.distributor, name)?.inject(bytes),
            QueueName::Control => self.require(&self.control, name)?.inject(bytes),
            QueueName::Eval => self.require(&self.eval, name)?.inject(bytes),
        }
    }

    /// Route an ordered batch to the named queue
    pub fn inject_bulk(&self, name: QueueName, items: &[Vec<u8>]) -> Result<()> {
        match name {
            QueueName::Selector => self.require(&self.selector, name)?.inject_bulk(items),
            QueueName::Distributor => self.require(&self.distributor, name)?.inject_bulk(items),
            QueueName::Control => self.require(&self.control, name)?.inject_bulk(items),
            QueueName::Eval => self.require(&self.eval, name)?.inject_bulk(items),
        }
    }

    /// Total buffered items across all owned queues
    pub fn backlog(&self) -> usize {
        self.selector.as_ref().map_or(0, |q| q.len())
            + self.distributor.as_ref().map_or(0, |q| q.len())
            + self.control.as_ref().map_or(0, |q| q.len())
            + self.eval.as_ref().map_or(0, |q| q.len())
    }

    fn require<'a, C: Codec>(
        &self,
        queue: &'a Option<Arc<Queue<C>>>,
        name: QueueName,
    ) -> Result<&'a Arc<Queue<C>>> {
        queue.as_ref().ok_or(HexmindError::QueueNotReady(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, BoardConfig};

    fn test_board() -> Board {
        Board::construct(&BoardConfig::default()).unwrap()
    }

    fn eval_item(board: &Board, run_id: u32, node: &str) -> EvalItem {
        EvalItem {
            run_id,
            node_name: node.into(),
            board: board.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_local_and_injected_items_interleave_in_order() {
        let board = test_board();
        let queue = Queue::new(EvalCodec {
            board_len: board.byte_length(),
        });

        queue.put(eval_item(&board, 1, "a")).unwrap();
        let encoded = queue.encode(&eval_item(&board, 1, "b"));
        queue.inject(&encoded).unwrap();
        queue.put(eval_item(&board, 1, "c")).unwrap();

        let consumer = queue.consumer();
        let names: Vec<String> = (0..3).map(|_| consumer.try_recv().unwrap().node_name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_bulk_matches_individual_injection() {
        let board = test_board();
        let queue = Queue::new(EvalCodec {
            board_len: board.byte_length(),
        });
        let batch: Vec<Vec<u8>> = ["a", "b", "c"]
            .iter()
            .map(|n| queue.encode(&eval_item(&board, 2, n)))
            .collect();

        queue.inject_bulk(&batch).unwrap();
        queue.inject(&queue.encode(&eval_item(&board, 2, "d"))).unwrap();

        let consumer = queue.consumer();
        let names: Vec<String> = (0..4).map(|_| consumer.try_recv().unwrap().node_name).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_bulk_decode_failure_appends_nothing() {
        let board = test_board();
        let queue = Queue::new(EvalCodec {
            board_len: board.byte_length(),
        });
        let good = queue.encode(&eval_item(&board, 1, "a"));
        let bad = vec![0u8; 3];

        assert!(queue.inject_bulk(&[good, bad]).is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_role_queue_sets() {
        let board = test_board();

        let search = QueueSet::for_role(Role::Search, &board);
        assert!(search.selector.is_some());
        assert!(search.eval.is_none());

        let eval = QueueSet::for_role(Role::Evaluator, &board);
        assert!(eval.eval.is_some());
        assert!(eval.control.is_none());

        let dist = QueueSet::for_role(Role::Distributor, &board);
        assert!(dist.eval.is_some() && dist.distributor.is_some());
    }

    #[test]
    fn test_inject_into_unowned_queue_is_rejected() {
        let board = test_board();
        let eval_set = QueueSet::for_role(Role::Evaluator, &board);
        let err = eval_set.inject(QueueName::Control, &[0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, HexmindError::QueueNotReady(QueueName::Control)));
    }

    #[test]
    fn test_empty_set_rejects_everything() {
        let set = QueueSet::default();
        for name in QueueName::ALL {
            assert!(matches!(
                set.inject(name, &[]).unwrap_err(),
                HexmindError::QueueNotReady(_)
            ));
        }
    }
}
