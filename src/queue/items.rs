//! Concrete item types for the four logical queues
//!
//! Each item that carries a position embeds the full board planes, so the
//! codecs are parameterized on the session's board byte length. The item
//! shapes follow the original pipeline: evaluators report scored candidates
//! (selector items), the search unit emits expansion requests (distributor
//! items), the distributor fans positions out (eval items), and control
//! items interrupt a running search.

use super::codec::{Codec, FieldReader, FieldWriter};
use crate::error::Result;
use crate::protocol::QueueName;

/// A scored candidate reported back to the search unit
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorItem {
    /// Search run this item belongs to; stale runs are discarded by the consumer
    pub run_id: u32,
    /// Worker number of the evaluator that produced the score
    pub worker_num: u32,
    /// Tree path of the scored node, e.g. `"g7.h8"`
    pub node_name: String,
    pub score: f64,
    /// Board planes, `board_byte_length` bytes
    pub board: Vec<u8>,
}

/// An expansion request from the search unit to the distributor
#[derive(Debug, Clone, PartialEq)]
pub struct DistributorItem {
    pub run_id: u32,
    pub node_name: String,
    /// Depth at which only forcing moves are expanded; -1 disables the cutoff
    pub forcing_level: i8,
    pub board: Vec<u8>,
}

/// A position the distributor hands to one evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct EvalItem {
    pub run_id: u32,
    pub node_name: String,
    pub board: Vec<u8>,
}

/// A control command, e.g. `"stop"`
#[derive(Debug, Clone, PartialEq)]
pub struct ControlItem {
    pub run_id: u32,
    pub command: String,
}

/// Codec for [`SelectorItem`], bound to the session board length
#[derive(Debug, Clone, Copy)]
pub struct SelectorCodec {
    pub board_len: usize,
}

impl Codec for SelectorCodec {
    type Item = SelectorItem;

    fn queue(&self) -> QueueName {
        QueueName::Selector
    }

    fn encode(&self, item: &SelectorItem) -> Vec<u8> {
        FieldWriter::new()
            .u32(item.run_id)
            .u32(item.worker_num)
            .string(&item.node_name)
            .f64(item.score)
            .bytes(&item.board)
            .finish()
    }

    fn decode(&self, bytes: &[u8]) -> Result<SelectorItem> {
        let mut r = FieldReader::new(self.queue(), bytes);
        let item = SelectorItem {
            run_id: r.u32()?,
            worker_num: r.u32()?,
            node_name: r.string()?,
            score: r.f64()?,
            board: r.board(self.board_len)?,
        };
        r.done()?;
        Ok(item)
    }
}

/// Codec for [`DistributorItem`]
#[derive(Debug, Clone, Copy)]
pub struct DistributorCodec {
    pub board_len: usize,
}

impl Codec for DistributorCodec {
    type Item = DistributorItem;

    fn queue(&self) -> QueueName {
        QueueName::Distributor
    }

    fn encode(&self, item: &DistributorItem) -> Vec<u8> {
        FieldWriter::new()
            .u32(item.run_id)
            .string(&item.node_name)
            .i8(item.forcing_level)
            .bytes(&item.board)
            .finish()
    }

    fn decode(&self, bytes: &[u8]) -> Result<DistributorItem> {
        let mut r = FieldReader::new(self.queue(), bytes);
        let item = DistributorItem {
            run_id: r.u32()?,
            node_name: r.string()?,
            forcing_level: r.i8()?,
            board: r.board(self.board_len)?,
        };
        r.done()?;
        Ok(item)
    }
}

/// Codec for [`EvalItem`]
#[derive(Debug, Clone, Copy)]
pub struct EvalCodec {
    pub board_len: usize,
}

impl Codec for EvalCodec {
    type Item = EvalItem;

    fn queue(&self) -> QueueName {
        QueueName::Eval
    }

    fn encode(&self, item: &EvalItem) -> Vec<u8> {
        FieldWriter::new()
            .u32(item.run_id)
            .string(&item.node_name)
            .bytes(&item.board)
            .finish()
    }

    fn decode(&self, bytes: &[u8]) -> Result<EvalItem> {
        let mut r = FieldReader::new(self.queue(), bytes);
        let item = EvalItem {
            run_id: r.u32()?,
            node_name: r.string()?,
            board: r.board(self.board_len)?,
        };
        r.done()?;
        Ok(item)
    }
}

/// Codec for [`ControlItem`]. Control items carry no position, so the codec
/// has no board parameter.
#[derive(Debug, Clone, Copy)]
pub struct ControlCodec;

impl Codec for ControlCodec {
    type Item = ControlItem;

    fn queue(&self) -> QueueName {
        QueueName::Control
    }

    fn encode(&self, item: &ControlItem) -> Vec<u8> {
        FieldWriter::new()
            .u32(item.run_id)
            .string(&item.command)
            .finish()
    }

    fn decode(&self, bytes: &[u8]) -> Result<ControlItem> {
        let mut r = FieldReader::new(self.queue(), bytes);
        let item = ControlItem {
            run_id: r.u32()?,
            command: r.string()?,
        };
        r.done()?;
        Ok(item)
    }
}
