//! Item codecs for the injection protocol
//!
//! Items cross channels as flat byte buffers. Each queue binds one codec at
//! construction time; codecs that carry a board position embed exactly
//! `board_byte_length` trailing bytes, fixed once per session from the active
//! board configuration. Encoding is little-endian with length-prefixed
//! strings — compact and layout-stable, which JSON would not give us for the
//! board planes.

use crate::error::{HexmindError, Result};
use crate::protocol::QueueName;

/// Encode/decode one queue's item type
pub trait Codec: Send + Sync + 'static {
    type Item: Send + 'static;

    fn queue(&self) -> QueueName;
    fn encode(&self, item: &Self::Item) -> Vec<u8>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Item>;
}

/// Sequential writer for codec implementations
#[derive(Default)]
pub(crate) struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.push(v as u8);
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Length-prefixed UTF-8 string (u16 prefix)
    pub fn string(&mut self, s: &str) -> &mut Self {
        let len = s.len().min(u16::MAX as usize) as u16;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(&s.as_bytes()[..len as usize]);
        self
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Sequential reader mirroring [`FieldWriter`]
pub(crate) struct FieldReader<'a> {
    queue: QueueName,
    rest: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(queue: QueueName, bytes: &'a [u8]) -> Self {
        Self { queue, rest: bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(HexmindError::codec(
                self.queue,
                format!("buffer short: need {n} more bytes, have {}", self.rest.len()),
            ));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn string(&mut self) -> Result<String> {
        let len = u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| HexmindError::codec(self.queue, "string field is not UTF-8"))
    }

    /// The remaining bytes must be exactly the bound board length
    pub fn board(&mut self, board_len: usize) -> Result<Vec<u8>> {
        if self.rest.len() != board_len {
            return Err(HexmindError::codec(
                self.queue,
                format!(
                    "board tail is {} bytes, codec bound to {board_len}",
                    self.rest.len()
                ),
            ));
        }
        Ok(self.take(board_len)?.to_vec())
    }

    /// Assert the buffer is fully consumed
    pub fn done(&self) -> Result<()> {
        if !self.rest.is_empty() {
            return Err(HexmindError::codec(
                self.queue,
                format!("{} trailing bytes after item", self.rest.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_round_trip() {
        let bytes = FieldWriter::new()
            .u32(7)
            .i8(-2)
            .f64(0.5)
            .string("g7")
            .bytes(&[1, 2, 3])
            .finish();

        let mut r = FieldReader::new(QueueName::Selector, &bytes);
        assert_eq!(r.u32().unwrap(), 7);
        assert_eq!(r.i8().unwrap(), -2);
        assert_eq!(r.f64().unwrap(), 0.5);
        assert_eq!(r.string().unwrap(), "g7");
        assert_eq!(r.board(3).unwrap(), vec![1, 2, 3]);
        r.done().unwrap();
    }

    #[test]
    fn test_short_buffer_errors() {
        let mut r = FieldReader::new(QueueName::Eval, &[1, 2]);
        assert!(r.u32().is_err());
    }

    #[test]
    fn test_board_length_mismatch_errors() {
        let mut r = FieldReader::new(QueueName::Eval, &[0; 10]);
        let err = r.board(4).unwrap_err();
        assert!(err.to_string().contains("bound to 4"));
    }
}
