//! Shared memory buffer distributed to every unit
//!
//! The bootstrapper allocates one fixed-size region and hands the same
//! reference to every unit (value-sharing, not a copy). Cells are atomic
//! bytes: the coordination layer defines no locking discipline — how units
//! partition and interpret offsets is a convention of the application
//! workers. No unit may resize the buffer.

use crate::error::{HexmindError, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A single fixed-size byte region shared by all units
#[derive(Clone)]
pub struct SharedMemory {
    cells: Arc<[AtomicU8]>,
}

impl SharedMemory {
    /// Allocate a zeroed buffer of `len` bytes
    pub fn new(len: usize) -> Self {
        let cells: Vec<AtomicU8> = (0..len).map(|_| AtomicU8::new(0)).collect();
        Self {
            cells: cells.into(),
        }
    }

    /// Buffer length in bytes; fixed for the lifetime of the topology
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether two handles refer to the same underlying region
    pub fn same_region(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    /// Read one byte
    pub fn read(&self, offset: usize) -> Result<u8> {
        self.cell(offset).map(|c| c.load(Ordering::Relaxed))
    }

    /// Write one byte
    pub fn write(&self, offset: usize, value: u8) -> Result<()> {
        self.cell(offset).map(|c| c.store(value, Ordering::Relaxed))
    }

    /// Copy `bytes` into the buffer starting at `offset`
    pub fn write_slice(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset.checked_add(bytes.len()).ok_or_else(|| {
            HexmindError::MemoryAccess {
                offset,
                message: "offset overflow".into(),
            }
        })?;
        if end > self.cells.len() {
            return Err(HexmindError::MemoryAccess {
                offset,
                message: format!("range of {} bytes exceeds buffer of {}", bytes.len(), self.len()),
            });
        }
        for (i, b) in bytes.iter().enumerate() {
            self.cells[offset + i].store(*b, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `len` bytes out of the buffer starting at `offset`
    pub fn read_slice(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(len).ok_or_else(|| HexmindError::MemoryAccess {
            offset,
            message: "offset overflow".into(),
        })?;
        if end > self.cells.len() {
            return Err(HexmindError::MemoryAccess {
                offset,
                message: format!("range of {len} bytes exceeds buffer of {}", self.len()),
            });
        }
        Ok((offset..end)
            .map(|i| self.cells[i].load(Ordering::Relaxed))
            .collect())
    }

    fn cell(&self, offset: usize) -> Result<&AtomicU8> {
        self.cells.get(offset).ok_or_else(|| HexmindError::MemoryAccess {
            offset,
            message: format!("out of range for buffer of {}", self.len()),
        })
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("len", &self.len())
            .finish()
    }
}
