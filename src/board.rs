//! Minimal hex board model
//!
//! The coordination layer only needs enough of the board to size the queue
//! item codecs: `byte_length()` is the fixed per-session parameter every
//! codec is bound to at memory handoff. The full rules engine lives in the
//! application workers, outside this crate.

use crate::error::{HexmindError, Result};
use serde::{Deserialize, Serialize};

/// Largest supported board edge (columns are letters `a..=y`)
pub const MAX_BOARD_SIZE: u32 = 25;

/// Board/session configuration carried by `reset` and `memory` messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Opening moves in cell notation, e.g. `"a1g7b2"`. Empty for a fresh board.
    #[serde(default)]
    pub notation: String,
    /// Board edge length
    pub size: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            notation: String::new(),
            size: 13,
        }
    }
}

/// A hex board: two occupancy planes, one per player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: u32,
    /// Both planes, plane 0 first. Length is `byte_length()`.
    planes: Vec<u8>,
    /// Number of stones placed; parity gives the side to move
    stones: u32,
}

impl Board {
    /// Build a board from configuration, replaying any opening notation
    pub fn construct(config: &BoardConfig) -> Result<Self> {
        if config.size == 0 || config.size > MAX_BOARD_SIZE {
            return Err(HexmindError::Config(format!(
                "board size {} out of range 1..={MAX_BOARD_SIZE}",
                config.size
            )));
        }
        let plane_len = (config.size * config.size).div_ceil(8) as usize;
        let mut board = Self {
            size: config.size,
            planes: vec![0; plane_len * 2],
            stones: 0,
        };
        for cell in parse_notation(&config.notation)? {
            board.place(cell)?;
        }
        Ok(board)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Serialized length of one board position in bytes.
    ///
    /// Every queue item carrying a position embeds exactly this many bytes,
    /// so the value must be identical across all units of a session.
    pub fn byte_length(&self) -> usize {
        self.planes.len()
    }

    /// Raw plane bytes, `byte_length()` long
    pub fn as_bytes(&self) -> &[u8] {
        &self.planes
    }

    /// Cell notation of the central cell, e.g. `"g7"` for size 13
    pub fn center_notation(&self) -> String {
        let mid = self.size / 2;
        format_cell(mid, mid)
    }

    fn place(&mut self, (col, row): (u32, u32)) -> Result<()> {
        if col >= self.size || row >= self.size {
            return Err(HexmindError::Config(format!(
                "cell {} outside a size-{} board",
                format_cell(col, row),
                self.size
            )));
        }
        let bit = (row * self.size + col) as usize;
        let plane_len = self.planes.len() / 2;
        let plane = (self.stones % 2) as usize;
        self.planes[plane * plane_len + bit / 8] |= 1 << (bit % 8);
        self.stones += 1;
        Ok(())
    }
}

/// Parse concatenated cell tokens: a letter column followed by a 1-based row
fn parse_notation(notation: &str) -> Result<Vec<(u32, u32)>> {
    let mut cells = Vec::new();
    let mut chars = notation.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_ascii_lowercase() {
            return Err(HexmindError::Config(format!(
                "invalid column character '{c}' in notation"
            )));
        }
        let col = (c as u32) - ('a' as u32);
        let mut row_digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            row_digits.push(*d);
            chars.next();
        }
        let row: u32 = row_digits
            .parse()
            .map_err(|_| HexmindError::Config(format!("missing row after column '{c}'")))?;
        if row == 0 {
            return Err(HexmindError::Config("rows are 1-based".into()));
        }
        cells.push((col, row - 1));
    }
    Ok(cells)
}

fn format_cell(col: u32, row: u32) -> String {
    let letter = char::from(b'a' + col as u8);
    format!("{letter}{}", row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_length_size_13() {
        let board = Board::construct(&BoardConfig::default()).unwrap();
        // 169 cells -> 22 bytes per plane, two planes
        assert_eq!(board.byte_length(), 44);
        assert_eq!(board.size(), 13);
    }

    #[test]
    fn test_byte_length_scales_with_size() {
        let small = Board::construct(&BoardConfig {
            notation: String::new(),
            size: 5,
        })
        .unwrap();
        // 25 cells -> 4 bytes per plane
        assert_eq!(small.byte_length(), 8);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        for size in [0, MAX_BOARD_SIZE + 1] {
            let cfg = BoardConfig {
                notation: String::new(),
                size,
            };
            assert!(Board::construct(&cfg).is_err(), "size {size} should fail");
        }
    }

    #[test]
    fn test_notation_replay_alternates_planes() {
        let board = Board::construct(&BoardConfig {
            notation: "a1g7".into(),
            size: 13,
        })
        .unwrap();
        let plane_len = board.byte_length() / 2;
        // a1 -> bit 0 of plane 0
        assert_eq!(board.as_bytes()[0] & 1, 1);
        // g7 -> bit 6*13+6 = 84 of plane 1
        assert_eq!(board.as_bytes()[plane_len + 84 / 8] & (1 << (84 % 8)), 1 << (84 % 8));
    }

    #[test]
    fn test_bad_notation_rejected() {
        for notation in ["Z1", "a", "a0", "z9"] {
            let cfg = BoardConfig {
                notation: notation.into(),
                size: 13,
            };
            assert!(
                Board::construct(&cfg).is_err(),
                "notation {notation:?} should fail"
            );
        }
    }

    #[test]
    fn test_center_notation() {
        let board = Board::construct(&BoardConfig::default()).unwrap();
        assert_eq!(board.center_notation(), "g7");
    }
}
