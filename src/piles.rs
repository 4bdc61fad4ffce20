use serde::{Deserialize, Serialize};

use crate::error::PileError;

pub const ROW_COUNT: usize = 5;
/// Maximum number of matches a player may take in one turn.
pub const MAX_TAKE: u8 = 3;
pub const INITIAL_PILES: [u8; ROW_COUNT] = [1, 2, 3, 4, 5];

/// The five match rows, row 0 holding at most 1 match and row 4 at most 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; ROW_COUNT]", into = "[u8; ROW_COUNT]")]
pub struct Piles {
    rows: [u8; ROW_COUNT],
}

impl Piles {
    /// Creates the starting layout `[1, 2, 3, 4, 5]`.
    pub fn new() -> Self {
        Self {
            rows: INITIAL_PILES,
        }
    }

    /// Builds a pile set, rejecting rows above their starting count.
    pub fn from_counts(rows: [u8; ROW_COUNT]) -> Result<Self, PileError> {
        for (row, (&count, &max)) in rows.iter().zip(INITIAL_PILES.iter()).enumerate() {
            if count > max {
                return Err(PileError::RowTooLarge { row, max });
            }
        }
        Ok(Self { rows })
    }

    /// Parses the digit form used on the wire, e.g. `"10323"`.
    pub fn from_digits(digits: &str) -> Result<Self, PileError> {
        let len = digits.chars().count();
        if len != ROW_COUNT {
            return Err(PileError::Length(len));
        }

        let mut rows = [0u8; ROW_COUNT];
        for (slot, ch) in rows.iter_mut().zip(digits.chars()) {
            *slot = match ch.to_digit(10) {
                Some(d) if d <= 5 => d as u8,
                _ => return Err(PileError::NotADigit(ch)),
            };
        }
        Self::from_counts(rows)
    }

    /// Returns the digit form, e.g. `[1, 0, 3, 2, 3]` becomes `"10323"`.
    pub fn to_digits(&self) -> String {
        self.rows.iter().map(|count| char::from(b'0' + count)).collect()
    }

    pub fn get(&self, row: usize) -> u8 {
        self.rows[row]
    }

    /// Overwrites one row.
    ///
    /// Panics when `count` exceeds the row's starting count.
    pub fn set(&mut self, row: usize, count: u8) {
        assert!(
            count <= INITIAL_PILES[row],
            "row {row} cannot hold {count} matches"
        );
        self.rows[row] = count;
    }

    /// Removes `count` matches from `row`.
    ///
    /// Panics when the row holds fewer than `count` matches; callers guard
    /// every take against the current count.
    pub fn take(&mut self, row: usize, count: u8) {
        let current = self.rows[row];
        assert!(
            count <= current,
            "cannot take {count} matches from row {row} holding {current}"
        );
        self.rows[row] = current - count;
    }

    pub fn total(&self) -> u8 {
        self.rows.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Indices of rows that still hold matches, in ascending order.
    pub fn non_empty_rows(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(row, _)| row)
    }

    pub fn counts(&self) -> [u8; ROW_COUNT] {
        self.rows
    }
}

impl Default for Piles {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<[u8; ROW_COUNT]> for Piles {
    type Error = PileError;

    fn try_from(rows: [u8; ROW_COUNT]) -> Result<Self, Self::Error> {
        Self::from_counts(rows)
    }
}

impl From<Piles> for [u8; ROW_COUNT] {
    fn from(piles: Piles) -> Self {
        piles.rows
    }
}
