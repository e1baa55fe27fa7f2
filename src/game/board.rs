//! The 4x4 board and its four parallel state layers.
//!
//! Each cell carries occupancy, a frost timer, a rock timer and a shield
//! flag, stored as flat row-major arrays. A cell holds a piece XOR a
//! positive frost/rock timer; a shield only means anything on an occupied
//! cell. Coordinates are trusted here: the protocol layer validates ranges
//! before anything reaches the board.

use serde::{Deserialize, Serialize};

use super::{BOARD_CELLS, BOARD_N};

/// Contents of one occupancy cell. Host pieces count +1, client pieces -1,
/// which is what makes the line-sum win scan work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    Empty,
    Host,
    Client,
}

impl Occupant {
    pub fn sign(self) -> i8 {
        match self {
            Occupant::Empty => 0,
            Occupant::Host => 1,
            Occupant::Client => -1,
        }
    }

    pub fn from_sign(sign: i8) -> Self {
        match sign {
            1 => Occupant::Host,
            -1 => Occupant::Client,
            _ => Occupant::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    occupancy: [i8; BOARD_CELLS],
    frost: [u8; BOARD_CELLS],
    rock: [u8; BOARD_CELLS],
    shield: [bool; BOARD_CELLS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            occupancy: [0; BOARD_CELLS],
            frost: [0; BOARD_CELLS],
            rock: [0; BOARD_CELLS],
            shield: [false; BOARD_CELLS],
        }
    }

    #[inline]
    fn index(row: usize, col: usize) -> usize {
        row * BOARD_N + col
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Occupant {
        Occupant::from_sign(self.occupancy[Self::index(row, col)])
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Occupant) {
        let idx = Self::index(row, col);
        self.occupancy[idx] = value.sign();
        if value == Occupant::Empty {
            self.shield[idx] = false;
        }
    }

    /// A cell is empty when nothing occupies it and no timer sits on it.
    pub fn is_cell_empty(&self, row: usize, col: usize) -> bool {
        let idx = Self::index(row, col);
        self.occupancy[idx] == 0 && self.frost[idx] == 0 && self.rock[idx] == 0
    }

    pub fn frost_at(&self, row: usize, col: usize) -> u8 {
        self.frost[Self::index(row, col)]
    }

    pub fn rock_at(&self, row: usize, col: usize) -> u8 {
        self.rock[Self::index(row, col)]
    }

    /// Stamp a frost timer on a cell. Caller must ensure the cell is empty.
    pub fn set_frost(&mut self, row: usize, col: usize, turns: u8) {
        self.frost[Self::index(row, col)] = turns;
    }

    /// Stamp a rock timer on a cell. Caller must ensure the cell is empty.
    pub fn set_rock(&mut self, row: usize, col: usize, turns: u8) {
        self.rock[Self::index(row, col)] = turns;
    }

    /// Clear any frost/rock timer on a cell.
    pub fn thaw_cell(&mut self, row: usize, col: usize) {
        let idx = Self::index(row, col);
        self.frost[idx] = 0;
        self.rock[idx] = 0;
    }

    pub fn has_shield(&self, row: usize, col: usize) -> bool {
        self.shield[Self::index(row, col)]
    }

    pub fn set_shield(&mut self, row: usize, col: usize, shielded: bool) {
        self.shield[Self::index(row, col)] = shielded;
    }

    /// Decrement every positive frost/rock timer by exactly one.
    /// Called once per end-turn.
    pub fn reduce_state(&mut self) {
        for t in self.frost.iter_mut() {
            *t = t.saturating_sub(1);
        }
        for t in self.rock.iter_mut() {
            *t = t.saturating_sub(1);
        }
    }

    /// Number of cells with no piece and no timer.
    pub fn free_squares(&self) -> usize {
        (0..BOARD_N)
            .flat_map(|r| (0..BOARD_N).map(move |c| (r, c)))
            .filter(|&(r, c)| self.is_cell_empty(r, c))
            .count()
    }

    /// Number of pieces owned by `side` (pass `Occupant::Empty` for all pieces).
    pub fn piece_count(&self, side: Occupant) -> usize {
        match side {
            Occupant::Empty => self.occupancy.iter().filter(|&&v| v != 0).count(),
            _ => {
                let sign = side.sign();
                self.occupancy.iter().filter(|&&v| v == sign).count()
            }
        }
    }

    /// Number of shielded cells owned by `side` (`Occupant::Empty` for all).
    pub fn shield_count(&self, side: Occupant) -> usize {
        let sign = side.sign();
        self.shield
            .iter()
            .zip(self.occupancy.iter())
            .filter(|&(&s, &o)| s && (sign == 0 || o == sign))
            .count()
    }

    /// Number of cells carrying a positive frost or rock timer.
    pub fn timer_count(&self) -> usize {
        self.frost
            .iter()
            .zip(self.rock.iter())
            .filter(|&(&f, &r)| f > 0 || r > 0)
            .count()
    }

    /// Any cell matching `pred` on (occupant, shielded)?
    pub fn any_cell(&self, mut pred: impl FnMut(Occupant, bool) -> bool) -> bool {
        self.occupancy
            .iter()
            .zip(self.shield.iter())
            .any(|(&o, &s)| pred(Occupant::from_sign(o), s))
    }

    fn line_sum(&self, cells: impl Iterator<Item = (usize, usize)>) -> i8 {
        cells
            .map(|(r, c)| self.occupancy[Self::index(r, c)])
            .sum()
    }

    /// Scan rows, then columns, then the two diagonals for a line fully
    /// owned by one player. The first satisfied line wins the scan; a
    /// simultaneous multi-line win is not distinguished.
    pub fn check_win(&self) -> Option<Occupant> {
        let n = BOARD_N as i8;
        for row in 0..BOARD_N {
            let sum = self.line_sum((0..BOARD_N).map(|c| (row, c)));
            if sum.abs() == n {
                return Some(Occupant::from_sign(sum.signum()));
            }
        }
        for col in 0..BOARD_N {
            let sum = self.line_sum((0..BOARD_N).map(|r| (r, col)));
            if sum.abs() == n {
                return Some(Occupant::from_sign(sum.signum()));
            }
        }
        let main = self.line_sum((0..BOARD_N).map(|i| (i, i)));
        if main.abs() == n {
            return Some(Occupant::from_sign(main.signum()));
        }
        let anti = self.line_sum((0..BOARD_N).map(|i| (i, BOARD_N - 1 - i)));
        if anti.abs() == n {
            return Some(Occupant::from_sign(anti.signum()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    #[test]
    fn fresh_board_is_empty() {
        let board = Board::new();
        assert_eq!(board.free_squares(), BOARD_CELLS);
        assert_eq!(board.check_win(), None);
    }

    #[test]
    fn full_row_wins_for_host() {
        let mut board = Board::new();
        for c in 0..BOARD_N {
            board.set_cell(0, c, Occupant::Host);
        }
        assert_eq!(board.check_win(), Some(Occupant::Host));
    }

    #[test]
    fn full_column_wins_for_client() {
        let mut board = Board::new();
        for r in 0..BOARD_N {
            board.set_cell(r, 2, Occupant::Client);
        }
        assert_eq!(board.check_win(), Some(Occupant::Client));
    }

    #[test]
    fn anti_diagonal_wins() {
        let mut board = Board::new();
        for i in 0..BOARD_N {
            board.set_cell(i, BOARD_N - 1 - i, Occupant::Host);
        }
        assert_eq!(board.check_win(), Some(Occupant::Host));
    }

    #[test]
    fn mixed_line_does_not_win() {
        let mut board = Board::new();
        board.set_cell(0, 0, Occupant::Host);
        board.set_cell(0, 1, Occupant::Host);
        board.set_cell(0, 2, Occupant::Client);
        board.set_cell(0, 3, Occupant::Host);
        assert_eq!(board.check_win(), None);
    }

    #[test]
    fn main_diagonal_wins() {
        let mut board = Board::new();
        for i in 0..BOARD_N {
            board.set_cell(i, i, Occupant::Client);
        }
        assert_eq!(board.check_win(), Some(Occupant::Client));
    }

    #[test]
    fn reduce_state_decrements_and_floors_at_zero() {
        let mut board = Board::new();
        board.set_frost(0, 0, 2);
        board.set_rock(1, 1, 1);
        board.reduce_state();
        assert_eq!(board.frost_at(0, 0), 1);
        assert_eq!(board.rock_at(1, 1), 0);
        board.reduce_state();
        board.reduce_state();
        assert_eq!(board.frost_at(0, 0), 0);
        assert_eq!(board.rock_at(1, 1), 0);
    }

    #[test]
    fn clearing_a_cell_drops_its_shield() {
        let mut board = Board::new();
        board.set_cell(2, 2, Occupant::Host);
        board.set_shield(2, 2, true);
        board.set_cell(2, 2, Occupant::Empty);
        assert!(!board.has_shield(2, 2));
    }

    #[test]
    fn frozen_cell_is_not_empty() {
        let mut board = Board::new();
        board.set_frost(3, 3, 2);
        assert!(!board.is_cell_empty(3, 3));
        assert_eq!(board.free_squares(), BOARD_CELLS - 1);
    }

    quickcheck! {
        /// check_win returns Some iff some row, column or diagonal is
        /// fully owned by one player.
        fn win_iff_full_line(cells: Vec<i8>) -> bool {
            let mut board = Board::new();
            for (idx, v) in cells.iter().take(BOARD_CELLS).enumerate() {
                let occ = match v.rem_euclid(3) {
                    1 => Occupant::Host,
                    2 => Occupant::Client,
                    _ => Occupant::Empty,
                };
                board.set_cell(idx / BOARD_N, idx % BOARD_N, occ);
            }
            let mut lines: Vec<Vec<(usize, usize)>> = Vec::new();
            for r in 0..BOARD_N {
                lines.push((0..BOARD_N).map(|c| (r, c)).collect());
            }
            for c in 0..BOARD_N {
                lines.push((0..BOARD_N).map(|r| (r, c)).collect());
            }
            lines.push((0..BOARD_N).map(|i| (i, i)).collect());
            lines.push((0..BOARD_N).map(|i| (i, BOARD_N - 1 - i)).collect());

            let full_line_exists = lines.iter().any(|line| {
                let first = board.get_cell(line[0].0, line[0].1);
                first != Occupant::Empty
                    && line.iter().all(|&(r, c)| board.get_cell(r, c) == first)
            });
            board.check_win().is_some() == full_line_exists
        }

        /// reduce_state never underflows and decrements every positive
        /// timer by exactly one.
        fn reduce_state_exact_decrement(timers: Vec<u8>) -> bool {
            let mut board = Board::new();
            for (idx, &t) in timers.iter().take(BOARD_CELLS).enumerate() {
                board.set_frost(idx / BOARD_N, idx % BOARD_N, t % 5);
            }
            let before: Vec<u8> = (0..BOARD_CELLS)
                .map(|i| board.frost_at(i / BOARD_N, i % BOARD_N))
                .collect();
            board.reduce_state();
            (0..BOARD_CELLS).all(|i| {
                let after = board.frost_at(i / BOARD_N, i % BOARD_N);
                if before[i] == 0 { after == 0 } else { after == before[i] - 1 }
            })
        }
    }
}
