//! The omok board: 15x15, five or more in a row wins.

use std::fmt;

pub const SIZE: usize = 15;
const TO_WIN: usize = 5;

/// Horizontal, vertical, and both diagonals.
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    pub fn other(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }

    fn mark(self) -> char {
        match self {
            Self::Black => 'X',
            Self::White => 'O',
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Black => f.write_str("black"),
            Self::White => f.write_str("white"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Continue,
    /// The stone completed a line; these are its cells as (col, row).
    Won(Vec<(usize, usize)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("({col}, {row}) is off the board")]
    OutOfRange { col: i32, row: i32 },
    #[error("({col}, {row}) is already taken")]
    Occupied { col: i32, row: i32 },
}

#[derive(Clone)]
pub struct Board {
    cells: [[Option<Stone>; SIZE]; SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; SIZE]; SIZE],
        }
    }

    pub fn clear(&mut self) {
        self.cells = [[None; SIZE]; SIZE];
    }

    pub fn get(&self, col: usize, row: usize) -> Option<Stone> {
        self.cells.get(row)?.get(col).copied().flatten()
    }

    /// Checks that (`col`, `row`) is on the board and empty.
    pub fn check(&self, col: i32, row: i32) -> Result<(usize, usize), MoveError> {
        let (c, r) = match (usize::try_from(col), usize::try_from(row)) {
            (Ok(c), Ok(r)) if c < SIZE && r < SIZE => (c, r),
            _ => return Err(MoveError::OutOfRange { col, row }),
        };
        if self.cells[r][c].is_some() {
            return Err(MoveError::Occupied { col, row });
        }
        Ok((c, r))
    }

    pub fn place(&mut self, col: i32, row: i32, stone: Stone) -> Result<Placement, MoveError> {
        let (c, r) = self.check(col, row)?;
        self.cells[r][c] = Some(stone);
        Ok(match self.winning_line(c, r, stone) {
            Some(line) => Placement::Won(line),
            None => Placement::Continue,
        })
    }

    fn winning_line(&self, col: usize, row: usize, stone: Stone) -> Option<Vec<(usize, usize)>> {
        DIRECTIONS.iter().find_map(|&(dc, dr)| {
            let mut line = self.run(col, row, -dc, -dr, stone);
            line.reverse();
            line.push((col, row));
            line.extend(self.run(col, row, dc, dr, stone));
            (line.len() >= TO_WIN).then_some(line)
        })
    }

    /// Cells holding `stone` walking from (`col`, `row`) in one direction,
    /// not counting the start.
    fn run(&self, col: usize, row: usize, dc: i32, dr: i32, stone: Stone) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        let (mut c, mut r) = (col as i32 + dc, row as i32 + dr);
        while c >= 0 && r >= 0 && self.get(c as usize, r as usize) == Some(stone) {
            cells.push((c as usize, r as usize));
            c += dc;
            r += dr;
        }
        cells
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(Option::is_some))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "   ")?;
        for col in 0..SIZE {
            write!(f, "{col:>3}")?;
        }
        writeln!(f)?;
        for (r, row) in self.cells.iter().enumerate() {
            write!(f, "{r:>3}")?;
            for cell in row {
                let mark = cell.map_or('.', Stone::mark);
                write!(f, "{mark:>3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
