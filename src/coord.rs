// We use Row/Col terminology instead of traditional Rank/File because "File" could be misleading
// in programming context. But all user-visible places (FEN, SAN, logs) say Rank/File.

use std::{fmt, ops};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::force::Force;


pub const NUM_ROWS: u8 = 8;
pub const NUM_COLS: u8 = 8;


// Row from a force's point of view: rank 1 is the home rank for either side.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SubjectiveRow {
    idx: u8, // 0-based
}

impl SubjectiveRow {
    pub fn from_one_based(idx: u8) -> Option<Self> {
        idx.checked_sub(1).and_then(|idx| {
            if idx < NUM_ROWS { Some(Self { idx }) } else { None }
        })
    }
    pub fn to_row(self, force: Force) -> Row {
        match force {
            Force::White => Row::from_zero_based(self.idx).unwrap(),
            Force::Black => Row::from_zero_based(NUM_ROWS - self.idx - 1).unwrap(),
        }
    }
    pub fn from_row(row: Row, force: Force) -> Self {
        match force {
            Force::White => Self { idx: row.to_zero_based() },
            Force::Black => Self { idx: NUM_ROWS - row.to_zero_based() - 1 },
        }
    }
    pub fn to_one_based(self) -> u8 { self.idx + 1 }
}


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Row {
    idx: u8, // 0-based
}

impl Row {
    pub const fn from_zero_based(idx: u8) -> Option<Self> {
        if idx < NUM_ROWS { Some(Self { idx }) } else { None }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        (ch as u8).checked_sub(b'1').and_then(Self::from_zero_based)
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'1') as char }
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + Clone {
        (0..NUM_ROWS).map(|v| Self::from_zero_based(v).unwrap())
    }
}

impl ops::Add<i8> for Row {
    type Output = Option<Self>;
    fn add(self, other: i8) -> Self::Output {
        u8::try_from(self.to_zero_based() as i8 + other).ok().and_then(Self::from_zero_based)
    }
}

impl ops::Sub for Row {
    type Output = i8;
    fn sub(self, other: Self) -> Self::Output {
        (self.to_zero_based() as i8) - (other.to_zero_based() as i8)
    }
}


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Col {
    idx: u8, // 0-based
}

impl Col {
    pub const fn from_zero_based(idx: u8) -> Option<Self> {
        if idx < NUM_COLS { Some(Self { idx }) } else { None }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        (ch as u8).checked_sub(b'a').and_then(Self::from_zero_based)
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'a') as char }
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + Clone {
        (0..NUM_COLS).map(|v| Self::from_zero_based(v).unwrap())
    }
}

impl ops::Add<i8> for Col {
    type Output = Option<Self>;
    fn add(self, other: i8) -> Self::Output {
        u8::try_from(self.to_zero_based() as i8 + other).ok().and_then(Self::from_zero_based)
    }
}

impl ops::Sub for Col {
    type Output = i8;
    fn sub(self, other: Self) -> Self::Output {
        (self.to_zero_based() as i8) - (other.to_zero_based() as i8)
    }
}


// No `Ord` because there is no single obvious order. Compare by `row_col` where needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: Row,
    pub col: Col,
}

impl Coord {
    pub const fn new(row: Row, col: Col) -> Self { Self { row, col } }
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let (col, row) = s.chars().collect_tuple()?;
        Some(Coord {
            row: Row::from_algebraic(row)?,
            col: Col::from_algebraic(col)?,
        })
    }
    pub fn to_algebraic(&self) -> String {
        format!("{}{}", self.col.to_algebraic(), self.row.to_algebraic())
    }
    pub fn row_col(&self) -> (Row, Col) { (self.row, self.col) }
    pub fn all() -> impl Iterator<Item = Coord> {
        Row::all().cartesian_product(Col::all()).map(|(row, col)| Coord { row, col })
    }
}

impl ops::Add<(i8, i8)> for Coord {
    type Output = Option<Self>;
    fn add(self, other: (i8, i8)) -> Self::Output {
        Some(Self {
            row: (self.row + other.0)?,
            col: (self.col + other.1)?,
        })
    }
}

impl ops::Sub for Coord {
    type Output = (i8, i8);
    fn sub(self, other: Self) -> Self::Output { (self.row - other.row, self.col - other.col) }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({})", self.to_algebraic())
    }
}
