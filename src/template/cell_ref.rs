use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Largest row number of a worksheet.
pub const MAX_ROW: u32 = 1_048_576;
/// Largest column number of a worksheet (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// The address of a cell, with 1-based row and column numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    row: u32,
    column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{input}\" is not a valid cell reference")]
pub struct InvalidCellRef {
    input: String,
}

impl CellRef {
    /// # Panics
    ///
    /// If the row or column is zero or beyond the worksheet limits.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        assert!(row >= 1 && row <= MAX_ROW, "row out of range");
        assert!(column >= 1 && column <= MAX_COLUMN, "column out of range");

        Self { row, column }
    }

    /// Creates a reference from a single letter column like `b'E'`.
    #[must_use]
    pub const fn at(column: u8, row: u32) -> Self {
        assert!(column.is_ascii_uppercase(), "column must be a letter from A to Z");

        Self::new(row, (column - b'A') as u32 + 1)
    }

    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Returns the cell `rows` below and `columns` right of `self`.
    #[must_use]
    pub fn offset(&self, rows: u32, columns: u32) -> Option<Self> {
        let row = self.row.checked_add(rows)?;
        let column = self.column.checked_add(columns)?;

        (row <= MAX_ROW && column <= MAX_COLUMN).then_some(Self { row, column })
    }

    /// Zero-based `(row, column)` as used by calamine.
    #[must_use]
    pub const fn zero_based(&self) -> (u32, u32) {
        (self.row - 1, self.column - 1)
    }
}

/// Converts a column number to its letters, e.g. `5` to `E`.
#[must_use]
pub fn column_name(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let remainder = (column - 1) % 26;
        letters.push(b'A' + remainder as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();

    String::from_utf8(letters).unwrap_or_default()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.column), self.row)
    }
}

impl FromStr for CellRef {
    type Err = InvalidCellRef;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidCellRef {
            input: input.to_string(),
        };

        // absolute references like `$E$6` address the same cell
        let reference = input.replace('$', "");
        let split = reference
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = reference.split_at(split);

        if letters.is_empty() || letters.len() > 3 {
            return Err(invalid());
        }

        let mut column = 0_u32;
        for letter in letters.chars() {
            if !letter.is_ascii_alphabetic() {
                return Err(invalid());
            }

            column = column * 26 + (letter.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }

        let row: u32 = digits.parse().map_err(|_| invalid())?;

        if row == 0 || row > MAX_ROW || column > MAX_COLUMN {
            return Err(invalid());
        }

        Ok(Self { row, column })
    }
}

/// A rectangle of cells, both corners are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    first: CellRef,
    last: CellRef,
}

impl CellRange {
    #[must_use]
    pub const fn new(first: CellRef, last: CellRef) -> Self {
        assert!(first.row <= last.row && first.column <= last.column);

        Self { first, last }
    }

    #[must_use]
    pub const fn first(&self) -> CellRef {
        self.first
    }

    #[must_use]
    pub const fn last(&self) -> CellRef {
        self.last
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.last.row - self.first.row + 1
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.last.column - self.first.column + 1
    }

    #[must_use]
    pub const fn contains(&self, cell: &CellRef) -> bool {
        self.first.row <= cell.row
            && cell.row <= self.last.row
            && self.first.column <= cell.column
            && cell.column <= self.last.column
    }

    /// The cell at the zero-based `row` and `column` inside the range.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<CellRef> {
        if row >= self.height() as usize || column >= self.width() as usize {
            return None;
        }

        self.first.offset(row as u32, column as u32)
    }

    /// Iterates over all cells, row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.first.row..=self.last.row).flat_map(move |row| {
            (self.first.column..=self.last.column).map(move |column| CellRef { row, column })
        })
    }

    /// Smallest range containing both `self` and `cell`.
    #[must_use]
    pub fn extend(self, cell: CellRef) -> Self {
        Self {
            first: CellRef {
                row: self.first.row.min(cell.row),
                column: self.first.column.min(cell.column),
            },
            last: CellRef {
                row: self.last.row.max(cell.row),
                column: self.last.column.max(cell.column),
            },
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.last)
    }
}

impl FromStr for CellRange {
    type Err = InvalidCellRef;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (first, last) = match input.split_once(':') {
            Some((first, last)) => (first.parse::<CellRef>()?, last.parse::<CellRef>()?),
            None => {
                let cell = input.parse::<CellRef>()?;
                (cell, cell)
            }
        };

        if first.row > last.row || first.column > last.column {
            return Err(InvalidCellRef {
                input: input.to_string(),
            });
        }

        Ok(Self { first, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse() {
        assert_eq!("E6".parse(), Ok(CellRef::new(6, 5)));
        assert_eq!("$K$43".parse(), Ok(CellRef::new(43, 11)));
        assert_eq!("AA1".parse(), Ok(CellRef::new(1, 27)));
        assert_eq!("XFD1048576".parse(), Ok(CellRef::new(MAX_ROW, MAX_COLUMN)));

        assert!("E0".parse::<CellRef>().is_err());
        assert!("6".parse::<CellRef>().is_err());
        assert!("E".parse::<CellRef>().is_err());
        assert!("E6F".parse::<CellRef>().is_err());
        assert!("XFE1".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(CellRef::at(b'G', 2).to_string(), "G2".to_string());
        assert_eq!(CellRef::new(1, 26).to_string(), "Z1".to_string());
        assert_eq!(CellRef::new(1, 27).to_string(), "AA1".to_string());
        assert_eq!(CellRef::new(7, 703).to_string(), "AAA7".to_string());
    }

    #[test]
    fn test_range() {
        let range: CellRange = "E8:K15".parse().unwrap();

        assert_eq!(range.height(), 8);
        assert_eq!(range.width(), 7);
        assert_eq!(range.cell(2, 1), Some(CellRef::at(b'F', 10)));
        assert_eq!(range.cell(8, 0), None);
        assert_eq!(range.cell(0, 7), None);
        assert_eq!(range.cells().count(), 56);
        assert!(range.contains(&CellRef::at(b'K', 15)));
        assert!(!range.contains(&CellRef::at(b'L', 15)));
        assert_eq!(range.to_string(), "E8:K15".to_string());
    }

    #[test]
    fn test_single_cell_range() {
        let range: CellRange = "A1".parse().unwrap();

        assert_eq!(range.first(), range.last());
        assert_eq!(
            range.extend(CellRef::at(b'K', 43)),
            "A1:K43".parse().unwrap()
        );
    }
}
