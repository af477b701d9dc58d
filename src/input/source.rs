//! Reading the per-client source spreadsheets.
//!
//! Every client has one spreadsheet in the client directory, named after the
//! client. The first worksheet is read without a header into a grid of
//! [`SourceCell`]s:
//!
//! - rows `0..8` hold the daily time entries,
//! - rows `8..` hold the marks (a `1` means the mark is present),
//! - column `7` of the rows `0..4` holds the total hours of four categories.

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use log::{debug, trace};

use crate::input::ClientIdentity;
use crate::utils::PathExt;
use crate::{Error, Result};

/// Extensions of the client spreadsheets, in the order they are looked up.
pub const SOURCE_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Number of rows that hold time entries, the remaining rows hold marks.
pub const TIME_ROWS: usize = 8;
/// Column of the total hours.
pub const TOTALS_COLUMN: usize = 7;
/// Number of total hour figures.
pub const TOTALS: usize = 4;

/// A single cell of a client source grid with its native type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SourceCell {
    #[default]
    Blank,
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Error(String),
}

impl SourceCell {
    /// Returns the time of day, if the cell holds a time or a date with a time.
    #[must_use]
    pub fn as_time_of_day(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(time) => Some(*time),
            Self::DateTime(date_time) => Some(date_time.time()),
            _ => None,
        }
    }

    /// Whether the cell holds the value `1`.
    #[must_use]
    pub fn is_mark(&self) -> bool {
        match self {
            Self::Int(value) => *value == 1,
            Self::Float(value) => *value == 1.0,
            Self::Bool(value) => *value,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

impl From<&Data> for SourceCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Blank,
            Data::Int(value) => Self::Int(*value),
            Data::Float(value) => Self::Float(*value),
            Data::Bool(value) => Self::Bool(*value),
            Data::String(value) => Self::Text(value.clone()),
            Data::Error(error) => Self::Error(error.to_string()),
            Data::DateTime(excel) if excel.is_duration() => excel
                .as_duration()
                .map_or_else(|| Self::Float(excel.as_f64()), Self::Duration),
            // serial values below one day carry no date, only a time
            Data::DateTime(excel) => match excel.as_datetime() {
                Some(date_time) if excel.as_f64() < 1.0 => Self::Time(date_time.time()),
                Some(date_time) => Self::DateTime(date_time),
                None => Self::Float(excel.as_f64()),
            },
            Data::DateTimeIso(_) => data
                .as_datetime()
                .map(Self::DateTime)
                .or_else(|| data.as_time().map(Self::Time))
                .unwrap_or_else(|| Self::Text(data.to_string())),
            Data::DurationIso(_) => data
                .as_duration()
                .map_or_else(|| Self::Text(data.to_string()), Self::Duration),
        }
    }
}

/// The rectangular grid read from the source file of a client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientTimesheet {
    rows: Vec<Vec<SourceCell>>,
}

impl ClientTimesheet {
    /// Creates a grid from rows, shorter rows are padded with blanks.
    #[must_use]
    pub fn new(mut rows: Vec<Vec<SourceCell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, SourceCell::Blank);
        }

        Self { rows }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<&SourceCell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// The rows holding time entries.
    pub fn time_rows(&self) -> impl Iterator<Item = &[SourceCell]> + '_ {
        self.rows.iter().take(TIME_ROWS).map(Vec::as_slice)
    }

    /// The rows holding marks.
    pub fn mark_rows(&self) -> impl Iterator<Item = &[SourceCell]> + '_ {
        self.rows.iter().skip(TIME_ROWS).map(Vec::as_slice)
    }

    /// The total hours of the `index`th category.
    #[must_use]
    pub fn total(&self, index: usize) -> Option<&SourceCell> {
        if index >= TOTALS {
            return None;
        }

        self.get(index, TOTALS_COLUMN)
    }
}

impl From<&calamine::Range<Data>> for ClientTimesheet {
    fn from(range: &calamine::Range<Data>) -> Self {
        // calamine starts the range at the first used cell, but the layout
        // is relative to the top left corner of the sheet
        let (row_offset, column_offset) = range
            .start()
            .map_or((0, 0), |(row, column)| (row as usize, column as usize));
        let (height, width) = range.get_size();

        let mut rows = vec![vec![SourceCell::Blank; column_offset + width]; row_offset + height];
        for (row, column, data) in range.cells() {
            rows[row_offset + row][column_offset + column] = SourceCell::from(data);
        }

        Self::new(rows)
    }
}

/// The directory holding one source spreadsheet per client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDirectory {
    path: PathBuf,
}

impl ClientDirectory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the source file of `client`.
    pub fn locate(&self, client: &ClientIdentity) -> Result<PathBuf> {
        SOURCE_EXTENSIONS
            .iter()
            .map(|extension| self.path.join(client.file_name(extension)))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::not_found("client source", self.path.join(client.file_name("xlsx"))))
    }

    /// Reads the source grid of `client`.
    pub fn load(&self, client: &ClientIdentity) -> Result<ClientTimesheet> {
        let path = self.locate(client)?;
        debug!("loading source of `{}` from `{}`", client, path.display());

        let malformed = |reason: String| Error::Malformed {
            path: path.clone(),
            reason,
        };

        let mut workbook = open_workbook_auto(&path).map_err(|e| malformed(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| malformed("the file has no worksheet".to_string()))?
            .map_err(|e| malformed(e.to_string()))?;

        let timesheet = ClientTimesheet::from(&range);
        trace!(
            "read {}x{} grid for `{}`",
            timesheet.height(),
            timesheet.width(),
            client
        );

        Ok(timesheet)
    }

    /// Lists the clients that have a source file, sorted by name.
    pub fn list_clients(&self) -> Result<Vec<ClientIdentity>> {
        let entries = fs::read_dir(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("client directory", &self.path)
            } else {
                Error::Io(e)
            }
        })?;

        let mut clients = Vec::new();
        for entry in entries {
            let path = entry?.path();

            let is_source = path.is_file()
                && SOURCE_EXTENSIONS
                    .iter()
                    .any(|extension| path.has_extension(*extension));
            let is_hidden = path
                .file_name_str()
                .map_or(true, |name| name.starts_with('.') || name.starts_with("~$"));

            if !is_source || is_hidden {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                clients.push(ClientIdentity::new(stem));
            }
        }

        clients.sort();
        clients.dedup();

        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use pretty_assertions::assert_eq;

    use crate::time_stamp;

    #[test]
    fn test_time_value_is_time_of_day() {
        // 0.3125 days = 07:30
        let data = Data::DateTime(ExcelDateTime::new(0.3125, ExcelDateTimeType::DateTime, false));

        assert_eq!(SourceCell::from(&data), SourceCell::Time(time_stamp!(07:30)));
        assert_eq!(
            SourceCell::from(&data).as_time_of_day(),
            Some(time_stamp!(07:30))
        );
    }

    #[test]
    fn test_date_time_value_keeps_time() {
        // 2024-05-15 08:15
        let data = Data::DateTime(ExcelDateTime::new(
            45427.34375,
            ExcelDateTimeType::DateTime,
            false,
        ));

        let cell = SourceCell::from(&data);
        assert!(matches!(cell, SourceCell::DateTime(_)));
        assert_eq!(cell.as_time_of_day(), Some(time_stamp!(08:15)));
    }

    #[test]
    fn test_numbers_are_not_times() {
        assert_eq!(SourceCell::from(&Data::Float(0.5)).as_time_of_day(), None);
        assert_eq!(SourceCell::from(&Data::Int(8)).as_time_of_day(), None);
        assert_eq!(
            SourceCell::from(&Data::String("07:30".to_string())).as_time_of_day(),
            None
        );
        assert_eq!(SourceCell::from(&Data::Empty), SourceCell::Blank);
    }

    #[test]
    fn test_is_mark() {
        assert!(SourceCell::Int(1).is_mark());
        assert!(SourceCell::Float(1.0).is_mark());
        assert!(SourceCell::Bool(true).is_mark());

        assert!(!SourceCell::Int(0).is_mark());
        assert!(!SourceCell::Int(2).is_mark());
        assert!(!SourceCell::Float(1.5).is_mark());
        assert!(!SourceCell::Text("1".to_string()).is_mark());
        assert!(!SourceCell::Blank.is_mark());
    }

    #[test]
    fn test_grid_is_rectangular() {
        let timesheet = ClientTimesheet::new(vec![
            vec![SourceCell::Int(1)],
            vec![SourceCell::Int(1), SourceCell::Int(2), SourceCell::Int(3)],
        ]);

        assert_eq!(timesheet.height(), 2);
        assert_eq!(timesheet.width(), 3);
        assert_eq!(timesheet.get(0, 2), Some(&SourceCell::Blank));
        assert_eq!(timesheet.get(0, 3), None);
    }

    #[test]
    fn test_rows_are_split_into_times_and_marks() {
        let timesheet = ClientTimesheet::new(
            (0..10)
                .map(|row| vec![SourceCell::Int(row)])
                .collect::<Vec<_>>(),
        );

        assert_eq!(timesheet.time_rows().count(), TIME_ROWS);
        assert_eq!(
            timesheet
                .mark_rows()
                .map(|row| row[0].clone())
                .collect::<Vec<_>>(),
            vec![SourceCell::Int(8), SourceCell::Int(9)]
        );
    }

    #[test]
    fn test_totals() {
        let mut rows = vec![vec![SourceCell::Blank; 8]; 5];
        for (index, row) in rows.iter_mut().enumerate() {
            row[TOTALS_COLUMN] = SourceCell::Float(index as f64 * 10.0);
        }
        let timesheet = ClientTimesheet::new(rows);

        assert_eq!(timesheet.total(0), Some(&SourceCell::Float(0.0)));
        assert_eq!(timesheet.total(3), Some(&SourceCell::Float(30.0)));
        // only four categories exist
        assert_eq!(timesheet.total(4), None);
    }

    #[test]
    fn test_missing_client_is_not_found() {
        let directory = tempfile::tempdir().unwrap();
        let clients = ClientDirectory::new(directory.path());

        assert!(matches!(
            clients.load(&ClientIdentity::from("Nobody")),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_malformed() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("Doe Jane.xlsx"), b"not a spreadsheet").unwrap();
        let clients = ClientDirectory::new(directory.path());

        assert!(matches!(
            clients.load(&ClientIdentity::from("Doe Jane")),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_list_clients() {
        let directory = tempfile::tempdir().unwrap();
        for name in [
            "Doe Jane.xlsx",
            "Adams Ann.xlsx",
            "Roe Richard.ods",
            "notes.txt",
            "~$Doe Jane.xlsx",
            ".hidden.xlsx",
        ] {
            std::fs::write(directory.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(directory.path().join("archive.xlsx")).unwrap();

        let clients = ClientDirectory::new(directory.path()).list_clients().unwrap();

        assert_eq!(
            clients,
            vec![
                ClientIdentity::from("Adams Ann"),
                ClientIdentity::from("Doe Jane"),
                ClientIdentity::from("Roe Richard"),
            ]
        );
    }

    #[test]
    fn test_list_clients_of_missing_directory() {
        let directory = tempfile::tempdir().unwrap();
        let clients = ClientDirectory::new(directory.path().join("missing"));

        assert!(matches!(
            clients.list_clients(),
            Err(Error::NotFound { .. })
        ));
    }
}
