#![allow(dead_code)]

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Image, Workbook};
use tempfile::TempDir;

use timesheet_filler::input::toml_input::Settings;
use timesheet_filler::input::Config;
use timesheet_filler::template::CellRef;

pub const CLIENT: &str = "Jane Doe";

/// A workspace with a template, a client directory and a config pointing at
/// both.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("should be able to create a temporary directory");
        std::fs::create_dir_all(dir.path().join("clients")).expect("should create clients");

        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn template(&self) -> PathBuf {
        self.path().join("template.xlsx")
    }

    #[must_use]
    pub fn clients(&self) -> PathBuf {
        self.path().join("clients")
    }

    #[must_use]
    pub fn output(&self) -> PathBuf {
        self.path().join("timesheets")
    }

    /// Writes the weekly template, it spans `A1:K43`.
    pub fn with_template(self) -> Self {
        make_template(&self.template(), "Sheet1", "K43");
        self
    }

    /// Writes the weekly template with a picture of its own in `A30`.
    pub fn with_pictured_template(self) -> Self {
        let mut workbook = template_workbook("Sheet1", "K43");
        let picture = Image::new_from_buffer(include_bytes!("../../resources/logo.png"))
            .expect("the logo should be a valid image");
        workbook
            .worksheet_from_index(0)
            .expect("the template should have a sheet")
            .insert_image(29, 0, &picture)
            .expect("should be able to insert the picture");

        workbook
            .save(self.template())
            .expect("should be able to save the template");
        self
    }

    pub fn with_client(self, name: &str) -> Self {
        make_source(&self.clients().join(format!("{}.xlsx", name)));
        self
    }

    /// Builds a config from `extra` settings, conversion is disabled unless
    /// `extra` has a `[convert]` section.
    #[must_use]
    pub fn config(&self, extra: &str) -> Config {
        let mut toml = String::from(extra);
        if !extra.contains("[convert]") {
            toml.push_str("\n[convert]\nenabled = false\n");
        }

        let settings: Settings = toml::from_str(&toml).expect("settings should be valid");
        let mut builder = Config::try_from_toml(settings);
        builder.workspace(self.path());
        builder.build()
    }
}

/// Writes a template whose used range ends in `last`.
pub fn make_template(path: &Path, sheet: &str, last: &str) {
    template_workbook(sheet, last)
        .save(path)
        .expect("should be able to save the template");
}

fn template_workbook(sheet: &str, last: &str) -> Workbook {
    let mut workbook = Workbook::new();
    let title = Format::new().set_bold();
    let framed = Format::new().set_border(rust_xlsxwriter::FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).expect("sheet name should be valid");
    worksheet
        .write_string_with_format(0, 0, "Weekly timesheet", &title)
        .unwrap();
    worksheet.write_string(2, 5, "Client:").unwrap();
    worksheet.write_string(7, 0, "Regular").unwrap();
    worksheet.write_blank(7, 2, &framed).unwrap();
    worksheet.write_blank(15, 4, &framed).unwrap();

    let (row, column) = position(last);
    worksheet.write_blank(row, column, &framed).unwrap();

    workbook
}

/// Writes a client source:
///
/// - `07:30` in row 2, column 1 and `16:00` in row 0, column 6,
/// - a mark in row 8, column 0 and a `0` in row 9, column 3,
/// - the totals `38.5` and `"12:00"` in column 7.
pub fn make_source(path: &Path) {
    let mut workbook = Workbook::new();
    let time = Format::new().set_num_format("hh:mm");

    let worksheet = workbook.add_worksheet();
    worksheet.write_number_with_format(2, 1, 0.3125, &time).unwrap();
    worksheet
        .write_number_with_format(0, 6, 16.0 / 24.0, &time)
        .unwrap();
    worksheet.write_string(1, 2, "sick").unwrap();
    worksheet.write_number(8, 0, 1).unwrap();
    worksheet.write_number(9, 3, 0).unwrap();
    worksheet.write_number(0, 7, 38.5).unwrap();
    worksheet.write_string(1, 7, "12:00").unwrap();

    workbook.save(path).expect("should be able to save the source");
}

/// Zero based row and column of a cell like `F10`.
#[must_use]
pub fn position(cell: &str) -> (u32, u16) {
    let cell: CellRef = cell.parse().expect("cell reference should be valid");
    let (row, column) = cell.zero_based();
    (row, u16::try_from(column).expect("column should fit the xlsx limits"))
}

/// The sheet `Sheet1` of a generated spreadsheet.
pub struct Sheet {
    range: calamine::Range<Data>,
}

impl Sheet {
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let mut workbook = open_workbook_auto(path).expect("output should be a spreadsheet");
        let range = workbook
            .worksheet_range("Sheet1")
            .expect("output should have the filled sheet");

        Self { range }
    }

    /// The displayed value of `cell`, empty cells are `""`.
    #[must_use]
    pub fn get(&self, cell: &str) -> String {
        let (row, column) = position(cell);
        self.range
            .get_value((row, u32::from(column)))
            .map_or_else(String::new, ToString::to_string)
    }
}
