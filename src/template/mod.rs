//! Filling the weekly timesheet template.

mod cell_ref;
mod document;
mod drawing;
mod layout;
mod package;
mod worksheet;

pub use cell_ref::*;
pub use document::*;
pub use drawing::Picture;
pub use layout::*;
pub use worksheet::CellValue;

use std::path::{Path, PathBuf};

use chrono::Datelike;
use log::{debug, info, trace};

use crate::input::{ClientDirectory, ClientIdentity, ClientTimesheet, IdentityFormat, SourceCell};
use crate::time::{self, current_week, ReferenceTime, WeekWindow};
use crate::utils::{self, Resources};
use crate::{Error, Result};

/// The glyph written into the mark block for every mark of the source.
pub const CHECK_MARK: &str = "\u{2714}";
/// Name of the sheet that is filled, unless configured otherwise.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// Where the logo comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Branding {
    /// The logo that ships with the binary.
    #[default]
    Embedded,
    /// A png file on disk.
    File(PathBuf),
}

impl Branding {
    fn picture(&self) -> Result<Picture> {
        match self {
            Self::Embedded => {
                let file = Resources::get("logo.png")
                    .ok_or_else(|| Error::not_found("embedded logo", "logo.png"))?;
                Picture::png(file.data.into_owned())
            }
            Self::File(path) => {
                if !path.is_file() {
                    return Err(Error::not_found("logo", path));
                }
                Picture::png(utils::read(path)?)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOptions {
    pub sheet: String,
    pub layout: Layout,
    pub identity_format: IdentityFormat,
    pub include_totals: bool,
    /// `None` leaves the template without a logo.
    pub branding: Option<Branding>,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_SHEET.to_string(),
            layout: Layout::WEEKLY,
            identity_format: IdentityFormat::default(),
            include_totals: true,
            branding: Some(Branding::Embedded),
        }
    }
}

/// Fills copies of a template with the data of a client.
#[derive(Debug, Clone)]
pub struct TemplateFiller {
    template: PathBuf,
    clients: ClientDirectory,
    options: FillOptions,
}

impl TemplateFiller {
    #[must_use]
    pub fn new(template: impl Into<PathBuf>, clients: ClientDirectory, options: FillOptions) -> Self {
        Self {
            template: template.into(),
            clients,
            options,
        }
    }

    #[must_use]
    pub fn template(&self) -> &Path {
        &self.template
    }

    #[must_use]
    pub const fn clients(&self) -> &ClientDirectory {
        &self.clients
    }

    #[must_use]
    pub const fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Creates the timesheet of `client` for the week containing `reference`.
    ///
    /// Nothing is written to disk, the template is only read.
    pub fn fill(
        &self,
        client: &ClientIdentity,
        reference: impl Into<ReferenceTime>,
    ) -> Result<TemplateDocument> {
        // a missing or broken source must fail before the template is touched
        let timesheet = self.clients.load(client)?;

        let mut document = TemplateDocument::open(&self.template, &self.options.sheet)?;
        let layout = &self.options.layout;
        document.validate(layout)?;

        let week = current_week(reference);
        info!("filling timesheet of `{}` for {}", client, week);

        write_week(&mut document, layout, &week);
        write_times(&mut document, layout, &timesheet);
        write_marks(&mut document, layout, &timesheet);

        if self.options.include_totals {
            write_totals(&mut document, layout, &timesheet);
        }

        document.set_string(layout.identity, self.options.identity_format.apply(client));

        if let Some(branding) = &self.options.branding {
            let picture = branding.picture()?;
            document.add_picture(&picture, layout.logo_anchor)?;
        }

        Ok(document)
    }
}

fn write_week(document: &mut TemplateDocument, layout: &Layout, week: &WeekWindow) {
    for (cell, day) in layout.day_numbers.iter().zip(week.iter()) {
        document.set_number(*cell, f64::from(day.day()));
    }

    document.set_string(layout.week_start, time::format_short_date(&week.start()));
    document.set_string(layout.week_end, time::format_short_date(&week.end()));
}

fn write_times(document: &mut TemplateDocument, layout: &Layout, timesheet: &ClientTimesheet) {
    for (row, cells) in timesheet.time_rows().enumerate() {
        for (column, value) in cells.iter().enumerate() {
            let Some(cell) = layout.time_block.cell(row, column) else {
                break;
            };

            match value.as_time_of_day() {
                Some(time) => document.set_string(cell, time::format_time(&time)),
                None if !value.is_blank() => {
                    trace!("skipping {:?} at {}, it is not a time", value, cell);
                }
                None => {}
            }
        }
    }
}

fn write_marks(document: &mut TemplateDocument, layout: &Layout, timesheet: &ClientTimesheet) {
    let mut marks = 0_usize;
    for (row, cells) in timesheet.mark_rows().enumerate() {
        for (column, value) in cells.iter().enumerate() {
            let Some(cell) = layout.mark_block.cell(row, column) else {
                break;
            };

            if value.is_mark() {
                document.set_string(cell, CHECK_MARK);
                marks += 1;
            }
        }
    }

    debug!("wrote {} marks", marks);
}

fn write_totals(document: &mut TemplateDocument, layout: &Layout, timesheet: &ClientTimesheet) {
    for (index, cell) in layout.totals.iter().enumerate() {
        let Some(value) = timesheet.total(index) else {
            continue;
        };

        match value {
            SourceCell::Int(number) => document.set_number(*cell, *number as f64),
            SourceCell::Float(number) => document.set_number(*cell, *number),
            SourceCell::Text(text) => document.set_string(*cell, text.as_str()),
            SourceCell::Time(time) => document.set_string(*cell, time::format_time(time)),
            SourceCell::DateTime(date_time) => {
                document.set_string(*cell, time::format_time(&date_time.time()));
            }
            SourceCell::Duration(duration) => {
                document.set_string(*cell, time::format_total_hours(duration));
            }
            SourceCell::Blank | SourceCell::Bool(_) | SourceCell::Error(_) => {
                trace!("no total hours for {}", cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::time_stamp;

    fn document() -> TemplateDocument {
        let package = package::Package::from_parts([
            (
                package::CONTENT_TYPES,
                "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>",
            ),
            (
                package::WORKBOOK,
                "<workbook xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
            ),
            (
                "xl/_rels/workbook.xml.rels",
                "<Relationships><Relationship Id=\"rId1\" Type=\"worksheet\" Target=\"worksheets/sheet1.xml\"/></Relationships>",
            ),
            (
                "xl/worksheets/sheet1.xml",
                "<worksheet><dimension ref=\"A1:K43\"/><sheetData/></worksheet>",
            ),
        ]);

        TemplateDocument::from_bytes(&package.to_bytes().unwrap(), DEFAULT_SHEET).unwrap()
    }

    fn text(document: &TemplateDocument, cell: &str) -> Option<CellValue> {
        document.value(cell.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_write_times_skips_other_values() {
        let mut document = document();
        let timesheet = ClientTimesheet::new(vec![vec![
            SourceCell::Time(time_stamp!(07:30)),
            SourceCell::Int(7),
            SourceCell::Text("late".to_string()),
            SourceCell::Blank,
        ]]);

        write_times(&mut document, &Layout::WEEKLY, &timesheet);

        assert_eq!(
            text(&document, "E8"),
            Some(CellValue::Text("07:30".to_string()))
        );
        assert_eq!(text(&document, "F8"), None);
        assert_eq!(text(&document, "G8"), None);
        assert!(!document.is_written("H8".parse().unwrap()));
    }

    #[test]
    fn test_write_times_ignores_columns_beyond_the_week() {
        let mut document = document();
        let timesheet = ClientTimesheet::new(vec![vec![
            SourceCell::Time(time_stamp!(08:00));
            9
        ]]);

        write_times(&mut document, &Layout::WEEKLY, &timesheet);

        assert_eq!(
            text(&document, "K8"),
            Some(CellValue::Text("08:00".to_string()))
        );
        assert!(!document.is_written("L8".parse().unwrap()));
    }

    #[test]
    fn test_write_marks() {
        let mut document = document();
        let mut rows = vec![vec![SourceCell::Blank; 7]; 8];
        rows.push(vec![
            SourceCell::Int(1),
            SourceCell::Int(0),
            SourceCell::Float(1.0),
            SourceCell::Text("1".to_string()),
        ]);

        write_marks(&mut document, &Layout::WEEKLY, &ClientTimesheet::new(rows));

        assert_eq!(
            text(&document, "E16"),
            Some(CellValue::Text(CHECK_MARK.to_string()))
        );
        assert!(!document.is_written("F16".parse().unwrap()));
        assert_eq!(
            text(&document, "G16"),
            Some(CellValue::Text(CHECK_MARK.to_string()))
        );
        assert!(!document.is_written("H16".parse().unwrap()));
    }

    #[test]
    fn test_write_totals() {
        let mut document = document();
        let mut rows = vec![vec![SourceCell::Blank; 8]; 4];
        rows[0][7] = SourceCell::Float(37.5);
        rows[1][7] = SourceCell::Text("n/a".to_string());
        rows[2][7] = SourceCell::Duration(chrono::TimeDelta::minutes(40 * 60 + 15));

        write_totals(&mut document, &Layout::WEEKLY, &ClientTimesheet::new(rows));

        assert_eq!(text(&document, "C8"), Some(CellValue::Number(37.5)));
        assert_eq!(
            text(&document, "C10"),
            Some(CellValue::Text("n/a".to_string()))
        );
        assert_eq!(
            text(&document, "C12"),
            Some(CellValue::Text("40:15".to_string()))
        );
        assert!(!document.is_written("C14".parse().unwrap()));
    }

    #[test]
    fn test_write_week() {
        let mut document = document();
        let week = current_week(crate::date!(2024:05:15));

        write_week(&mut document, &Layout::WEEKLY, &week);

        let days = ["E6", "F6", "G6", "H6", "I6", "J6", "K6"]
            .into_iter()
            .map(|cell| text(&document, cell))
            .collect::<Vec<_>>();

        assert_eq!(
            days,
            [12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0]
                .into_iter()
                .map(|day| Some(CellValue::Number(day)))
                .collect::<Vec<_>>()
        );
        assert_eq!(
            text(&document, "G2"),
            Some(CellValue::Text("05/12/24".to_string()))
        );
        assert_eq!(
            text(&document, "J2"),
            Some(CellValue::Text("05/18/24".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_small_sheet() {
        let package = package::Package::from_parts([
            (
                package::WORKBOOK,
                "<workbook><sheets><sheet name=\"Sheet1\" r:id=\"rId1\"/></sheets></workbook>",
            ),
            (
                "xl/_rels/workbook.xml.rels",
                "<Relationships><Relationship Id=\"rId1\" Type=\"worksheet\" Target=\"worksheets/sheet1.xml\"/></Relationships>",
            ),
            (
                "xl/worksheets/sheet1.xml",
                "<worksheet><dimension ref=\"A1:K20\"/><sheetData/></worksheet>",
            ),
        ]);
        let document =
            TemplateDocument::from_bytes(&package.to_bytes().unwrap(), DEFAULT_SHEET).unwrap();

        assert!(matches!(
            document.validate(&Layout::WEEKLY),
            Err(Error::TemplateInvalid(reason)) if reason.contains("K43")
        ));
    }

    #[test]
    fn test_missing_logo_file() {
        let branding = Branding::File(PathBuf::from("does/not/exist.png"));

        assert!(matches!(
            branding.picture(),
            Err(Error::NotFound { what: "logo", .. })
        ));
        assert!(Branding::Embedded.picture().is_ok());
    }
}
