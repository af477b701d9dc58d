use std::io::{Seek, Write};
use std::path::Path;

use log::{debug, trace};

use crate::template::drawing::{attach_picture, Picture};
use crate::template::package::Package;
use crate::template::worksheet::{CellValue, Worksheet};
use crate::template::{CellRef, Layout};
use crate::utils;
use crate::{Error, Result};

/// An in-memory working copy of a template workbook.
///
/// Only the worksheet that is filled is parsed, all other parts of the
/// workbook are written back unchanged.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    package: Package,
    sheet_path: String,
    worksheet: Worksheet,
}

impl TemplateDocument {
    /// Opens the sheet called `sheet` of the workbook at `path`.
    pub fn open(path: impl AsRef<Path>, sheet: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::not_found("template", path));
        }

        let document = Self::from_bytes(&utils::read(path)?, sheet)?;
        debug!(
            "opened sheet `{}` ({}) of template {}",
            sheet,
            document.sheet_path,
            path.display()
        );

        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8], sheet: &str) -> Result<Self> {
        let package = Package::from_bytes(bytes)?;
        let sheet_path = package.worksheet_path(sheet)?;

        let xml = package
            .part(&sheet_path)
            .ok_or_else(|| Error::template_invalid(format!("`{}` is missing", sheet_path)))?;
        let worksheet = Worksheet::parse(xml)?;

        Ok(Self {
            package,
            sheet_path,
            worksheet,
        })
    }

    /// Checks that every destination of `layout` lies inside the range of the
    /// sheet that is in use.
    pub fn validate(&self, layout: &Layout) -> Result<()> {
        let used = self
            .worksheet
            .used_range()
            .ok_or_else(|| Error::template_invalid("the sheet is empty"))?;

        for (name, cell) in layout.destinations() {
            if !used.contains(&cell) {
                return Err(Error::template_invalid(format!(
                    "the {} cell {} lies outside of the used range {} of the sheet",
                    name, cell, used
                )));
            }
        }

        trace!("all destinations lie inside {}", used);
        Ok(())
    }

    pub fn set_string(&mut self, cell: CellRef, text: impl Into<String>) {
        self.worksheet.set_string(cell, text);
    }

    pub fn set_number(&mut self, cell: CellRef, number: f64) {
        self.worksheet.set_number(cell, number);
    }

    /// Reads the value of a cell of the sheet.
    pub fn value(&self, cell: CellRef) -> Result<Option<CellValue>> {
        self.worksheet.value(cell)
    }

    /// Whether the cell has been written since the template was opened.
    #[must_use]
    pub fn is_written(&self, cell: CellRef) -> bool {
        self.worksheet.is_written(cell)
    }

    /// Places a logo with its top left corner at `anchor`.
    pub fn add_picture(&mut self, picture: &Picture, anchor: CellRef) -> Result<()> {
        attach_picture(
            &mut self.package,
            &self.sheet_path,
            &mut self.worksheet,
            picture,
            anchor,
        )
    }

    /// Names of all parts of the workbook.
    pub fn part_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.package.part_names()
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut package = self.package.clone();
        package.set_part(self.sheet_path.as_str(), self.worksheet.to_xml());

        package.write_to(writer)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(std::io::Cursor::new(Vec::new()))?.into_inner())
    }

    /// Writes the workbook to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        utils::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
