//! An editable worksheet part.
//!
//! Only `<sheetData>` is parsed into rows and cells; everything before and
//! after it is kept as raw bytes. Cells that are not written to keep their
//! original XML, written cells keep their style.

use std::collections::BTreeMap;

use log::trace;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::template::package::{attribute, local_name_is};
use crate::template::{CellRange, CellRef, MAX_COLUMN, MAX_ROW};
use crate::{Error, Result};

/// The value of a cell as far as it is needed for reading a template back.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    /// Index into the shared strings of the workbook.
    SharedString(usize),
    Bool(bool),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    /// The original inner XML of the cell.
    Raw(Vec<u8>),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    /// Attributes except for the reference, as they appear in the XML.
    attributes: Vec<(String, String)>,
    content: Content,
}

impl Cell {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, content: Content) {
        // the type attribute belongs to the previous value
        self.attributes.retain(|(key, _)| key != "t");
        self.content = content;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Row {
    attributes: Vec<(String, String)>,
    cells: BTreeMap<u32, Cell>,
    modified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    /// Everything before `<sheetData>`.
    head: Vec<u8>,
    /// Everything after `</sheetData>`.
    tail: Vec<u8>,
    /// Namespace prefix of the elements, e.g. `x:`, usually empty.
    prefix: String,
    dimension: Option<CellRange>,
    rows: BTreeMap<u32, Row>,
}

fn raw_attributes(element: &BytesStart<'_>) -> core::result::Result<Vec<(String, String)>, quick_xml::Error> {
    element
        .attributes()
        .map(|attribute| {
            let attribute = attribute?;
            Ok((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attribute.value).into_owned(),
            ))
        })
        .collect()
}

fn invalid(error: impl std::fmt::Display) -> Error {
    Error::template_invalid(format!("the worksheet is not valid xml: {}", error))
}

fn format_number(number: f64) -> String {
    // `Display` of f64 never uses an exponent, which keeps the XML readable
    format!("{}", number)
}

#[derive(Default)]
struct Parser {
    prefix: String,
    dimension: Option<CellRange>,
    sheet_data_start: Option<usize>,
    sheet_data: Option<(usize, usize)>,
    rows: BTreeMap<u32, Row>,
    row: Option<(u32, Row)>,
    cell: Option<(u32, Cell, usize)>,
    next_row: u32,
    next_column: u32,
}

impl Parser {
    fn in_sheet_data(&self) -> bool {
        self.sheet_data_start.is_some() && self.sheet_data.is_none()
    }

    fn open(&mut self, element: &BytesStart<'_>, start: usize, end: usize, empty: bool) -> Result<()> {
        if local_name_is(element, b"dimension") && self.sheet_data_start.is_none() {
            self.dimension = attribute(element, b"ref")
                .map_err(invalid)?
                .and_then(|reference| reference.parse().ok());
        } else if local_name_is(element, b"sheetData") {
            let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
            self.prefix = name
                .strip_suffix("sheetData")
                .unwrap_or_default()
                .to_string();

            self.sheet_data_start = Some(start);
            if empty {
                self.sheet_data = Some((start, end));
            }
        } else if local_name_is(element, b"row") && self.in_sheet_data() {
            let mut attributes = raw_attributes(element).map_err(invalid)?;
            let number = match take_attribute(&mut attributes, "r") {
                Some(number) => number.parse::<u32>().map_err(invalid)?,
                None => self.next_row,
            };

            if number == 0 || number > MAX_ROW {
                return Err(invalid(format!("row {} is out of range", number)));
            }

            self.next_row = number + 1;
            self.next_column = 1;

            let row = Row {
                attributes,
                ..Row::default()
            };

            if empty {
                self.rows.insert(number, row);
            } else {
                self.row = Some((number, row));
            }
        } else if local_name_is(element, b"c") && self.row.is_some() {
            let mut attributes = raw_attributes(element).map_err(invalid)?;
            let column = match take_attribute(&mut attributes, "r") {
                Some(reference) => reference.parse::<CellRef>().map_err(invalid)?.column(),
                None => self.next_column,
            };

            if column > MAX_COLUMN {
                return Err(invalid(format!("column {} is out of range", column)));
            }

            self.next_column = column + 1;

            let cell = Cell {
                attributes,
                content: Content::Raw(Vec::new()),
            };

            if empty {
                if let Some((_, row)) = &mut self.row {
                    row.cells.insert(column, cell);
                }
            } else {
                self.cell = Some((column, cell, end));
            }
        }

        Ok(())
    }

    fn close(&mut self, xml: &[u8], local_name: &[u8], start: usize, end: usize) {
        match local_name {
            b"c" => {
                if let (Some((column, mut cell, content_start)), Some((_, row))) =
                    (self.cell.take(), &mut self.row)
                {
                    cell.content = Content::Raw(xml[content_start..start].to_vec());
                    row.cells.insert(column, cell);
                }
            }
            b"row" if self.in_sheet_data() => {
                if let Some((number, row)) = self.row.take() {
                    self.rows.insert(number, row);
                }
            }
            b"sheetData" => {
                if let Some(data_start) = self.sheet_data_start {
                    self.sheet_data = Some((data_start, end));
                }
            }
            _ => {}
        }
    }
}

fn take_attribute(attributes: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let index = attributes.iter().position(|(key, _)| key == name)?;
    Some(attributes.remove(index).1)
}

impl Worksheet {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut parser = Parser {
            next_row: 1,
            next_column: 1,
            ..Parser::default()
        };

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(invalid)?;
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(element) => parser.open(&element, start, end, false)?,
                Event::Empty(element) => parser.open(&element, start, end, true)?,
                Event::End(element) => {
                    parser.close(xml, element.local_name().as_ref(), start, end)
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (data_start, data_end) = parser
            .sheet_data
            .ok_or_else(|| Error::template_invalid("the worksheet has no <sheetData>"))?;

        trace!("parsed worksheet with {} rows", parser.rows.len());

        Ok(Self {
            head: xml[..data_start].to_vec(),
            tail: xml[data_end..].to_vec(),
            prefix: parser.prefix,
            dimension: parser.dimension,
            rows: parser.rows,
        })
    }

    /// The range of the sheet that is in use: the declared dimension or, if
    /// there is none, the range spanned by all cells.
    #[must_use]
    pub fn used_range(&self) -> Option<CellRange> {
        if let Some(dimension) = self.dimension {
            return Some(dimension);
        }

        self.rows
            .iter()
            .flat_map(|(row, cells)| {
                cells
                    .cells
                    .keys()
                    .map(move |column| CellRef::new(*row, *column))
            })
            .fold(None, |range: Option<CellRange>, cell| {
                Some(match range {
                    Some(range) => range.extend(cell),
                    None => CellRange::new(cell, cell),
                })
            })
    }

    fn cell_mut(&mut self, cell: CellRef) -> &mut Cell {
        let row = self.rows.entry(cell.row()).or_default();
        row.modified = true;

        row.cells.entry(cell.column()).or_insert_with(|| Cell {
            attributes: Vec::new(),
            content: Content::Raw(Vec::new()),
        })
    }

    pub fn set_number(&mut self, cell: CellRef, number: f64) {
        if !number.is_finite() {
            self.set_string(cell, number.to_string());
            return;
        }

        self.cell_mut(cell).set(Content::Number(number));
    }

    pub fn set_string(&mut self, cell: CellRef, text: impl Into<String>) {
        self.cell_mut(cell).set(Content::Text(text.into()));
    }

    /// Reads the value of a cell, `None` if it is empty or does not exist.
    pub fn value(&self, reference: CellRef) -> Result<Option<CellValue>> {
        let Some(cell) = self
            .rows
            .get(&reference.row())
            .and_then(|row| row.cells.get(&reference.column()))
        else {
            return Ok(None);
        };

        match &cell.content {
            Content::Number(number) => Ok(Some(CellValue::Number(*number))),
            Content::Text(text) => Ok(Some(CellValue::Text(text.clone()))),
            Content::Raw(xml) => raw_value(cell.attribute("t"), xml),
        }
    }

    /// Whether the value of the cell has been written.
    #[must_use]
    pub fn is_written(&self, reference: CellRef) -> bool {
        self.rows
            .get(&reference.row())
            .and_then(|row| row.cells.get(&reference.column()))
            .map_or(false, |cell| !matches!(cell.content, Content::Raw(_)))
    }

    /// Whether an element with the local name `name` follows the cell data.
    #[must_use]
    pub fn tail_contains(&self, name: &str) -> bool {
        let Some(end) = root_end(&self.tail) else {
            return false;
        };

        let mut reader = Reader::from_reader(&self.tail[..end]);
        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) | Ok(Event::Empty(element))
                    if element.local_name().as_ref() == name.as_bytes() =>
                {
                    return true;
                }
                Ok(Event::Eof) | Err(_) => return false,
                _ => {}
            }
        }
    }

    /// Inserts an element after the cell data, in front of the first of
    /// `before` or, if none of them exist, at the end of the worksheet.
    ///
    /// `element` is written with the namespace prefix of the sheet.
    pub fn insert_after_data(&mut self, element: &str, before: &[&str]) -> Result<()> {
        let end = root_end(&self.tail)
            .ok_or_else(|| Error::template_invalid("the worksheet is not closed"))?;

        // the elements between the cell data and the closing tag of the
        // worksheet are balanced
        let mut reader = Reader::from_reader(&self.tail[..end]);
        let mut position = end;
        let mut depth = 0_usize;

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event().map_err(invalid)? {
                Event::Start(found) | Event::Empty(found)
                    if depth == 0
                        && before
                            .iter()
                            .any(|name| found.local_name().as_ref() == name.as_bytes()) =>
                {
                    position = start;
                    break;
                }
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
        }

        let element = format!("<{}{}", self.prefix, element);
        self.tail.splice(position..position, element.into_bytes());

        Ok(())
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut xml = Vec::with_capacity(self.head.len() + self.tail.len() + 4096);
        xml.extend_from_slice(&self.head);

        let prefix = self.prefix.as_str();
        xml.extend_from_slice(format!("<{}sheetData>", prefix).as_bytes());

        for (number, row) in &self.rows {
            xml.extend_from_slice(format!("<{}row r=\"{}\"", prefix, number).as_bytes());
            for (key, value) in &row.attributes {
                // spans are a hint that is wrong once cells are added
                if row.modified && key == "spans" {
                    continue;
                }
                xml.extend_from_slice(format!(" {}=\"{}\"", key, value).as_bytes());
            }

            if row.cells.is_empty() {
                xml.extend_from_slice(b"/>");
                continue;
            }
            xml.push(b'>');

            for (column, cell) in &row.cells {
                write_cell(&mut xml, prefix, CellRef::new(*number, *column), cell);
            }

            xml.extend_from_slice(format!("</{}row>", prefix).as_bytes());
        }

        xml.extend_from_slice(format!("</{}sheetData>", prefix).as_bytes());
        xml.extend_from_slice(&self.tail);

        xml
    }
}

/// Offset of the closing tag of the worksheet in the bytes after the cell
/// data.
fn root_end(tail: &[u8]) -> Option<usize> {
    tail.windows(2).rposition(|window| window == b"</")
}

fn write_cell(xml: &mut Vec<u8>, prefix: &str, reference: CellRef, cell: &Cell) {
    xml.extend_from_slice(format!("<{}c r=\"{}\"", prefix, reference).as_bytes());
    for (key, value) in &cell.attributes {
        xml.extend_from_slice(format!(" {}=\"{}\"", key, value).as_bytes());
    }

    match &cell.content {
        Content::Raw(content) if content.is_empty() => xml.extend_from_slice(b"/>"),
        Content::Raw(content) => {
            xml.push(b'>');
            xml.extend_from_slice(content);
            xml.extend_from_slice(format!("</{}c>", prefix).as_bytes());
        }
        Content::Number(number) => xml.extend_from_slice(
            format!(
                "><{p}v>{}</{p}v></{p}c>",
                format_number(*number),
                p = prefix
            )
            .as_bytes(),
        ),
        Content::Text(text) => {
            let preserve = if text.trim() != text {
                " xml:space=\"preserve\""
            } else {
                ""
            };

            xml.extend_from_slice(
                format!(
                    " t=\"inlineStr\"><{p}is><{p}t{}>{}</{p}t></{p}is></{p}c>",
                    preserve,
                    escape(text.as_str()),
                    p = prefix
                )
                .as_bytes(),
            );
        }
    }
}

/// Interprets the original XML of a cell.
fn raw_value(kind: Option<&str>, xml: &[u8]) -> Result<Option<CellValue>> {
    let mut reader = Reader::from_reader(xml);
    let mut value = None;
    let mut text = String::new();
    let mut in_value = false;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(element) if local_name_is(&element, b"v") => in_value = true,
            Event::Start(element) if local_name_is(&element, b"t") => in_text = true,
            Event::End(element) if element.local_name().as_ref() == b"v" => in_value = false,
            Event::End(element) if element.local_name().as_ref() == b"t" => in_text = false,
            Event::Text(content) if in_value || in_text => {
                let content = content.unescape().map_err(invalid)?;
                if in_value {
                    value = Some(content.into_owned());
                } else {
                    text.push_str(&content);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let invalid_value = |value: &str| invalid(format!("unexpected cell value `{}`", value));

    Ok(match (kind, value) {
        (Some("inlineStr"), _) => Some(CellValue::Text(text)),
        (_, None) => None,
        (Some("s"), Some(value)) => Some(CellValue::SharedString(
            value.trim().parse().map_err(|_| invalid_value(&value))?,
        )),
        (Some("str"), Some(value)) => Some(CellValue::Text(value)),
        (Some("b"), Some(value)) => Some(CellValue::Bool(value.trim() == "1")),
        (Some("e"), Some(value)) => Some(CellValue::Error(value)),
        (_, Some(value)) => Some(CellValue::Number(
            value.trim().parse().map_err(|_| invalid_value(&value))?,
        )),
    })
}
