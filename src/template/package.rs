//! The zip container of a workbook.
//!
//! A workbook is a zip archive of XML parts that reference each other through
//! relationship parts (`_rels/*.rels`). Parts that are not touched are written
//! back exactly as they were read.

use std::io::{Cursor, Read, Seek, Write};

use log::trace;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{Error, Result};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const WORKBOOK: &str = "xl/workbook.xml";

pub const RELATIONSHIP_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// A single file inside the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    name: String,
    data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    parts: Vec<Part>,
}

fn xml_error(part: &str, error: impl std::fmt::Display) -> Error {
    Error::template_invalid(format!("`{}` is not valid xml: {}", part, error))
}

pub(crate) fn local_name_is(element: &BytesStart<'_>, name: &[u8]) -> bool {
    element.local_name().as_ref() == name
}

/// Returns the unescaped value of the attribute with the local name `name`.
pub(crate) fn attribute(
    element: &BytesStart<'_>,
    name: &[u8],
) -> core::result::Result<Option<String>, quick_xml::Error> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == name {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }

    Ok(None)
}

/// Resolves the target of a relationship relative to the directory of the
/// part that declares it.
#[must_use]
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments = source_part.split('/').collect::<Vec<_>>();
    // the last segment is the file name of the source part
    segments.pop();

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    segments.join("/")
}

/// Path of the relationship part belonging to `part`.
#[must_use]
pub fn relationships_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((directory, file)) => format!("{}/_rels/{}.rels", directory, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Path of `target` relative to the directory of `source_part`.
#[must_use]
pub fn relative_target(source_part: &str, target: &str) -> String {
    let source = source_part.split('/').collect::<Vec<_>>();
    let source_directory = &source[..source.len().saturating_sub(1)];
    let target = target.split('/').collect::<Vec<_>>();

    let common = source_directory
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments = vec![".."; source_directory.len() - common];
    segments.extend(&target[common..]);

    segments.join("/")
}

/// Inserts `fragment` right before the closing tag of the root element.
pub(crate) fn insert_before_root_end(part: &str, xml: &[u8], fragment: &str) -> Result<Vec<u8>> {
    let position = xml
        .windows(2)
        .rposition(|window| window == b"</")
        .ok_or_else(|| Error::template_invalid(format!("`{}` has no closing root tag", part)))?;

    let mut result = Vec::with_capacity(xml.len() + fragment.len());
    result.extend_from_slice(&xml[..position]);
    result.extend_from_slice(fragment.as_bytes());
    result.extend_from_slice(&xml[position..]);

    Ok(result)
}

impl Package {
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::template_invalid(format!("not a workbook: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| Error::template_invalid(format!("unreadable workbook entry: {}", e)))?;

            if file.is_dir() {
                continue;
            }

            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            trace!("read part `{}` ({} bytes)", file.name(), data.len());

            parts.push(Part {
                name: file.name().to_string(),
                data,
            });
        }

        Ok(Self { parts })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    #[cfg(test)]
    pub(crate) fn from_parts<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            parts: parts
                .into_iter()
                .map(|(name, data)| Part {
                    name: name.to_string(),
                    data: data.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|part| part.name == name)
            .map(|part| part.data.as_slice())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Replaces the part called `name` or appends it, if it does not exist.
    pub fn set_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.parts.iter_mut().find(|part| part.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part { name, data }),
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().map(|part| part.name.as_str())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            zip.start_file(part.name.as_str(), options)
                .map_err(std::io::Error::other)?;
            zip.write_all(&part.data)?;
        }

        Ok(zip.finish().map_err(std::io::Error::other)?)
    }

    #[cfg(test)]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Reads the relationships declared by `part`. A missing relationship part
    /// means there are none.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>> {
        let path = relationships_path(part);
        let Some(xml) = self.part(&path) else {
            return Ok(Vec::new());
        };

        let mut reader = Reader::from_reader(xml);
        let mut relationships = Vec::new();
        loop {
            match reader.read_event().map_err(|e| xml_error(&path, e))? {
                Event::Start(element) | Event::Empty(element)
                    if local_name_is(&element, b"Relationship") =>
                {
                    let value = |name: &[u8]| -> Result<String> {
                        attribute(&element, name)
                            .map_err(|e| xml_error(&path, e))?
                            .ok_or_else(|| {
                                Error::template_invalid(format!(
                                    "relationship in `{}` lacks an attribute",
                                    path
                                ))
                            })
                    };

                    relationships.push(Relationship {
                        id: value(b"Id")?,
                        kind: value(b"Type")?,
                        target: value(b"Target")?,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(relationships)
    }

    /// Finds the path of the worksheet called `name`.
    pub fn worksheet_path(&self, name: &str) -> Result<String> {
        let xml = self
            .part(WORKBOOK)
            .ok_or_else(|| Error::template_invalid(format!("`{}` is missing", WORKBOOK)))?;

        let mut reader = Reader::from_reader(xml);
        let mut relationship_id = None;
        let mut sheet_names = Vec::new();
        loop {
            match reader.read_event().map_err(|e| xml_error(WORKBOOK, e))? {
                Event::Start(element) | Event::Empty(element)
                    if local_name_is(&element, b"sheet") =>
                {
                    let sheet_name = attribute(&element, b"name")
                        .map_err(|e| xml_error(WORKBOOK, e))?
                        .unwrap_or_default();

                    if sheet_name == name {
                        relationship_id =
                            attribute(&element, b"id").map_err(|e| xml_error(WORKBOOK, e))?;
                        break;
                    }

                    sheet_names.push(sheet_name);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let relationship_id = relationship_id.ok_or_else(|| {
            Error::template_invalid(format!(
                "the workbook has no sheet named `{}` (found: {})",
                name,
                sheet_names.join(", ")
            ))
        })?;

        let relationship = self
            .relationships(WORKBOOK)?
            .into_iter()
            .find(|relationship| relationship.id == relationship_id)
            .ok_or_else(|| {
                Error::template_invalid(format!(
                    "sheet `{}` references the unknown relationship `{}`",
                    name, relationship_id
                ))
            })?;

        let path = resolve_target(WORKBOOK, &relationship.target);
        if !self.contains(&path) {
            return Err(Error::template_invalid(format!(
                "the part `{}` of sheet `{}` is missing",
                path, name
            )));
        }

        Ok(path)
    }

    /// Adds a relationship to the relationships of `part` and returns its id.
    pub fn add_relationship(&mut self, part: &str, kind: &str, target: &str) -> Result<String> {
        let path = relationships_path(part);
        let existing = self.relationships(part)?;

        let id = (1..)
            .map(|number| format!("rId{}", number))
            .find(|id| existing.iter().all(|relationship| &relationship.id != id))
            .unwrap_or_default();

        let element = format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
            id,
            kind,
            quick_xml::escape::escape(target)
        );

        let xml = match self.part(&path) {
            Some(xml) => insert_before_root_end(&path, xml, &element)?,
            None => format!(
                concat!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
                    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
                    "{}",
                    "</Relationships>"
                ),
                element
            )
            .into_bytes(),
        };

        self.set_part(path, xml);

        Ok(id)
    }

    /// Registers the content type of a file extension, if it is not yet known.
    pub fn add_default_content_type(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let xml = self.content_types()?;

        let mut reader = Reader::from_reader(xml);
        loop {
            match reader.read_event().map_err(|e| xml_error(CONTENT_TYPES, e))? {
                Event::Start(element) | Event::Empty(element)
                    if local_name_is(&element, b"Default") =>
                {
                    let known = attribute(&element, b"Extension")
                        .map_err(|e| xml_error(CONTENT_TYPES, e))?
                        .map_or(false, |known| known.eq_ignore_ascii_case(extension));

                    if known {
                        return Ok(());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let element = format!(
            "<Default Extension=\"{}\" ContentType=\"{}\"/>",
            extension, content_type
        );
        let xml = insert_before_root_end(CONTENT_TYPES, xml, &element)?;
        self.set_part(CONTENT_TYPES, xml);

        Ok(())
    }

    /// Registers the content type of a single part.
    pub fn add_override_content_type(&mut self, part: &str, content_type: &str) -> Result<()> {
        let element = format!(
            "<Override PartName=\"/{}\" ContentType=\"{}\"/>",
            quick_xml::escape::escape(part),
            content_type
        );
        let xml = insert_before_root_end(CONTENT_TYPES, self.content_types()?, &element)?;
        self.set_part(CONTENT_TYPES, xml);

        Ok(())
    }

    fn content_types(&self) -> Result<&[u8]> {
        self.part(CONTENT_TYPES)
            .ok_or_else(|| Error::template_invalid(format!("`{}` is missing", CONTENT_TYPES)))
    }
}
