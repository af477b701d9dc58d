//! Places a picture on a worksheet.

use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::template::package::{
    attribute, insert_before_root_end, local_name_is, relative_target, resolve_target, Package,
    RELATIONSHIP_NAMESPACE,
};
use crate::template::worksheet::Worksheet;
use crate::template::CellRef;
use crate::{Error, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
/// English metric units per pixel at 96 dpi.
const EMU_PER_PIXEL: u64 = 9525;

const DRAWING_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const SPREADSHEET_DRAWING_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const DRAWING_MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const DRAWING_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

/// Elements that have to come after `<drawing>` in a worksheet.
const FOLLOWING_ELEMENTS: &[&str] = &[
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// A PNG image with its size in pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Picture {
    /// Reads the size of the image from its header.
    pub fn png(data: Vec<u8>) -> Result<Self> {
        if data.len() < 24 || !data.starts_with(PNG_SIGNATURE) || &data[12..16] != b"IHDR" {
            return Err(Error::template_invalid("the logo is not a png image"));
        }

        let dimension = |offset: usize| {
            u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ])
        };

        let width = dimension(16);
        let height = dimension(20);

        Ok(Self {
            data,
            width,
            height,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// The first `prefix{n}suffix` that is not a part of the package.
fn free_part_name(package: &Package, prefix: &str, suffix: &str) -> String {
    (1_u32..)
        .map(|number| format!("{}{}{}", prefix, number, suffix))
        .find(|name| !package.contains(name))
        .unwrap_or_default()
}

/// The XML of a single anchor, `prefix` is the prefix of the spreadsheet
/// drawing namespace in the part it is written to.
fn anchor_xml(prefix: &str, picture: &Picture, anchor: CellRef, image_id: &str, shape_id: u32) -> String {
    let (row, column) = anchor.zero_based();
    let width = u64::from(picture.width) * EMU_PER_PIXEL;
    let height = u64::from(picture.height) * EMU_PER_PIXEL;

    format!(
        concat!(
            "<{p}oneCellAnchor xmlns:a=\"{drawing_main}\">",
            "<{p}from><{p}col>{column}</{p}col><{p}colOff>0</{p}colOff>",
            "<{p}row>{row}</{p}row><{p}rowOff>0</{p}rowOff></{p}from>",
            "<{p}ext cx=\"{width}\" cy=\"{height}\"/>",
            "<{p}pic>",
            "<{p}nvPicPr><{p}cNvPr id=\"{shape_id}\" name=\"Logo {shape_id}\"/>",
            "<{p}cNvPicPr><a:picLocks noChangeAspect=\"1\"/></{p}cNvPicPr></{p}nvPicPr>",
            "<{p}blipFill><a:blip xmlns:r=\"{namespace}\" r:embed=\"{image_id}\"/>",
            "<a:stretch><a:fillRect/></a:stretch></{p}blipFill>",
            "<{p}spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{width}\" cy=\"{height}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></{p}spPr>",
            "</{p}pic>",
            "<{p}clientData/>",
            "</{p}oneCellAnchor>"
        ),
        p = prefix,
        drawing_main = DRAWING_MAIN_NAMESPACE,
        column = column,
        row = row,
        width = width,
        height = height,
        shape_id = shape_id,
        namespace = RELATIONSHIP_NAMESPACE,
        image_id = image_id,
    )
}

fn drawing_xml(picture: &Picture, anchor: CellRef, image_id: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
            "<xdr:wsDr xmlns:xdr=\"{}\" xmlns:a=\"{}\">",
            "{}",
            "</xdr:wsDr>"
        ),
        SPREADSHEET_DRAWING_NAMESPACE,
        DRAWING_MAIN_NAMESPACE,
        anchor_xml("xdr:", picture, anchor, image_id, 2),
    )
}

/// The namespace prefix of the root of a drawing part and the largest shape
/// id used in it.
fn inspect_drawing(part: &str, xml: &[u8]) -> Result<(String, u32)> {
    let invalid = |error: quick_xml::Error| {
        Error::template_invalid(format!("`{}` is not valid xml: {}", part, error))
    };

    let mut reader = Reader::from_reader(xml);
    let mut prefix = None;
    let mut shape_id = 1;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(element) | Event::Empty(element) => {
                if prefix.is_none() {
                    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                    prefix = Some(name.strip_suffix("wsDr").unwrap_or_default().to_string());
                } else if local_name_is(&element, b"cNvPr") {
                    let id = attribute(&element, b"id")
                        .map_err(invalid)?
                        .and_then(|id| id.trim().parse::<u32>().ok())
                        .unwrap_or_default();
                    shape_id = shape_id.max(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let prefix =
        prefix.ok_or_else(|| Error::template_invalid(format!("`{}` is empty", part)))?;

    Ok((prefix, shape_id))
}

/// The drawing part the worksheet at `sheet_path` already refers to.
fn existing_drawing(package: &Package, sheet_path: &str) -> Result<Option<String>> {
    Ok(package
        .relationships(sheet_path)?
        .into_iter()
        .find(|relationship| relationship.kind == DRAWING_RELATIONSHIP)
        .map(|relationship| resolve_target(sheet_path, &relationship.target))
        .filter(|path| package.contains(path)))
}

/// Anchors `picture` with its top left corner at `anchor` of the worksheet
/// stored at `sheet_path`.
///
/// A sheet that already has a drawing gets the picture as another anchor of
/// that drawing.
pub fn attach_picture(
    package: &mut Package,
    sheet_path: &str,
    worksheet: &mut Worksheet,
    picture: &Picture,
    anchor: CellRef,
) -> Result<()> {
    let image_path = free_part_name(package, "xl/media/image", ".png");
    package.set_part(image_path.as_str(), picture.data.clone());
    package.add_default_content_type("png", "image/png")?;

    if worksheet.tail_contains("drawing") {
        let drawing_path = existing_drawing(package, sheet_path)?.ok_or_else(|| {
            Error::template_invalid("the drawing of the sheet is missing from the workbook")
        })?;

        let image_id = package.add_relationship(
            &drawing_path,
            IMAGE_RELATIONSHIP,
            &relative_target(&drawing_path, &image_path),
        )?;

        let xml = package.part(&drawing_path).unwrap_or_default();
        let (prefix, shape_id) = inspect_drawing(&drawing_path, xml)?;
        let xml = insert_before_root_end(
            &drawing_path,
            xml,
            &anchor_xml(&prefix, picture, anchor, &image_id, shape_id + 1),
        )?;
        package.set_part(drawing_path.as_str(), xml);

        debug!(
            "anchored a {}x{} logo at {} in the existing {}",
            picture.width, picture.height, anchor, drawing_path
        );

        return Ok(());
    }

    let drawing_path = free_part_name(package, "xl/drawings/drawing", ".xml");

    let image_id = package.add_relationship(
        &drawing_path,
        IMAGE_RELATIONSHIP,
        &relative_target(&drawing_path, &image_path),
    )?;

    package.set_part(
        drawing_path.as_str(),
        drawing_xml(picture, anchor, &image_id).into_bytes(),
    );
    package.add_override_content_type(&drawing_path, DRAWING_CONTENT_TYPE)?;

    let drawing_id = package.add_relationship(
        sheet_path,
        DRAWING_RELATIONSHIP,
        &relative_target(sheet_path, &drawing_path),
    )?;

    worksheet.insert_after_data(
        &format!(
            "drawing xmlns:r=\"{}\" r:id=\"{}\"/>",
            RELATIONSHIP_NAMESPACE, drawing_id
        ),
        FOLLOWING_ELEMENTS,
    )?;

    debug!(
        "anchored a {}x{} logo at {} ({})",
        picture.width, picture.height, anchor, drawing_path
    );

    Ok(())
}
