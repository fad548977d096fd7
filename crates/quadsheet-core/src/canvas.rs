//! Output document assembly
//!
//! A [`PageCanvas`] collects content-stream operations for one output page.
//! [`OutputDocument`] turns finished canvases into PDF pages and writes the
//! file.

use crate::error::LayoutError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;

use crate::raster::RasterImage;

/// Resource name of the label font (Helvetica)
const FONT_RESOURCE: &str = "F1";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const fn gray(level: f32) -> Self {
        Rgb(level, level, level)
    }
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, LayoutError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Drawing operations for one output page
#[derive(Debug, Default)]
pub struct PageCanvas {
    operations: Vec<Operation>,
    images: Vec<(String, Stream)>,
}

impl PageCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Run `draw` between `q` and `Q`
    pub fn with_saved_state(&mut self, draw: impl FnOnce(&mut Self)) {
        self.push("q", vec![]);
        draw(self);
        self.push("Q", vec![]);
    }

    /// Run `draw` between `q` and `Q`; on error everything it drew is discarded
    pub fn try_with_saved_state<T>(
        &mut self,
        draw: impl FnOnce(&mut Self) -> Result<T, LayoutError>,
    ) -> Result<T, LayoutError> {
        let ops_mark = self.operations.len();
        let images_mark = self.images.len();

        self.push("q", vec![]);
        match draw(self) {
            Ok(value) => {
                self.push("Q", vec![]);
                Ok(value)
            }
            Err(e) => {
                self.operations.truncate(ops_mark);
                self.images.truncate(images_mark);
                Err(e)
            }
        }
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.push(
            "cm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(x), real(y)],
        );
    }

    pub fn set_fill_color(&mut self, color: Rgb) {
        self.push("rg", vec![real(color.0), real(color.1), real(color.2)]);
    }

    pub fn set_stroke_color(&mut self, color: Rgb) {
        self.push("RG", vec![real(color.0), real(color.1), real(color.2)]);
    }

    /// Rectangle filled and/or stroked with the current colours
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: bool, stroke: bool) {
        self.push("re", vec![real(x), real(y), real(width), real(height)]);
        let paint = match (fill, stroke) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => "n",
        };
        self.push(paint, vec![]);
    }

    /// One line of Helvetica text with its baseline at (x, y)
    pub fn text(&mut self, x: f32, y: f32, size: f32, text: &str) {
        self.push("BT", vec![]);
        self.push(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(size)],
        );
        self.push("Td", vec![real(x), real(y)]);
        self.push("Tj", vec![Object::string_literal(text)]);
        self.push("ET", vec![]);
    }

    /// Draw `image` stretched to `width` x `height` at the current origin
    pub fn image(&mut self, image: &RasterImage, width: f32, height: f32) -> Result<(), LayoutError> {
        let name = format!("Im{}", self.images.len() + 1);

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            zlib(image.rgb())?,
        );
        // Already compressed
        let stream = stream.with_compression(false);

        self.with_saved_state(|c| {
            c.push(
                "cm",
                vec![
                    real(width),
                    real(0.0),
                    real(0.0),
                    real(height),
                    real(0.0),
                    real(0.0),
                ],
            );
            c.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        });
        self.images.push((name, stream));
        Ok(())
    }
}

/// An output PDF built one page at a time
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    width: f32,
    height: f32,
    page_ids: Vec<ObjectId>,
}

impl OutputDocument {
    pub fn new(width: f32, height: f32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            pages_id,
            font_id,
            width,
            height,
            page_ids: Vec::new(),
        }
    }

    /// Seal a canvas into a new page
    pub fn add_page(&mut self, canvas: PageCanvas) -> Result<ObjectId, LayoutError> {
        let encoded = Content {
            operations: canvas.operations,
        }
        .encode()?;
        let content_stream = Stream::new(dictionary! {"Filter" => "FlateDecode"}, zlib(&encoded)?)
            .with_compression(false);
        let content_id = self.doc.add_object(content_stream);

        let mut xobjects = Dictionary::new();
        for (name, stream) in canvas.images {
            let image_id = self.doc.add_object(stream);
            xobjects.set(name, Object::Reference(image_id));
        }

        let resources = dictionary! {
            "Font" => dictionary! { FONT_RESOURCE => self.font_id },
            "XObject" => xobjects,
        };

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(self.width), real(self.height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.page_ids.push(page_id);
        Ok(page_id)
    }

    /// Write the document to `path`; an empty document gets one blank page
    pub fn save(mut self, path: &Path) -> Result<(), LayoutError> {
        if self.page_ids.is_empty() {
            self.add_page(PageCanvas::new())?;
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        // The returned handle is dropped here, releasing the file
        self.doc
            .save(path)
            .map_err(|e| LayoutError::OperationError(format!("Failed to save {}: {}", path.display(), e)))?;
        Ok(())
    }
}

/// Write a valid document consisting of one blank page
pub fn write_blank(path: &Path, width: f32, height: f32) -> Result<(), LayoutError> {
    OutputDocument::new(width, height).save(path)
}
