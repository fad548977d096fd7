//! Rendering of a single source page into one grid cell
//!
//! Tiers, in order:
//!
//! 1. raster: isolate the page, rasterize it, draw the bitmap over the whole cell
//! 2. embed (rasterization unavailable): a box at the page's fit scale,
//!    labelled with its number and size
//! 3. placeholder: a neutral box when the rasterizer gave nothing back, a
//!    red one when anything failed
//!
//! Failures never leave the renderer. They are reported through
//! [`CellOutcome`].

use crate::canvas::{PageCanvas, Rgb};
use crate::document::SourceDocument;
use crate::error::LayoutError;
use crate::geometry::{pt_to_mm, LayoutGeometry};
use crate::raster::RasterCapability;
use crate::scratch::Scratch;
use serde::Serialize;

const NEUTRAL_STROKE: Rgb = Rgb::gray(0.8);
const NEUTRAL_FILL: Rgb = Rgb::gray(0.95);
const NEUTRAL_LABEL: Rgb = Rgb::gray(0.3);
const ERROR_STROKE: Rgb = Rgb(1.0, 0.0, 0.0);
const ERROR_FILL: Rgb = Rgb(1.0, 0.8, 0.8);
const ERROR_LABEL: Rgb = Rgb(1.0, 0.0, 0.0);

/// What ended up in a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CellOutcome {
    /// The rasterized page fills the cell
    Rendered,
    /// A neutral stand-in was drawn
    Placeholder { reason: String },
    /// Rendering failed; the cell shows an error box
    Error { reason: String },
}

impl CellOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, CellOutcome::Rendered)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellOutcome::Error { .. })
    }
}

pub struct PageRenderer {
    geometry: LayoutGeometry,
    capability: RasterCapability,
    dpi: u32,
    scratch: Scratch,
}

impl PageRenderer {
    pub fn new(
        geometry: LayoutGeometry,
        capability: RasterCapability,
        dpi: u32,
        scratch: Scratch,
    ) -> Self {
        Self {
            geometry,
            capability,
            dpi,
            scratch,
        }
    }

    /// Draw page `page_index` of `source` into the cell whose bottom-left corner is (x, y)
    pub fn render(
        &self,
        canvas: &mut PageCanvas,
        source: &SourceDocument,
        page_index: usize,
        x: f32,
        y: f32,
    ) -> CellOutcome {
        let page_number = page_index + 1;

        if page_index >= source.page_count() {
            let reason = LayoutError::PageOutOfRange {
                index: page_index,
                count: source.page_count(),
            }
            .to_string();
            tracing::warn!("Page {} not found in source: {}", page_number, reason);
            self.draw_error_placeholder(canvas, x, y, page_number);
            return CellOutcome::Error { reason };
        }

        let attempt = canvas.try_with_saved_state(|c| {
            c.translate(x, y);
            self.draw_page(c, source, page_index)
        });

        match attempt {
            Ok(outcome) => {
                if outcome.is_rendered() {
                    tracing::debug!("Placed page {} at ({:.1}, {:.1})", page_number, x, y);
                }
                outcome
            }
            Err(e) => {
                tracing::warn!("Error processing page {}: {}", page_number, e);
                self.draw_error_placeholder(canvas, x, y, page_number);
                CellOutcome::Error {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Raster or embed tier, drawn relative to the cell origin
    fn draw_page(
        &self,
        canvas: &mut PageCanvas,
        source: &SourceDocument,
        page_index: usize,
    ) -> Result<CellOutcome, LayoutError> {
        let page_number = page_index + 1;
        let page_file = self
            .scratch
            .pdf_with_bytes("page", &source.extract_page(page_index)?)?;

        match &self.capability {
            RasterCapability::Available(rasterizer) => {
                match rasterizer.rasterize(page_file.path(), self.dpi, &self.scratch)? {
                    Some(image) => {
                        canvas.image(&image, self.geometry.cell_width, self.geometry.cell_height)?;
                        Ok(CellOutcome::Rendered)
                    }
                    None => {
                        tracing::warn!("{} returned no image for page {}", rasterizer.name(), page_number);
                        self.draw_neutral_box(canvas, page_number);
                        Ok(CellOutcome::Placeholder {
                            reason: format!("{} produced no image", rasterizer.name()),
                        })
                    }
                }
            }
            RasterCapability::Unavailable => {
                let isolated = SourceDocument::open(page_file.path())?;
                let (width, height) = isolated.page_size(0)?;
                self.draw_embedded_box(canvas, page_number, width, height);
                Ok(CellOutcome::Placeholder {
                    reason: "rasterization unavailable".into(),
                })
            }
        }
    }

    /// Page outline at its fit scale, centered in the cell
    fn draw_embedded_box(&self, canvas: &mut PageCanvas, page_number: usize, width: f32, height: f32) {
        let cell_w = self.geometry.cell_width;
        let cell_h = self.geometry.cell_height;
        let scale = if width > 0.0 && height > 0.0 {
            (cell_w / width).min(cell_h / height)
        } else {
            1.0
        };
        let box_w = (width * scale).min(cell_w);
        let box_h = (height * scale).min(cell_h);
        let offset_x = (cell_w - box_w) / 2.0;
        let offset_y = (cell_h - box_h) / 2.0;

        canvas.set_stroke_color(NEUTRAL_STROKE);
        canvas.set_fill_color(NEUTRAL_FILL);
        canvas.rect(offset_x, offset_y, box_w, box_h, true, true);

        canvas.set_fill_color(NEUTRAL_LABEL);
        let label_y = offset_y + box_h - 20.0;
        canvas.text(offset_x + 10.0, label_y, 12.0, &format!("Page {}", page_number));
        canvas.text(
            offset_x + 10.0,
            label_y - 14.0,
            10.0,
            &format!("{:.0} x {:.0} mm", pt_to_mm(width), pt_to_mm(height)),
        );
    }

    fn draw_neutral_box(&self, canvas: &mut PageCanvas, page_number: usize) {
        let h = self.geometry.cell_height;
        canvas.set_stroke_color(NEUTRAL_STROKE);
        canvas.set_fill_color(NEUTRAL_FILL);
        canvas.rect(0.0, 0.0, self.geometry.cell_width, h, true, true);
        canvas.set_fill_color(NEUTRAL_LABEL);
        canvas.text(10.0, h - 20.0, 12.0, &format!("Page {}", page_number));
    }

    fn draw_error_placeholder(&self, canvas: &mut PageCanvas, x: f32, y: f32, page_number: usize) {
        let w = self.geometry.cell_width;
        let h = self.geometry.cell_height;
        canvas.with_saved_state(|c| {
            c.translate(x, y);
            c.set_stroke_color(ERROR_STROKE);
            c.set_fill_color(ERROR_FILL);
            c.rect(0.0, 0.0, w, h, true, true);
            c.set_fill_color(ERROR_LABEL);
            c.text(10.0, h - 15.0, 10.0, &format!("Error: Page {}", page_number));
        });
    }
}
