//! Layout geometry for the four-up grid
//!
//! All derived values are PDF points with the origin at the bottom-left
//! corner of the output page and y increasing upward. Row 0 of the grid is
//! the visual top row.
//!
//! ```text
//!  page_height ┌──────────────────────────┐
//!              │    ┌─────────┬─────────┐ │
//!              │    │ slot 0  │ slot 1  │ │  row 0
//!              │    ├─────────┼─────────┤ │
//!              │    │ slot 2  │ slot 3  │ │  row 1
//!   start_y -> │    └─────────┴─────────┘ │
//!            0 └──────────────────────────┘
//!                   ^ start_x
//! ```

use serde::{Deserialize, Serialize};

/// Points per millimeter (1 inch = 72 points, 1 inch = 25.4mm)
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

pub const GRID_COLUMNS: usize = 2;
pub const GRID_ROWS: usize = 2;
pub const CELLS_PER_PAGE: usize = GRID_COLUMNS * GRID_ROWS;

/// Convert millimeters to points
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

/// Convert points to millimeters
#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / POINTS_PER_MM
}

/// Physical measurements of one print configuration, in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalLayout {
    pub source_width_mm: f32,
    pub source_height_mm: f32,
    pub cell_width_mm: f32,
    pub cell_height_mm: f32,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
}

impl Default for PhysicalLayout {
    /// Landscape 128x96mm cards placed as 96x128mm cells on a 200x300mm sheet
    fn default() -> Self {
        Self {
            source_width_mm: 128.0,
            source_height_mm: 96.0,
            cell_width_mm: 96.0,
            cell_height_mm: 128.0,
            page_width_mm: 200.0,
            page_height_mm: 300.0,
        }
    }
}

/// Where one source page lands on the output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    /// 0-based index of the source page
    pub page_index: usize,
    /// 0-based index of the output page
    pub output_page: usize,
    /// Cell slot within the output page (0..4)
    pub slot: usize,
    pub row: usize,
    pub col: usize,
    /// Bottom-left corner of the cell, in points
    pub x: f32,
    pub y: f32,
}

/// Layout constants derived once from a [`PhysicalLayout`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutGeometry {
    pub source_width: f32,
    pub source_height: f32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub total_width: f32,
    pub total_height: f32,
    pub start_x: f32,
    pub start_y: f32,
    /// Uniform fit of the source into a cell. Informational only: cells are
    /// drawn stretched to the full cell box.
    pub scale: f32,
}

impl LayoutGeometry {
    pub fn new(layout: &PhysicalLayout) -> Self {
        let source_width = mm_to_pt(layout.source_width_mm);
        let source_height = mm_to_pt(layout.source_height_mm);
        let cell_width = mm_to_pt(layout.cell_width_mm);
        let cell_height = mm_to_pt(layout.cell_height_mm);
        let page_width = mm_to_pt(layout.page_width_mm);
        let page_height = mm_to_pt(layout.page_height_mm);

        // No spacing between cells
        let total_width = cell_width * GRID_COLUMNS as f32;
        let total_height = cell_height * GRID_ROWS as f32;

        let start_x = (page_width - total_width) / 2.0;
        let start_y = (page_height - total_height) / 2.0;

        let scale_x = cell_width / source_width;
        let scale_y = cell_height / source_height;

        Self {
            source_width,
            source_height,
            cell_width,
            cell_height,
            page_width,
            page_height,
            total_width,
            total_height,
            start_x,
            start_y,
            scale: scale_x.min(scale_y),
        }
    }

    /// Number of output pages needed for `source_pages` inputs
    pub fn output_page_count(&self, source_pages: usize) -> usize {
        source_pages.div_ceil(CELLS_PER_PAGE)
    }

    /// Number of cells filled on `output_page`
    pub fn cells_on_page(&self, source_pages: usize, output_page: usize) -> usize {
        source_pages
            .saturating_sub(output_page * CELLS_PER_PAGE)
            .min(CELLS_PER_PAGE)
    }

    /// (row, col) of a slot, row 0 being the top row
    pub fn grid_position(&self, slot: usize) -> (usize, usize) {
        (slot / GRID_COLUMNS, slot % GRID_COLUMNS)
    }

    /// Bottom-left corner of a slot in page coordinates
    pub fn cell_origin(&self, slot: usize) -> (f32, f32) {
        let (row, col) = self.grid_position(slot);
        let x = self.start_x + col as f32 * self.cell_width;
        // Flip: row 0 sits above row 1 in a bottom-up coordinate system
        let y = self.start_y + (GRID_ROWS - 1 - row) as f32 * self.cell_height;
        (x, y)
    }

    /// Full placement plan, one inner vector per output page
    pub fn placements(&self, source_pages: usize) -> Vec<Vec<Placement>> {
        let mut page_index = 0;
        (0..self.output_page_count(source_pages))
            .map(|output_page| {
                (0..self.cells_on_page(source_pages, output_page))
                    .map(|slot| {
                        let (row, col) = self.grid_position(slot);
                        let (x, y) = self.cell_origin(slot);
                        let placement = Placement {
                            page_index,
                            output_page,
                            slot,
                            row,
                            col,
                            x,
                            y,
                        };
                        page_index += 1;
                        placement
                    })
                    .collect()
            })
            .collect()
    }

    pub fn log_summary(&self) {
        tracing::debug!(
            "Page dimensions: {:.1}mm x {:.1}mm",
            pt_to_mm(self.page_width),
            pt_to_mm(self.page_height)
        );
        tracing::debug!(
            "Cell dimensions: {:.1}mm x {:.1}mm",
            pt_to_mm(self.cell_width),
            pt_to_mm(self.cell_height)
        );
        tracing::debug!(
            "Total grid area: {:.1}mm x {:.1}mm",
            pt_to_mm(self.total_width),
            pt_to_mm(self.total_height)
        );
        tracing::debug!(
            "Start position: ({:.1}mm, {:.1}mm)",
            pt_to_mm(self.start_x),
            pt_to_mm(self.start_y)
        );
        tracing::debug!("Scale factor: {:.3}", self.scale);
    }
}
