//! Pagination of a source document into the four-up grid

use crate::canvas::{OutputDocument, PageCanvas};
use crate::document::SourceDocument;
use crate::error::LayoutError;
use crate::geometry::{LayoutGeometry, Placement};
use crate::renderer::{CellOutcome, PageRenderer};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
    pub placement: Placement,
    #[serde(flatten)]
    pub outcome: CellOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub cells: Vec<CellReport>,
}

/// Result of a successful pagination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutReport {
    pub source_pages: usize,
    /// One entry per output page that holds cells. Empty for an empty source,
    /// in which case a single blank page was written.
    pub pages: Vec<PageReport>,
}

impl LayoutReport {
    pub fn cells(&self) -> impl Iterator<Item = &CellReport> {
        self.pages.iter().flat_map(|page| page.cells.iter())
    }

    /// Pages in the written document
    pub fn output_pages(&self) -> usize {
        self.pages.len().max(1)
    }
}

pub struct Compositor {
    geometry: LayoutGeometry,
    renderer: PageRenderer,
}

impl Compositor {
    pub fn new(geometry: LayoutGeometry, renderer: PageRenderer) -> Self {
        Self { geometry, renderer }
    }

    /// Lay out the PDF at `source_path` into a new PDF at `output_path`
    ///
    /// Errors only when the document as a whole cannot be read or written.
    /// Problems with individual pages end up in the report.
    pub fn paginate(&self, source_path: &Path, output_path: &Path) -> Result<LayoutReport, LayoutError> {
        let source = SourceDocument::open(source_path)?;
        self.paginate_document(&source, output_path)
    }

    pub fn paginate_document(
        &self,
        source: &SourceDocument,
        output_path: &Path,
    ) -> Result<LayoutReport, LayoutError> {
        let total_pages = source.page_count();
        tracing::info!(
            "Processing {} pages onto {} output pages",
            total_pages,
            self.geometry.output_page_count(total_pages)
        );

        let mut output = OutputDocument::new(self.geometry.page_width, self.geometry.page_height);
        let mut pages = Vec::new();

        for (page_num, plan) in self.geometry.placements(total_pages).into_iter().enumerate() {
            tracing::debug!("Creating output page {}", page_num + 1);
            let mut canvas = PageCanvas::new();
            let cells = plan
                .into_iter()
                .map(|placement| self.place(&mut canvas, source, placement))
                .collect();
            output.add_page(canvas)?;
            pages.push(PageReport { cells });
        }

        if total_pages == 0 {
            tracing::warn!("Source has no pages, writing a single blank page");
        }

        output.save(output_path)?;
        Ok(LayoutReport {
            source_pages: total_pages,
            pages,
        })
    }

    fn place(&self, canvas: &mut PageCanvas, source: &SourceDocument, placement: Placement) -> CellReport {
        tracing::debug!(
            "Placing page {} in slot {} (row {}, col {}) at ({:.1}, {:.1})",
            placement.page_index + 1,
            placement.slot,
            placement.row,
            placement.col,
            placement.x,
            placement.y
        );
        let outcome = self
            .renderer
            .render(canvas, source, placement.page_index, placement.x, placement.y);
        CellReport { placement, outcome }
    }
}
