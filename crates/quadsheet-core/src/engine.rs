//! The layout engine: input validation, merge, pagination and the fallback chain
//!
//! A conversion never fails because of its content. When the grid layout
//! cannot be produced the engine writes a half-scale copy of the source, and
//! when that fails too, a single blank page. Only an output that cannot be
//! written at all is reported as an error.

use crate::canvas::write_blank;
use crate::cleanup::{remove_with_retry, CleanupPolicy};
use crate::compositor::{Compositor, PageReport};
use crate::error::LayoutError;
use crate::fallback::shrink_pages;
use crate::geometry::{LayoutGeometry, PhysicalLayout, GRID_COLUMNS, GRID_ROWS};
use crate::merge::merge_files;
use crate::raster::{RasterCapability, RasterizerSetting, DEFAULT_RASTER_DPI};
use crate::renderer::{CellOutcome, PageRenderer};
use crate::scratch::Scratch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum number of documents for merge mode
pub const MIN_MERGE_INPUTS: usize = 2;

const FIT_TOLERANCE_MM: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: PhysicalLayout,
    pub raster_dpi: u32,
    /// Page scale used by the fallback layout
    pub fallback_scale: f32,
    pub rasterizer: RasterizerSetting,
    /// Where temporary files go; the system temp directory when unset
    pub scratch_dir: Option<PathBuf>,
    pub cleanup: CleanupPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: PhysicalLayout::default(),
            raster_dpi: DEFAULT_RASTER_DPI,
            fallback_scale: 0.5,
            rasterizer: RasterizerSetting::default(),
            scratch_dir: None,
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let l = &self.layout;
        let lengths = [
            ("source width", l.source_width_mm),
            ("source height", l.source_height_mm),
            ("cell width", l.cell_width_mm),
            ("cell height", l.cell_height_mm),
            ("page width", l.page_width_mm),
            ("page height", l.page_height_mm),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidInput(format!(
                    "{} must be a positive length, got {}mm",
                    name, value
                )));
            }
        }
        let grid_width = l.cell_width_mm * GRID_COLUMNS as f32;
        let grid_height = l.cell_height_mm * GRID_ROWS as f32;
        if grid_width > l.page_width_mm + FIT_TOLERANCE_MM
            || grid_height > l.page_height_mm + FIT_TOLERANCE_MM
        {
            return Err(LayoutError::InvalidInput(format!(
                "A {}x{} grid of {}x{}mm cells ({}x{}mm) does not fit on a {}x{}mm page",
                GRID_COLUMNS,
                GRID_ROWS,
                l.cell_width_mm,
                l.cell_height_mm,
                grid_width,
                grid_height,
                l.page_width_mm,
                l.page_height_mm
            )));
        }
        if self.raster_dpi == 0 {
            return Err(LayoutError::InvalidInput("Raster DPI must be positive".into()));
        }
        if !(self.fallback_scale.is_finite() && self.fallback_scale > 0.0 && self.fallback_scale <= 1.0) {
            return Err(LayoutError::InvalidInput(format!(
                "Fallback scale must be in (0, 1], got {}",
                self.fallback_scale
            )));
        }
        Ok(())
    }
}

/// How a conversion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Four-up grid written
    FullLayout,
    /// Half-scale copy of the source written instead of the grid
    FallbackLayout,
    /// Single blank page written
    Blank,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CellCounts {
    pub rendered: usize,
    pub placeholder: usize,
    pub error: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub outcome: DocumentOutcome,
    /// Unknown when the source could not be read
    pub source_pages: Option<usize>,
    pub output_pages: usize,
    /// Per-cell outcomes; only filled for [`DocumentOutcome::FullLayout`]
    pub pages: Vec<PageReport>,
    /// Why the grid layout was abandoned
    pub fallback_reason: Option<String>,
    /// Rasterization was switched off, so placeholder cells are what was asked for
    pub rasterization_disabled: bool,
}

impl ConversionReport {
    /// Whether the output falls short of the requested layout
    ///
    /// The grid was abandoned, a cell shows an error box, or a cell holds a
    /// placeholder although rasterization was not switched off.
    pub fn is_degraded(&self) -> bool {
        if self.outcome != DocumentOutcome::FullLayout {
            return true;
        }
        let counts = self.cell_counts();
        counts.error > 0 || (counts.placeholder > 0 && !self.rasterization_disabled)
    }

    pub fn cell_counts(&self) -> CellCounts {
        let mut counts = CellCounts::default();
        for cell in self.pages.iter().flat_map(|p| p.cells.iter()) {
            match cell.outcome {
                CellOutcome::Rendered => counts.rendered += 1,
                CellOutcome::Placeholder { .. } => counts.placeholder += 1,
                CellOutcome::Error { .. } => counts.error += 1,
            }
        }
        counts
    }
}

pub struct LayoutEngine {
    config: EngineConfig,
    geometry: LayoutGeometry,
    capability: RasterCapability,
    scratch: Scratch,
}

impl LayoutEngine {
    /// Build an engine, probing for a rasterizer as configured
    pub fn new(config: EngineConfig) -> Result<Self, LayoutError> {
        let capability = RasterCapability::resolve(&config.rasterizer);
        Self::with_capability(config, capability)
    }

    /// Build an engine with an already resolved rasterization capability
    pub fn with_capability(config: EngineConfig, capability: RasterCapability) -> Result<Self, LayoutError> {
        config.validate()?;

        let geometry = LayoutGeometry::new(&config.layout);
        geometry.log_summary();
        let scratch = Scratch::new(config.scratch_dir.clone(), config.cleanup);

        Ok(Self {
            config,
            geometry,
            capability,
            scratch,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn geometry(&self) -> &LayoutGeometry {
        &self.geometry
    }

    pub fn capability(&self) -> &RasterCapability {
        &self.capability
    }

    fn rasterization_disabled(&self) -> bool {
        self.config.rasterizer == RasterizerSetting::Disabled
    }

    /// Convert one PDF, or merge several and convert the result
    pub fn convert<P: AsRef<Path>>(
        &self,
        sources: &[P],
        output: &Path,
    ) -> Result<ConversionReport, LayoutError> {
        match sources {
            [] => Err(LayoutError::InvalidInput("No source documents given".into())),
            [single] => {
                let source = single.as_ref();
                if !source.is_file() {
                    return Err(LayoutError::InvalidInput(format!(
                        "Source not found: {}",
                        source.display()
                    )));
                }
                self.convert_single(source, output)
            }
            many => self.convert_merged(many, output),
        }
    }

    fn convert_merged<P: AsRef<Path>>(
        &self,
        sources: &[P],
        output: &Path,
    ) -> Result<ConversionReport, LayoutError> {
        let valid = mergeable_sources(sources);
        if valid.len() < MIN_MERGE_INPUTS {
            return Err(LayoutError::InvalidInput(format!(
                "Merging needs at least {} PDF files, got {} usable of {}",
                MIN_MERGE_INPUTS,
                valid.len(),
                sources.len()
            )));
        }

        tracing::info!("Merging {} documents", valid.len());
        let merged = merge_files(&valid)?;
        let merged_file = self.scratch.pdf_with_bytes("merged", &merged)?;

        // merged_file is removed when it goes out of scope
        self.convert_single(merged_file.path(), output)
    }

    fn convert_single(&self, source: &Path, output: &Path) -> Result<ConversionReport, LayoutError> {
        tracing::info!("Converting {} -> {}", source.display(), output.display());

        let renderer = PageRenderer::new(
            self.geometry,
            self.capability.clone(),
            self.config.raster_dpi,
            self.scratch.clone(),
        );
        let compositor = Compositor::new(self.geometry, renderer);

        match compositor.paginate(source, output) {
            Ok(layout) => {
                let report = ConversionReport {
                    outcome: DocumentOutcome::FullLayout,
                    source_pages: Some(layout.source_pages),
                    output_pages: layout.output_pages(),
                    pages: layout.pages,
                    fallback_reason: None,
                    rasterization_disabled: self.rasterization_disabled(),
                };
                let counts = report.cell_counts();
                tracing::info!(
                    "Created layout with {} pages ({} rendered, {} placeholders, {} errors)",
                    report.output_pages,
                    counts.rendered,
                    counts.placeholder,
                    counts.error
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Layout failed ({}), creating fallback layout", e);
                self.recover(source, output, e.to_string())
            }
        }
    }

    /// Half-scale copy, then a blank page, then give up
    fn recover(&self, source: &Path, output: &Path, reason: String) -> Result<ConversionReport, LayoutError> {
        let fallback_err = match shrink_pages(source, output, self.config.fallback_scale) {
            Ok(pages) => {
                return Ok(ConversionReport {
                    outcome: DocumentOutcome::FallbackLayout,
                    source_pages: Some(pages),
                    output_pages: pages,
                    pages: Vec::new(),
                    fallback_reason: Some(reason),
                    rasterization_disabled: self.rasterization_disabled(),
                })
            }
            Err(e) => e,
        };

        tracing::warn!("Fallback layout failed ({}), writing a blank page", fallback_err);
        match write_blank(output, self.geometry.page_width, self.geometry.page_height) {
            Ok(()) => Ok(ConversionReport {
                outcome: DocumentOutcome::Blank,
                source_pages: None,
                output_pages: 1,
                pages: Vec::new(),
                fallback_reason: Some(format!("{}; fallback: {}", reason, fallback_err)),
                rasterization_disabled: self.rasterization_disabled(),
            }),
            Err(e) => {
                tracing::error!("Could not write blank output: {}", e);
                if let Err(rm) = remove_with_retry(output, &self.config.cleanup) {
                    tracing::warn!("Could not remove partial output {}: {}", output.display(), rm);
                }
                Err(LayoutError::OutputUnwritable(format!("{}: {}", output.display(), e)))
            }
        }
    }
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Existing `.pdf` files, in the given order
fn mergeable_sources<P: AsRef<Path>>(sources: &[P]) -> Vec<&Path> {
    sources
        .iter()
        .map(|path| path.as_ref())
        .filter(|path| {
            let usable = is_pdf_path(path) && path.is_file();
            if !usable {
                tracing::warn!("Skipping {}: not an existing PDF file", path.display());
            }
            usable
        })
        .collect()
}
