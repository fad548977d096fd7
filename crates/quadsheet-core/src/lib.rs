//! Four-up PDF layout
//!
//! Lays out every group of four source pages in a 2x2 grid on a larger
//! output page, for printing small card-sized documents several to a sheet.
//!
//! - [`LayoutEngine::convert`]: one PDF, or several merged first
//! - [`geometry`]: the fixed grid constants and the placement plan
//! - [`renderer`]: rasterize a page into its cell, with placeholder tiers
//! - [`fallback`]: half-scale copy used when the grid cannot be produced

pub mod canvas;
pub mod cleanup;
pub mod compositor;
pub mod document;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod geometry;
pub mod merge;
pub mod raster;
pub mod renderer;
pub mod scratch;

#[cfg(test)]
mod test_support;

pub use compositor::{CellReport, Compositor, LayoutReport, PageReport};
pub use document::{inspect, PdfInfo, SourceDocument};
pub use engine::{CellCounts, ConversionReport, DocumentOutcome, EngineConfig, LayoutEngine};
pub use error::LayoutError;
pub use geometry::{LayoutGeometry, PhysicalLayout, Placement};
pub use merge::{merge_documents, merge_files};
pub use raster::{RasterCapability, RasterImage, Rasterizer, RasterizerSetting};
pub use renderer::CellOutcome;
