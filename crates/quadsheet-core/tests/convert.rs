//! End-to-end conversions through `LayoutEngine::convert`

mod common;

use common::*;
use pretty_assertions::assert_eq;
use quadsheet_core::{CellOutcome, DocumentOutcome, LayoutError, Placement};
use std::sync::Arc;

fn outcomes(report: &quadsheet_core::ConversionReport) -> Vec<Vec<CellOutcome>> {
    report
        .pages
        .iter()
        .map(|page| page.cells.iter().map(|cell| cell.outcome.clone()).collect())
        .collect()
}

fn placements(report: &quadsheet_core::ConversionReport) -> Vec<Placement> {
    report
        .pages
        .iter()
        .flat_map(|page| page.cells.iter().map(|cell| cell.placement))
        .collect()
}

#[test]
fn ten_pages_fill_three_output_pages() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "cards.pdf", 10, "Cards");
    let output = work.path().join("out.pdf");

    let engine = engine_with(scratch.path(), Arc::new(FakeRasterizer::default()));
    let report = engine.convert(&[&source], &output).unwrap();

    assert_eq!(report.outcome, DocumentOutcome::FullLayout);
    assert_eq!(report.source_pages, Some(10));
    assert_eq!(report.output_pages, 3);
    let cells: Vec<usize> = report.pages.iter().map(|p| p.cells.len()).collect();
    assert_eq!(cells, vec![4, 4, 2]);
    assert_eq!(images_per_page(&output), vec![4, 4, 2]);
    assert!(!report.is_degraded());
}

#[test]
fn failing_page_becomes_error_cell_only() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "cards.pdf", 6, "Cards");
    let output = work.path().join("out.pdf");

    let rasterizer = Arc::new(FakeRasterizer::failing_on(&["Cards-Page-3"]));
    let report = engine_with(scratch.path(), rasterizer)
        .convert(&[&source], &output)
        .unwrap();

    let flat: Vec<CellOutcome> = outcomes(&report).into_iter().flatten().collect();
    assert_eq!(flat.len(), 6);
    for (index, outcome) in flat.iter().enumerate() {
        if index == 2 {
            assert!(outcome.is_error(), "cell {} should be an error", index);
        } else {
            assert_eq!(outcome, &CellOutcome::Rendered, "cell {}", index);
        }
    }

    assert_eq!(report.outcome, DocumentOutcome::FullLayout);
    assert!(report.is_degraded());
    assert_eq!(images_per_page(&output), vec![3, 2]);
    assert_eq!(labels_per_page(&output)[0], vec!["Error: Page 3".to_string()]);
}

#[test]
fn merge_keeps_document_and_page_order() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let a = write_pdf(work.path(), "a.pdf", 2, "A");
    let b = write_pdf(work.path(), "b.pdf", 3, "B");
    let c = write_pdf(work.path(), "c.pdf", 1, "C");
    let output = work.path().join("out.pdf");

    let rasterizer = Arc::new(FakeRasterizer::default());
    let report = engine_with(scratch.path(), rasterizer.clone())
        .convert(&[&a, &b, &c], &output)
        .unwrap();

    assert_eq!(report.source_pages, Some(6));
    assert_eq!(
        rasterizer.seen(),
        vec!["A-Page-1", "A-Page-2", "B-Page-1", "B-Page-2", "B-Page-3", "C-Page-1"]
    );
    assert_eq!(images_per_page(&output), vec![4, 2]);
}

#[test]
fn merge_needs_two_usable_documents() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let a = write_pdf(work.path(), "a.pdf", 2, "A");
    let notes = work.path().join("notes.txt");
    std::fs::write(&notes, b"not a pdf").unwrap();
    let output = work.path().join("out.pdf");

    let err = engine_without_rasterizer(scratch.path())
        .convert(&[a, notes], &output)
        .unwrap_err();

    assert!(matches!(err, LayoutError::InvalidInput(_)));
    assert!(!output.exists());
    assert!(dir_entries(scratch.path()).is_empty());
}

#[test]
fn no_temporary_files_survive_success() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let a = write_pdf(work.path(), "a.pdf", 3, "A");
    let b = write_pdf(work.path(), "b.pdf", 3, "B");

    let engine = engine_with(scratch.path(), Arc::new(FakeRasterizer::failing_on(&["B-Page-2"])));
    engine.convert(&[&a, &b], &work.path().join("out.pdf")).unwrap();

    assert_eq!(dir_entries(scratch.path()), Vec::<std::path::PathBuf>::new());
}

#[test]
fn no_temporary_files_survive_failure() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let a = write_pdf(work.path(), "a.pdf", 2, "A");
    let b = write_pdf(work.path(), "b.pdf", 2, "B");
    let output = work.path().join("missing-dir").join("out.pdf");

    let err = engine_with(scratch.path(), Arc::new(FakeRasterizer::default()))
        .convert(&[&a, &b], &output)
        .unwrap_err();

    assert!(matches!(err, LayoutError::OutputUnwritable(_)));
    assert!(!output.exists());
    assert_eq!(dir_entries(scratch.path()), Vec::<std::path::PathBuf>::new());
}

#[test]
fn converting_twice_gives_same_layout() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "cards.pdf", 7, "Cards");
    let engine = engine_with(scratch.path(), Arc::new(FakeRasterizer::default()));

    let first = engine.convert(&[&source], &work.path().join("first.pdf")).unwrap();
    let second = engine.convert(&[&source], &work.path().join("second.pdf")).unwrap();

    assert_eq!(first.output_pages, second.output_pages);
    assert_eq!(placements(&first), placements(&second));
}

#[test]
fn garbage_source_produces_blank_page() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = work.path().join("broken.pdf");
    std::fs::write(&source, b"%PDF-1.7\nthis is not really a pdf").unwrap();
    let output = work.path().join("out.pdf");

    let report = engine_without_rasterizer(scratch.path())
        .convert(&[&source], &output)
        .unwrap();

    assert_eq!(report.outcome, DocumentOutcome::Blank);
    assert_eq!(report.output_pages, 1);
    assert_eq!(page_sizes(&output).len(), 1);
    assert!(dir_entries(scratch.path()).is_empty());
}

#[test]
fn empty_source_produces_single_blank_page() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "empty.pdf", 0, "None");
    let output = work.path().join("out.pdf");

    let report = engine_without_rasterizer(scratch.path())
        .convert(&[&source], &output)
        .unwrap();

    assert_eq!(report.outcome, DocumentOutcome::FullLayout);
    assert_eq!(report.output_pages, 1);
    assert!(report.pages.is_empty());
    assert_eq!(images_per_page(&output), vec![0]);
}

#[test]
fn unavailable_rasterizer_draws_labelled_boxes() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "cards.pdf", 2, "Cards");
    let output = work.path().join("out.pdf");

    let report = engine_without_rasterizer(scratch.path())
        .convert(&[&source], &output)
        .unwrap();

    assert_eq!(report.cell_counts().placeholder, 2);
    assert!(!report.is_degraded());
    assert_eq!(images_per_page(&output), vec![0]);
    assert_eq!(
        labels_per_page(&output),
        vec![vec![
            "Page 1".to_string(),
            "128 x 96 mm".to_string(),
            "Page 2".to_string(),
            "128 x 96 mm".to_string(),
        ]]
    );
}

#[test]
fn output_pages_match_configured_size() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = write_pdf(work.path(), "cards.pdf", 5, "Cards");
    let output = work.path().join("out.pdf");

    let engine = engine_with(scratch.path(), Arc::new(FakeRasterizer::default()));
    engine.convert(&[&source], &output).unwrap();

    let geometry = engine.geometry();
    for (width, height) in page_sizes(&output) {
        assert!((width - geometry.page_width).abs() < 0.01);
        assert!((height - geometry.page_height).abs() < 0.01);
    }
    // 200 x 300 mm
    assert!((geometry.page_width - 566.93).abs() < 0.01);
    assert!((geometry.page_height - 850.39).abs() < 0.01);
}

#[test]
fn sources_are_never_modified() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let a = write_pdf(work.path(), "a.pdf", 3, "A");
    let b = write_pdf(work.path(), "b.pdf", 2, "B");
    let before = (std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());

    engine_without_rasterizer(scratch.path())
        .convert(&[&a, &b], &work.path().join("out.pdf"))
        .unwrap();

    assert_eq!(before.0, std::fs::read(&a).unwrap());
    assert_eq!(before.1, std::fs::read(&b).unwrap());
    assert!(a.exists() && b.exists());
}
