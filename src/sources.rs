//! Source discovery and loading.
//!
//! Walks `data.dir`, keeps files matching the include globs (and none of
//! the exclude globs), and turns each into documents:
//!
//! | Extension | Reader |
//! |-----------|--------|
//! | `.json` | [`RecordLoader::parse_json`] |
//! | `.ljson`, `.jsonl` | [`RecordLoader::parse_json_lines`] |
//! | `.pdf` | `pdf-extract` per page → [`pages_to_documents`] |
//!
//! When `pdf-extract` rejects a PDF as a whole, the file is reopened with
//! `lopdf` and read one page at a time; a page that fails is skipped and
//! the rest of the file is kept.
//!
//! A source that fails is logged, recorded in [`LoadReport::failures`], and
//! skipped. Loading never stops at the first bad file.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use school_counselor_core::error::SourceError;
use school_counselor_core::pages::{pages_to_documents, RelevanceFilter};
use school_counselor_core::records::RecordLoader;
use school_counselor_core::Document;

use crate::config::DataConfig;

/// Per-source outcome, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub file: String,
    pub documents: usize,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub loaded: Vec<SourceSummary>,
    pub failures: Vec<SourceError>,
}

/// Discover and load every source under `data.dir`.
///
/// Errors only when the directory or the glob patterns are unusable.
pub fn load_sources(data: &DataConfig, loader: &RecordLoader) -> Result<LoadReport> {
    let root = &data.dir;
    if !root.is_dir() {
        bail!("data directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&data.include_globs)?;
    let exclude_set = build_globset(&data.exclude_globs)?;
    let filter = data.pdf_filter.filter();

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((path.to_path_buf(), rel_str));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let mut report = LoadReport::default();
    for (path, name) in files {
        match load_file(&path, &name, loader, filter.as_ref()) {
            Ok(documents) => {
                debug!(file = %name, documents = documents.len(), "loaded source");
                report.loaded.push(SourceSummary {
                    file: name,
                    documents: documents.len(),
                });
                report.documents.extend(documents);
            }
            Err(e) => {
                warn!(file = %e.file(), error = %e, "skipping source");
                report.failures.push(e);
            }
        }
    }

    info!(
        sources = report.loaded.len(),
        documents = report.documents.len(),
        failures = report.failures.len(),
        "loaded sources"
    );
    Ok(report)
}

/// Load one file by extension.
pub fn load_file(
    path: &Path,
    name: &str,
    loader: &RecordLoader,
    filter: Option<&RelevanceFilter>,
) -> Result<Vec<Document>, SourceError> {
    let unreadable = |reason: String| SourceError::Unreadable {
        file: name.to_string(),
        reason,
    };
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
            loader.parse_json(name, &raw)
        }
        "ljson" | "jsonl" => {
            let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
            loader.parse_json_lines(name, &raw)
        }
        "pdf" => {
            let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
            let pages = extract_pdf_pages(name, &bytes).map_err(unreadable)?;
            Ok(pages_to_documents(name, &pages, filter))
        }
        other => Err(unreadable(format!("unsupported file type '.{other}'"))),
    }
}

/// Page texts of a PDF, page 1 first. `None` marks a page that failed.
fn extract_pdf_pages(name: &str, bytes: &[u8]) -> Result<Vec<Option<String>>, String> {
    match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => Ok(pages.into_iter().map(Some).collect()),
        Err(e) => {
            debug!(file = %name, error = %e, "whole-file PDF extraction failed, reading page by page");
            let doc = lopdf::Document::load_mem(bytes)
                .map_err(|e| format!("PDF extraction failed: {e}"))?;
            let numbers: Vec<u32> = doc.get_pages().into_keys().collect();
            Ok(extract_each_page(name, &numbers, |n| {
                doc.extract_text(&[n]).map_err(|e| e.to_string())
            }))
        }
    }
}

fn extract_each_page<F>(name: &str, page_numbers: &[u32], extract: F) -> Vec<Option<String>>
where
    F: Fn(u32) -> Result<String, String>,
{
    page_numbers
        .iter()
        .map(|&page| match extract(page) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(file = %name, page, error = %e, "skipping PDF page");
                None
            }
        })
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_counselor_core::models::{
        META_CATEGORY, META_PAGE, META_SOURCE_FILE, META_TOTAL_PAGES,
    };

    fn data_config(dir: &Path) -> DataConfig {
        DataConfig {
            dir: dir.to_path_buf(),
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_bad_source_is_skipped_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("clubs.json"),
            r#"[{"name": "Robotics", "advisors": "Ms. Lee"}]"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let report = load_sources(&data_config(tmp.path()), &RecordLoader::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].meta(META_CATEGORY).as_deref(), Some("club"));
        assert_eq!(
            report.documents[0].meta(META_SOURCE_FILE).as_deref(),
            Some("clubs.json")
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file(), "broken.json");
    }

    #[test]
    fn test_json_lines_and_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("courses")).unwrap();
        std::fs::write(
            tmp.path().join("courses/catalog.ljson"),
            "{\"course_name\": \"AP Biology\"}\n\n{\"course_name\": \"Honors English 10\"}\n",
        )
        .unwrap();

        let report = load_sources(&data_config(tmp.path()), &RecordLoader::default()).unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.loaded[0].file, "courses/catalog.ljson");
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), r#"{"term": "GPA", "definition": "x"}"#).unwrap();
        std::fs::write(tmp.path().join("draft.json"), r#"{"term": "CTE", "definition": "y"}"#)
            .unwrap();
        let mut config = data_config(tmp.path());
        config.exclude_globs = vec!["draft*".to_string()];

        let report = load_sources(&config, &RecordLoader::default()).unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].file, "a.json");
    }

    #[test]
    fn test_unreadable_pdf_is_a_source_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = load_file(&path, "catalog.pdf", &RecordLoader::default(), None).unwrap_err();
        assert!(matches!(err, SourceError::Unreadable { .. }));
    }

    fn two_page_pdf() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for line in ["Graduation requires 22 credits", "Course registration opens in February"] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pdf_pages_become_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("handbook.pdf");
        std::fs::write(&path, two_page_pdf()).unwrap();

        let docs = load_file(&path, "handbook.pdf", &RecordLoader::default(), None).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].text.contains("Graduation"));
        assert_eq!(docs[1].meta(META_PAGE).as_deref(), Some("2"));
        assert_eq!(docs[1].meta(META_TOTAL_PAGES).as_deref(), Some("2"));
    }

    #[test]
    fn test_failed_page_is_skipped_and_the_rest_kept() {
        let pages = extract_each_page("handbook.pdf", &[1, 2, 3], |page| match page {
            2 => Err("bad content stream".to_string()),
            n => Ok(format!("Graduation credits, page {n}")),
        });
        assert_eq!(pages[1], None);

        let docs = pages_to_documents("handbook.pdf", &pages, None);
        let numbers: Vec<_> = docs.iter().filter_map(|d| d.meta(META_PAGE)).collect();
        assert_eq!(numbers, vec!["1", "3"]);
        assert_eq!(docs[0].meta(META_TOTAL_PAGES).as_deref(), Some("3"));
    }

    #[test]
    fn test_missing_data_dir_is_an_error() {
        let config = data_config(Path::new("/definitely/not/here"));
        assert!(load_sources(&config, &RecordLoader::default()).is_err());
    }
}
