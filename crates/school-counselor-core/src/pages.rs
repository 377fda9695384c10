//! Paginated text sources (PDF pages) and the relevance filter.
//!
//! Each page becomes one [`Document`] with `page` / `total_pages`
//! provenance. A [`RelevanceFilter`] can drop passages about other schools:
//! it is applied per blank-line separated section, block list first, and a
//! page with no surviving section is dropped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{
    Document, Metadata, META_PAGE, META_SOURCE_FILE, META_SOURCE_TYPE, META_TOTAL_PAGES,
};
use crate::text::normalize;

static SECTION_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("section pattern is valid"));

/// Case-insensitive substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceFilter {
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        let allow = [
            "green level",
            "glhs",
            "course",
            "graduation",
            "credit",
            "prerequisite",
            "honors",
            "ap ",
            "advanced placement",
            "gpa",
            "grade point average",
            "schedule",
            "registration",
            "elective",
            "required",
            "math",
            "science",
            "english",
            "social studies",
            "world language",
            "arts",
            "cte",
            "healthful living",
            "physical education",
            "requirement",
            "curriculum",
            "program",
            "pathway",
            "endorsement",
            "diploma",
        ];
        let block = [
            "apex high school",
            "cary high school",
            "garner high school",
            "holly springs high school",
            "leesville road high school",
            "middle creek high school",
            "panther creek high school",
            "wakefield high school",
            "wake forest high school",
            "enloe high school",
            "millbrook high school",
            "sanderson high school",
            "broughton high school",
            "athens drive high school",
            "fuquay-varina high school",
            "green hope high school",
            "heritage high school",
            "hillside high school",
            "knightdale high school",
            "rolesville high school",
            "southeast raleigh",
            "wake early college",
            "wake stem",
            "wake young men's",
            "wake young women's",
        ];
        Self {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            block: block.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelevanceFilter {
    /// Block list wins; otherwise any allow term keeps the text; default exclude.
    pub fn is_relevant(&self, text: &str) -> bool {
        let text = normalize(text);
        if self.block.iter().any(|b| text.contains(&b.to_lowercase())) {
            return false;
        }
        self.allow.iter().any(|a| text.contains(&a.to_lowercase()))
    }

    /// Keep only the relevant blank-line separated sections of `text`.
    pub fn filter_sections(&self, text: &str) -> Option<String> {
        let kept: Vec<&str> = SECTION_BREAK
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty() && self.is_relevant(s))
            .collect();
        (!kept.is_empty()).then(|| kept.join("\n\n"))
    }
}

/// Turn extracted page texts into documents.
///
/// `pages[i]` is page `i + 1`; `None` marks a page whose extraction failed
/// and is skipped. Blank pages are skipped.
pub fn pages_to_documents(
    file: &str,
    pages: &[Option<String>],
    filter: Option<&RelevanceFilter>,
) -> Vec<Document> {
    let total = pages.len();
    pages
        .iter()
        .enumerate()
        .filter_map(|(i, page)| {
            let text = page.as_deref()?;
            if text.trim().is_empty() {
                return None;
            }
            let text = match filter {
                Some(f) => f.filter_sections(text)?,
                None => text.to_string(),
            };
            let mut metadata = Metadata::new();
            metadata.insert(META_SOURCE_TYPE.into(), "pdf".into());
            metadata.insert(META_SOURCE_FILE.into(), file.into());
            metadata.insert(META_PAGE.into(), (i + 1).into());
            metadata.insert(META_TOTAL_PAGES.into(), total.into());
            Some(Document::new(text, metadata))
        })
        .collect()
}
