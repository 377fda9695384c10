//! Structured record rendering.
//!
//! Turns arbitrary JSON (a list of records, one record, or a scalar) into
//! readable [`Document`]s. Each object is matched against an ordered list of
//! [`RecordShape`]s; the first shape whose key set is present wins and
//! decides the document's `category` and field labels. Objects that match no
//! shape are rendered as a generic `key: value` listing with category
//! `general`.
//!
//! Source text is parsed leniently: citation markers (`[1]`, `[2][3]`) can
//! be stripped from every rendered string, and a file with non-JSON text
//! after its closing bracket is read up to that bracket.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SourceError;
use crate::models::{
    Document, MetaValue, Metadata, META_CATEGORY, META_SECTION, META_SOURCE_FILE, META_SOURCE_TYPE,
};

/// Category for records that match no shape.
pub const GENERAL_CATEGORY: &str = "general";

static CITATIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?(\[\d+\])+").expect("citation pattern is valid"));

/// A labelled field in a record rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLabel {
    pub key: String,
    pub label: String,
}

/// A record shape: when to apply it and how to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordShape {
    pub category: String,
    /// Alternative key sets; the shape matches when every key of any one
    /// set is present in the record.
    pub key_sets: Vec<Vec<String>>,
    /// Fields rendered first, in this order, with these labels.
    #[serde(default)]
    pub fields: Vec<FieldLabel>,
    /// Record fields copied into document metadata.
    #[serde(default)]
    pub metadata_keys: Vec<String>,
}

impl RecordShape {
    fn new(category: &str, key_sets: &[&[&str]], fields: &[(&str, &str)]) -> Self {
        Self {
            category: category.to_string(),
            key_sets: key_sets
                .iter()
                .map(|set| set.iter().map(|k| k.to_string()).collect())
                .collect(),
            fields: fields
                .iter()
                .map(|(key, label)| FieldLabel {
                    key: key.to_string(),
                    label: label.to_string(),
                })
                .collect(),
            metadata_keys: Vec::new(),
        }
    }

    fn with_metadata(mut self, keys: &[&str]) -> Self {
        self.metadata_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// True when the record holds every key of at least one key set.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.key_sets
            .iter()
            .any(|set| !set.is_empty() && set.iter().all(|k| record.contains_key(k)))
    }
}

/// Built-in shapes, in priority order.
pub fn default_shapes() -> Vec<RecordShape> {
    vec![
        RecordShape::new(
            "club",
            &[&["name", "advisors"]],
            &[
                ("name", "Club Name"),
                ("category", "Category"),
                ("advisors", "Advisors"),
                ("student_contacts", "Student Contacts"),
                ("activities", "Activities"),
                ("meeting_day", "Meeting Day"),
                ("location", "Location"),
            ],
        )
        .with_metadata(&["name", "advisors"]),
        RecordShape::new(
            "course_difficulty",
            &[&["course_name", "skill_profile"]],
            &[
                ("course_name", "Course"),
                ("level", "Level"),
                ("skill_profile", "Skill Profile"),
                ("workload", "Workload"),
                ("difficulty", "Difficulty"),
            ],
        )
        .with_metadata(&["course_name"]),
        RecordShape::new(
            "faq",
            &[&["Question", "Answer"]],
            &[("Question", "Question"), ("Answer", "Answer")],
        ),
        RecordShape::new(
            "course",
            &[&["course_name"]],
            &[
                ("course_name", "Course"),
                ("course_code", "Course Code"),
                ("grade_levels", "Grade Levels"),
                ("credits", "Credits"),
                ("prerequisites", "Prerequisites"),
                ("description", "Description"),
            ],
        )
        .with_metadata(&["course_name"]),
        RecordShape::new(
            "graduation_requirement",
            &[&["requirement", "credits"]],
            &[
                ("requirement", "Requirement"),
                ("credits", "Credits"),
                ("details", "Details"),
            ],
        ),
        RecordShape::new(
            "college_program",
            &[&["program_name"]],
            &[
                ("program_name", "Program"),
                ("institution", "Institution"),
                ("description", "Description"),
                ("eligibility", "Eligibility"),
            ],
        ),
        RecordShape::new(
            "major",
            &[&["major", "description"]],
            &[("major", "Major"), ("description", "Description")],
        ),
        RecordShape::new(
            "glossary",
            &[&["term", "definition"]],
            &[("term", "Term"), ("definition", "Definition")],
        ),
        RecordShape::new(
            "opportunity",
            &[&["opportunity"], &["title", "deadline"]],
            &[
                ("opportunity", "Opportunity"),
                ("title", "Opportunity"),
                ("deadline", "Deadline"),
                ("eligibility", "Eligibility"),
                ("description", "Description"),
            ],
        ),
    ]
}

/// Remove bracketed numeric citation markers such as `[1]` or `[2][3]`.
pub fn strip_citations(text: &str) -> String {
    CITATIONS.replace_all(text, "").into_owned()
}

/// Renders JSON records into documents using an ordered shape list.
#[derive(Debug, Clone)]
pub struct RecordLoader {
    shapes: Vec<RecordShape>,
    strip_citations: bool,
}

impl Default for RecordLoader {
    fn default() -> Self {
        Self::new(default_shapes(), true)
    }
}

impl RecordLoader {
    pub fn new(shapes: Vec<RecordShape>, strip_citations: bool) -> Self {
        Self {
            shapes,
            strip_citations,
        }
    }

    pub fn shapes(&self) -> &[RecordShape] {
        &self.shapes
    }

    /// First shape matching `record`, if any.
    pub fn shape_for(&self, record: &Map<String, Value>) -> Option<&RecordShape> {
        self.shapes.iter().find(|s| s.matches(record))
    }

    /// Parse a JSON source and render it.
    ///
    /// Only the first JSON value is read; trailing non-JSON text (reference
    /// lists pasted after the closing bracket) is ignored.
    pub fn parse_json(&self, file: &str, raw: &str) -> Result<Vec<Document>, SourceError> {
        let malformed = |reason: String| SourceError::Malformed {
            file: file.to_string(),
            reason,
        };
        let mut stream = serde_json::Deserializer::from_str(raw).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(malformed(e.to_string())),
            None => return Err(malformed("no JSON value".to_string())),
        };
        if stream.byte_offset() < raw.trim_end().len() {
            debug!(file, "ignored trailing text after JSON value");
        }
        Ok(self.from_value(&value, file))
    }

    /// Parse a JSON-lines source: one record per non-blank line.
    ///
    /// Any bad line fails the whole source.
    pub fn parse_json_lines(&self, file: &str, raw: &str) -> Result<Vec<Document>, SourceError> {
        let mut documents = Vec::new();
        for (n, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| SourceError::Malformed {
                file: file.to_string(),
                reason: format!("line {}: {e}", n + 1),
            })?;
            documents.extend(self.from_value(&value, file));
        }
        Ok(documents)
    }

    /// Render an already-parsed value. Pure; never fails.
    pub fn from_value(&self, value: &Value, file: &str) -> Vec<Document> {
        match value {
            Value::Array(items) => self.from_array(items, file, None),
            Value::Object(map) => self.from_object(map, file),
            Value::Null => Vec::new(),
            scalar => self
                .generic_scalars(&[("value".to_string(), scalar.clone())], file, None)
                .into_iter()
                .collect(),
        }
    }

    fn from_array(&self, items: &[Value], file: &str, section: Option<&str>) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut scalars = Vec::new();
        for item in items {
            match item {
                Value::Object(map) => documents.extend(self.render_record(map, file, section)),
                Value::Null => {}
                other => scalars.push((String::new(), other.clone())),
            }
        }
        documents.extend(self.generic_scalars(&scalars, file, section));
        documents
    }

    fn from_object(&self, map: &Map<String, Value>, file: &str) -> Vec<Document> {
        if self.shape_for(map).is_some() {
            return self.render_record(map, file, None).into_iter().collect();
        }

        let mut documents = Vec::new();
        let mut rest = Map::new();
        for (key, value) in map {
            match value {
                Value::Array(items) if items.iter().any(Value::is_object) => {
                    documents.extend(self.from_array(items, file, Some(key)));
                }
                other => {
                    rest.insert(key.clone(), other.clone());
                }
            }
        }
        if !rest.is_empty() {
            if let Some(doc) = self.render_record(&rest, file, None) {
                // Keep the general record ahead of its expanded sections.
                documents.insert(0, doc);
            }
        }
        documents
    }

    fn render_record(
        &self,
        record: &Map<String, Value>,
        file: &str,
        section: Option<&str>,
    ) -> Option<Document> {
        let shape = self.shape_for(record);
        let mut lines = Vec::new();
        let mut used: Vec<&str> = Vec::new();

        if let Some(shape) = shape {
            for field in &shape.fields {
                if used.contains(&field.key.as_str()) {
                    continue;
                }
                if let Some(text) = record.get(&field.key).and_then(render_value) {
                    lines.push(format!("{}: {}", field.label, text));
                }
                used.push(field.key.as_str());
            }
        }
        for (key, value) in record {
            if used.contains(&key.as_str()) {
                continue;
            }
            if let Some(text) = render_value(value) {
                lines.push(format!("{key}: {text}"));
            }
        }
        if lines.is_empty() {
            return None;
        }

        let mut metadata = base_metadata(file);
        let category = shape.map_or(GENERAL_CATEGORY, |s| s.category.as_str());
        metadata.insert(META_CATEGORY.into(), category.into());
        if let Some(section) = section {
            metadata.insert(META_SECTION.into(), section.into());
        }
        if let Some(shape) = shape {
            for key in &shape.metadata_keys {
                if let Some(value) = record.get(key).and_then(|v| self.meta_value(v)) {
                    metadata.insert(key.clone(), value);
                }
            }
        }

        Some(Document::new(self.clean(lines.join("\n")), metadata))
    }

    fn generic_scalars(
        &self,
        scalars: &[(String, Value)],
        file: &str,
        section: Option<&str>,
    ) -> Option<Document> {
        let lines: Vec<String> = scalars
            .iter()
            .filter_map(|(key, value)| {
                render_value(value).map(|text| {
                    if key.is_empty() {
                        text
                    } else {
                        format!("{key}: {text}")
                    }
                })
            })
            .collect();
        if lines.is_empty() {
            return None;
        }
        let mut metadata = base_metadata(file);
        metadata.insert(META_CATEGORY.into(), GENERAL_CATEGORY.into());
        if let Some(section) = section {
            metadata.insert(META_SECTION.into(), section.into());
        }
        Some(Document::new(self.clean(lines.join("\n")), metadata))
    }

    fn meta_value(&self, value: &Value) -> Option<MetaValue> {
        match value {
            Value::Array(items) => Some(MetaValue::List(
                items
                    .iter()
                    .filter_map(render_value)
                    .map(|s| self.clean(s))
                    .collect(),
            )),
            Value::Number(n) => n.as_f64().map(MetaValue::Number),
            other => render_value(other).map(|s| MetaValue::Text(self.clean(s))),
        }
    }

    fn clean(&self, text: String) -> String {
        if self.strip_citations {
            strip_citations(&text)
        } else {
            text
        }
    }
}

fn base_metadata(file: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(META_SOURCE_TYPE.into(), "json".into());
    metadata.insert(META_SOURCE_FILE.into(), file.into());
    metadata
}

/// Readable rendering of one field value; `None` for null or empty.
fn render_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| render_value(v).map(|text| format!("{k}: {text}")))
            .collect::<Vec<_>>()
            .join("; "),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader() -> RecordLoader {
        RecordLoader::default()
    }

    #[test]
    fn test_club_shape_wins_and_carries_advisors() {
        let docs = loader().from_value(
            &json!({"clubs": [{"name": "Robotics", "advisors": ["Ms. Lee", "Mr. Cho"], "meeting_day": "Tuesday"}]}),
            "clubs.json",
        );
        assert_eq!(docs.len(), 1);
        let d = &docs[0];
        assert_eq!(d.meta(META_CATEGORY).as_deref(), Some("club"));
        assert_eq!(d.meta(META_SECTION).as_deref(), Some("clubs"));
        assert_eq!(
            d.metadata.get("advisors"),
            Some(&MetaValue::List(vec!["Ms. Lee".into(), "Mr. Cho".into()]))
        );
        assert_eq!(
            d.text,
            "Club Name: Robotics\nAdvisors: Ms. Lee, Mr. Cho\nMeeting Day: Tuesday"
        );
    }

    #[test]
    fn test_shape_priority_is_first_match() {
        // course_name + skill_profile also satisfies the plain `course` shape.
        let docs = loader().from_value(
            &json!([{"course_name": "AP Biology", "skill_profile": "lab heavy"}, {"course_name": "English I"}]),
            "ap_difficulty_profile.json",
        );
        assert_eq!(docs[0].meta(META_CATEGORY).as_deref(), Some("course_difficulty"));
        assert_eq!(docs[1].meta(META_CATEGORY).as_deref(), Some("course"));
    }

    #[test]
    fn test_reordered_shapes_change_category() {
        let mut shapes = default_shapes();
        let course = shapes.remove(3);
        shapes.insert(0, course);
        let docs = RecordLoader::new(shapes, true).from_value(
            &json!({"course_name": "AP Biology", "skill_profile": "lab heavy"}),
            "x.json",
        );
        assert_eq!(docs[0].meta(META_CATEGORY).as_deref(), Some("course"));
    }

    #[test]
    fn test_opportunity_alternative_key_set() {
        let docs = loader().from_value(
            &json!([{"title": "Summer STEM camp", "deadline": "March 1"}]),
            "oppurtunities_database.json",
        );
        assert_eq!(docs[0].meta(META_CATEGORY).as_deref(), Some("opportunity"));
        assert!(docs[0].text.starts_with("Opportunity: Summer STEM camp"));
    }

    #[test]
    fn test_generic_fallback_and_nested_rendering() {
        let docs = loader().from_value(
            &json!({"school": "Green Level", "address": {"city": "Cary", "zip": 27519}, "empty": "", "none": null}),
            "glhs_info.json",
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].meta(META_CATEGORY).as_deref(), Some(GENERAL_CATEGORY));
        assert_eq!(docs[0].text, "address: city: Cary; zip: 27519\nschool: Green Level");
    }

    #[test]
    fn test_object_expands_record_arrays_after_general_fields() {
        let docs = loader().from_value(
            &json!({
                "title": "Planning Guide",
                "requirements": [{"requirement": "Math", "credits": 4}],
                "tags": ["a", "b"]
            }),
            "guide.json",
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "tags: a, b\ntitle: Planning Guide");
        assert_eq!(docs[1].meta(META_CATEGORY).as_deref(), Some("graduation_requirement"));
        assert_eq!(docs[1].text, "Requirement: Math\nCredits: 4");
    }

    #[test]
    fn test_scalars_become_documents() {
        let docs = loader().from_value(&json!("just a note"), "note.json");
        assert_eq!(docs[0].text, "value: just a note");
        let docs = loader().from_value(&json!(["one", 2, null]), "list.json");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "one\n2");
    }

    #[test]
    fn test_citations_are_stripped() {
        assert_eq!(
            strip_citations("Credits transfer to NC State.[1][2] See advisor [3]."),
            "Credits transfer to NC State. See advisor."
        );
        let docs = loader().from_value(&json!({"program_name": "Career & College Promise[4]"}), "wake_tech.json");
        assert_eq!(docs[0].text, "Program: Career & College Promise");
    }

    #[test]
    fn test_citations_kept_when_disabled() {
        let docs = RecordLoader::new(default_shapes(), false)
            .from_value(&json!({"program_name": "CCP[4]"}), "wake_tech.json");
        assert_eq!(docs[0].text, "Program: CCP[4]");
    }

    #[test]
    fn test_trailing_text_after_json_is_ignored() {
        let raw = "{\"program_name\": \"CCP\"}\n\n[1] https://example.org/ref\nmore text";
        let docs = loader().parse_json("wake_tech.json", raw).unwrap();
        assert_eq!(docs[0].meta(META_CATEGORY).as_deref(), Some("college_program"));
    }

    #[test]
    fn test_malformed_source_reports_file() {
        let err = loader().parse_json("broken.json", "{\"a\": ").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        assert_eq!(err.file(), "broken.json");
    }

    #[test]
    fn test_json_lines() {
        let raw = "{\"major\": \"Biology\", \"description\": \"Life science\"}\n\n{\"major\": \"History\", \"description\": \"Past\"}\n";
        let docs = loader().parse_json_lines("majors.ljson", raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.meta(META_CATEGORY).as_deref() == Some("major")));

        let err = loader()
            .parse_json_lines("majors.ljson", "{\"major\": \"x\"}\nnot json\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
