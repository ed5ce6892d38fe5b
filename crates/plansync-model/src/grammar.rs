//! The plan markdown dialect
//!
//! Line-level grammar shared by the parser, validator and serializer:
//!
//! ```text
//! # Plan: <title>
//!
//! ## Phase <N> — <name>
//! - [ ] <content> (depends: a, b) (id: <token>)
//! - [-] <content> (id: <token>)
//! - [x] <content> (id: <token>)
//! ```
//!
//! Phase headings accept an em dash, en dash or hyphen between the number and
//! the name. Task ids match `[a-zA-Z0-9_-]+`.

use crate::document::TaskStatus;
use once_cell::sync::Lazy;
use regex::Regex;

/// Title used when the document has no `# Plan:` heading
pub const DEFAULT_TITLE: &str = "Untitled Plan";

/// Separator written between a phase number and its name
pub const PHASE_SEPARATOR: &str = "—";

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Plan:\s*(.*)$").expect("valid regex"));

static PHASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Phase\s+(\d+)\s*[—–-]\s*(.+)$").expect("valid regex"));

static TASK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(id:\s*([a-zA-Z0-9_-]+)\s*\)\s*$").expect("valid regex"));

static DEPENDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(depends:\s*([^()]*)\)").expect("valid regex"));

static CHECKBOX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([ xX-])\]\s*").expect("valid regex"));

static ID_FORMAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"));

/// Extract the title from the text of a level-1 heading
///
/// Returns `None` unless the heading reads `Plan: <title>` with a non-empty
/// title.
#[must_use]
pub fn parse_title(heading: &str) -> Option<String> {
    let caps = TITLE_RE.captures(heading.trim())?;
    let title = caps[1].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// A recognized `Phase <N> — <name>` heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseHeading {
    /// Ordinal written in the heading
    pub number: u32,
    /// Trimmed phase name
    pub name: String,
}

impl PhaseHeading {
    /// Parse the text of a level-2 heading
    #[must_use]
    pub fn parse(heading: &str) -> Option<Self> {
        let caps = PHASE_RE.captures(heading.trim())?;
        let number = caps[1].parse().ok()?;
        Some(Self {
            number,
            name: caps[2].trim().to_string(),
        })
    }

    /// Id derived from the ordinal
    #[inline]
    #[must_use]
    pub fn id(&self) -> String {
        phase_id(self.number)
    }

    /// Canonical heading text
    #[must_use]
    pub fn render(&self) -> String {
        format!("Phase {} {PHASE_SEPARATOR} {}", self.number, self.name)
    }
}

/// Phase id for an ordinal
#[inline]
#[must_use]
pub fn phase_id(number: u32) -> String {
    format!("phase_{number}")
}

/// Check a task id against `[a-zA-Z0-9_-]+`
#[inline]
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    ID_FORMAT_RE.is_match(id)
}

/// A list item recognized as a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    /// Trailing `(id: ...)` token
    pub id: String,
    /// Checkbox state, pending when no checkbox is present
    pub status: TaskStatus,
    /// Text with checkbox and annotations removed
    pub content: String,
    /// Ids from every `(depends: ...)` annotation
    pub dependencies: Vec<String>,
}

impl TaskLine {
    /// Parse the text of a list item
    ///
    /// Returns `None` when the text has no trailing id annotation.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let id = TASK_ID_RE.captures(text)?[1].to_string();

        let (status, rest) = match CHECKBOX_RE.captures(text) {
            Some(caps) => {
                let mark = caps[1].chars().next().unwrap_or(' ');
                let status = TaskStatus::from_checkbox(mark).unwrap_or_default();
                (status, &text[caps[0].len()..])
            }
            None => (TaskStatus::Pending, text),
        };

        let mut content = TASK_ID_RE.replace(rest, "").into_owned();
        let mut dependencies: Vec<String> = Vec::new();
        // removing one annotation can join the text around it into another
        while DEPENDS_RE.is_match(&content) {
            for caps in DEPENDS_RE.captures_iter(&content) {
                let list = caps.get(1).map_or("", |m| m.as_str());
                for dep in split_dependencies(list) {
                    if !dependencies.contains(&dep) {
                        dependencies.push(dep);
                    }
                }
            }
            content = DEPENDS_RE.replace_all(&content, "").into_owned();
        }

        Some(Self {
            id,
            status,
            content: content.trim().to_string(),
            dependencies,
        })
    }
}

/// Whether task content reads back unchanged once written to a task line
///
/// Content must fit on one line and carry no `(depends: ...)` annotation.
#[must_use]
pub fn is_plain_content(content: &str) -> bool {
    !content.contains(['\n', '\r']) && !DEPENDS_RE.is_match(content)
}

/// Split a comma-separated dependency list, dropping empty entries
fn split_dependencies(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|dep| !dep.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_extracted_and_trimmed() {
        assert_eq!(parse_title("Plan:   Launch  "), Some("Launch".to_string()));
        assert_eq!(parse_title("Plan: Ship v2: the sequel"), Some("Ship v2: the sequel".to_string()));
        assert_eq!(parse_title("Roadmap"), None);
        assert_eq!(parse_title("Plan:"), None);
    }

    #[test]
    fn phase_heading_accepts_all_dashes() {
        for heading in ["Phase 1 — Setup", "Phase 1 – Setup", "Phase 1 - Setup", "Phase 1-Setup"] {
            let phase = PhaseHeading::parse(heading).unwrap();
            assert_eq!(phase.number, 1);
            assert_eq!(phase.name, "Setup");
            assert_eq!(phase.id(), "phase_1");
        }
    }

    #[test]
    fn phase_heading_rejects_other_text() {
        assert!(PhaseHeading::parse("Notes").is_none());
        assert!(PhaseHeading::parse("Phase one — Setup").is_none());
        assert!(PhaseHeading::parse("Phase 2").is_none());
    }

    #[test]
    fn phase_heading_renders_em_dash() {
        let phase = PhaseHeading::parse("Phase 3 - Polish  ").unwrap();
        assert_eq!(phase.render(), "Phase 3 — Polish");
    }

    #[test]
    fn task_line_full() {
        let line = TaskLine::parse("[-] Wire the API (depends: t1, t2) (id: t3)").unwrap();
        assert_eq!(line.id, "t3");
        assert_eq!(line.status, TaskStatus::InProgress);
        assert_eq!(line.content, "Wire the API");
        assert_eq!(line.dependencies, vec!["t1", "t2"]);
    }

    #[test]
    fn task_line_checkbox_states() {
        assert_eq!(TaskLine::parse("[ ] a (id: a)").unwrap().status, TaskStatus::Pending);
        assert_eq!(TaskLine::parse("[x] a (id: a)").unwrap().status, TaskStatus::Completed);
        assert_eq!(TaskLine::parse("[X] a (id: a)").unwrap().status, TaskStatus::Completed);
        assert_eq!(TaskLine::parse("[-] a (id: a)").unwrap().status, TaskStatus::InProgress);
        assert_eq!(TaskLine::parse("no box (id: a)").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn task_line_without_id_is_skipped() {
        assert!(TaskLine::parse("[ ] just a note").is_none());
        assert!(TaskLine::parse("[ ] (id: not valid!)").is_none());
        // the id must be trailing
        assert!(TaskLine::parse("[ ] (id: t1) trailing words").is_none());
    }

    #[test]
    fn task_line_dependencies_drop_empty_entries() {
        let line = TaskLine::parse("[ ] x (depends: a, , b ,) (id: c)").unwrap();
        assert_eq!(line.dependencies, vec!["a", "b"]);
    }

    #[test]
    fn task_line_dependencies_anywhere() {
        let line = TaskLine::parse("[ ] (depends: a) first then (depends: b) (id: c)").unwrap();
        assert_eq!(line.dependencies, vec!["a", "b"]);
        assert_eq!(line.content, "first then");
    }

    #[test]
    fn task_line_annotation_split_by_another_is_stripped() {
        let line = TaskLine::parse("[ ] (depe(depends: x)nds: y) (id: t1)").unwrap();
        assert_eq!(line.dependencies, vec!["x", "y"]);
        assert_eq!(line.content, "");
    }

    #[test]
    fn task_line_unclosed_annotation_stays_content() {
        let line = TaskLine::parse("[ ] (depends: q (depends: r) (id: t1)").unwrap();
        assert_eq!(line.dependencies, vec!["r"]);
        assert_eq!(line.content, "(depends: q");
    }

    #[test]
    fn task_line_repeated_dependency_kept_once() {
        let line = TaskLine::parse("[ ] y (depends: x, x) (depends: x) (id: y)").unwrap();
        assert_eq!(line.dependencies, vec!["x"]);
    }

    #[test]
    fn plain_content() {
        assert!(is_plain_content("Ship it (soon): maybe"));
        assert!(is_plain_content("(depends: q"));
        assert!(!is_plain_content("wait (depends: t1)"));
        assert!(!is_plain_content("two\nlines"));
    }

    #[test]
    fn id_format() {
        assert!(is_valid_id("task-1_a"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id("dot.ted"));
    }
}
