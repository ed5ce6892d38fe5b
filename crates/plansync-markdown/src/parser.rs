//! Plan markdown parser
//!
//! Uses pulldown-cmark to walk the markdown once, collecting phase headings
//! and list items with their source offsets, then assembles the phases in
//! document order.

use crate::error::{ParseError, PlanIssue};
use crate::validator;
use once_cell::sync::Lazy;
use plansync_model::grammar::{self, PhaseHeading, TaskLine};
use plansync_model::{Document, NodeKind, Phase, Task};
use pulldown_cmark::{Event, HeadingLevel, Parser as MdParser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;

static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]|\d{1,9}[.)])[ \t]*").expect("valid regex"));

/// A successfully parsed plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPlan {
    /// Title from the `# Plan:` heading, or the default
    pub title: String,
    /// Phases and tasks
    pub document: Document,
}

/// Parse plan markdown
///
/// # Errors
///
/// Returns every duplicate id and unknown dependency found.
pub fn parse_plan(source: &str) -> Result<ParsedPlan, ParseError> {
    PlanParser::new().parse(source)
}

/// Plan markdown parser
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanParser;

/// Structural block seen during the walk
#[derive(Debug)]
enum Block {
    Phase { heading: PhaseHeading, text: String },
    Item { text: String },
}

/// List item whose end has not been seen yet
#[derive(Debug)]
struct OpenItem {
    start: usize,
    content_end: Option<usize>,
}

impl PlanParser {
    /// Create new plan parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse plan markdown
    ///
    /// # Errors
    ///
    /// Returns every duplicate id and unknown dependency found.
    pub fn parse(&self, source: &str) -> Result<ParsedPlan, ParseError> {
        let (title, blocks) = Self::walk(source);
        let (phases, mut issues) = Self::assemble(blocks);
        issues.extend(validator::unknown_dependencies(&phases));

        if !issues.is_empty() {
            tracing::debug!(issues = issues.len(), "plan failed to parse");
            return Err(ParseError::new(issues));
        }

        let document = Document::new(phases);
        tracing::debug!(
            phases = document.phases().len(),
            tasks = document.task_count(),
            "parsed plan"
        );
        Ok(ParsedPlan {
            title: title.unwrap_or_else(|| grammar::DEFAULT_TITLE.to_string()),
            document,
        })
    }

    /// Collect the title and the offset-ordered phase and item blocks
    fn walk(source: &str) -> (Option<String>, Vec<(usize, Block)>) {
        let mut title = None;
        let mut blocks = Vec::new();
        let mut heading: Option<(HeadingLevel, usize, String)> = None;
        let mut items: Vec<OpenItem> = Vec::new();

        for (event, range) in MdParser::new(source).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading = Some((level, range.start, String::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    let Some((level, start, text)) = heading.take() else {
                        continue;
                    };
                    match level {
                        HeadingLevel::H1 if title.is_none() => {
                            title = grammar::parse_title(&text);
                        }
                        HeadingLevel::H2 => {
                            if let Some(parsed) = PhaseHeading::parse(&text) {
                                blocks.push((
                                    start,
                                    Block::Phase {
                                        heading: parsed,
                                        text: text.trim().to_string(),
                                    },
                                ));
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, _, buf)) = heading.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::Start(Tag::Item) => items.push(OpenItem {
                    start: range.start,
                    content_end: None,
                }),
                Event::Start(Tag::List(_)) => {
                    if let Some(item) = items.last_mut() {
                        item.content_end.get_or_insert(range.start);
                    }
                }
                Event::End(TagEnd::Item) => {
                    if let Some(item) = items.pop() {
                        let end = item.content_end.unwrap_or(range.end);
                        let text = item_text(&source[item.start..end]);
                        blocks.push((item.start, Block::Item { text }));
                    }
                }
                _ => {}
            }
        }

        // nested items close before their parents
        blocks.sort_by_key(|(offset, _)| *offset);
        (title, blocks)
    }

    /// Build phases from blocks, reporting duplicate ids
    fn assemble(blocks: Vec<(usize, Block)>) -> (Vec<Phase>, Vec<PlanIssue>) {
        let mut phases: Vec<Phase> = Vec::new();
        let mut issues = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (_, block) in blocks {
            match block {
                Block::Phase { heading, text } => {
                    let id = heading.id();
                    if !seen.insert(id.clone()) {
                        issues.push(PlanIssue::duplicate(NodeKind::Phase, id.as_str()));
                    }
                    phases.push(Phase {
                        id,
                        title: text,
                        tasks: Vec::new(),
                    });
                }
                Block::Item { text } => {
                    // items before the first phase heading are notes
                    let Some(phase) = phases.last_mut() else {
                        continue;
                    };
                    let Some(line) = TaskLine::parse(&text) else {
                        continue;
                    };
                    if !seen.insert(line.id.clone()) {
                        issues.push(PlanIssue::duplicate(NodeKind::Task, line.id));
                        continue;
                    }
                    phase.tasks.push(
                        Task::new(line.id, line.content)
                            .with_status(line.status)
                            .with_dependencies(line.dependencies),
                    );
                }
            }
        }

        (phases, issues)
    }
}

/// Raw item source reduced to one line without the list marker
fn item_text(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    LIST_MARKER_RE.replace(&joined, "").into_owned()
}
