//! Canonical plan markdown output
//!
//! Writes a document back out in the exact dialect the parser reads, so a
//! serialize-then-parse trip preserves every id, status and dependency.

use plansync_model::{Document, Phase, Task};

/// Serializer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Text after `# Plan: `
    pub title: String,
    /// End the output with a newline
    pub trailing_newline: bool,
}

impl SerializeOptions {
    /// Options for a title, with a trailing newline
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            trailing_newline: true,
        }
    }

    /// Without trailing newline
    #[inline]
    #[must_use]
    pub fn without_trailing_newline(mut self) -> Self {
        self.trailing_newline = false;
        self
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::new(plansync_model::grammar::DEFAULT_TITLE)
    }
}

/// Render a document as plan markdown
#[must_use]
pub fn serialize(document: &Document, options: &SerializeOptions) -> String {
    let mut lines = vec![format!("# Plan: {}", single_line(&options.title)), String::new()];

    for (index, phase) in document.phases().iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(phase_heading(phase));
        lines.extend(phase.tasks.iter().map(task_line));
    }

    let mut out = lines.join("\n");
    if options.trailing_newline {
        out.push('\n');
    }
    out
}

/// `## <title>`
#[must_use]
pub fn phase_heading(phase: &Phase) -> String {
    format!("## {}", single_line(&phase.title))
}

/// `- [c] <content> (depends: a, b) (id: x)`
#[must_use]
pub fn task_line(task: &Task) -> String {
    let mut line = format!("- [{}]", task.status.checkbox());
    let content = single_line(&task.content);
    if !content.is_empty() {
        line.push(' ');
        line.push_str(&content);
    }
    if !task.dependencies.is_empty() {
        line.push_str(" (depends: ");
        line.push_str(&task.dependencies.join(", "));
        line.push(')');
    }
    line.push_str(" (id: ");
    line.push_str(&task.id);
    line.push(')');
    line
}

/// Join multi-line text so it stays on one markdown line
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
