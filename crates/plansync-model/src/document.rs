//! Plan document model
//!
//! A [`Document`] owns its [`Phase`]s, which own their [`Task`]s. The
//! render-oriented [`Node`] and [`Edge`] lists are derived from the phases on
//! construction and are never authored on their own. The only way to get a
//! different node or edge list is to build a new document.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// `[ ]`
    #[default]
    Pending,
    /// `[-]`
    InProgress,
    /// `[x]` or `[X]`
    Completed,
}

impl TaskStatus {
    /// All statuses
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    /// Checkbox mark used when serializing
    #[inline]
    #[must_use]
    pub const fn checkbox(self) -> char {
        match self {
            Self::Pending => ' ',
            Self::InProgress => '-',
            Self::Completed => 'x',
        }
    }

    /// Status for a checkbox mark
    #[inline]
    #[must_use]
    pub const fn from_checkbox(mark: char) -> Option<Self> {
        match mark {
            ' ' => Some(Self::Pending),
            '-' => Some(Self::InProgress),
            'x' | 'X' => Some(Self::Completed),
            _ => None,
        }
    }

    /// Fold task statuses into a phase status
    ///
    /// All completed gives completed, any started or completed gives in
    /// progress, anything else (including no tasks) gives pending.
    #[must_use]
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut any = false;
        let mut all_completed = true;
        let mut any_started = false;
        for status in statuses {
            any = true;
            all_completed &= status == Self::Completed;
            any_started |= status != Self::Pending;
        }
        if any && all_completed {
            Self::Completed
        } else if any_started {
            Self::InProgress
        } else {
            Self::Pending
        }
    }

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaf unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Document-unique id, shared namespace with phases
    pub id: String,
    /// Clean task text
    pub content: String,
    /// Progress
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks or phases this task waits on
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Task {
    /// Create a pending task without dependencies
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// With dependencies
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// An ordered group of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// `phase_<N>`
    pub id: String,
    /// Heading text as stored, `Phase <N> — <name>`
    pub title: String,
    /// Owned tasks in document order
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Phase {
    /// Create an empty phase with canonical id and heading
    #[must_use]
    pub fn new(number: u32, name: &str) -> Self {
        let heading = crate::grammar::PhaseHeading {
            number,
            name: name.trim().to_string(),
        };
        Self {
            id: heading.id(),
            title: heading.render(),
            tasks: Vec::new(),
        }
    }

    /// With tasks
    #[inline]
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Status folded from the tasks
    #[inline]
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::aggregate(self.tasks.iter().map(|t| t.status))
    }

    /// Ordinal from the heading, if the heading still parses
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        crate::grammar::PhaseHeading::parse(&self.title).map(|h| h.number)
    }
}

/// Kind of a render node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A phase heading
    Phase,
    /// A task line
    Task,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Phase => "phase",
            Self::Task => "task",
        })
    }
}

/// Flattened, render-oriented view of a phase or task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phase_id: Option<String>,
}

/// A dependency relation: `to_id` depends on `from_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
}

impl Edge {
    /// Edge for `task` depending on `dependency`
    #[must_use]
    pub fn dependency(dependency: &str, task: &str) -> Self {
        Self {
            id: format!("{dependency}->{task}"),
            from_id: dependency.to_string(),
            to_id: task.to_string(),
        }
    }
}

/// Identity and placement-relevant shape of a node
///
/// What the layout side needs to know about a node: its id, its kind and,
/// for tasks, the owning phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub id: String,
    #[serde(alias = "nodeType")]
    pub kind: NodeKind,
    #[serde(default, alias = "phaseId", skip_serializing_if = "Option::is_none")]
    pub parent_phase_id: Option<String>,
}

impl NodeDescriptor {
    /// Descriptor for a phase
    #[must_use]
    pub fn phase(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Phase,
            parent_phase_id: None,
        }
    }

    /// Descriptor for a task in `phase_id`
    #[must_use]
    pub fn task(id: impl Into<String>, phase_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Task,
            parent_phase_id: Some(phase_id.into()),
        }
    }
}

impl From<&Node> for NodeDescriptor {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind,
            parent_phase_id: node.parent_phase_id.clone(),
        }
    }
}

/// A parsed plan
///
/// `nodes` and `edges` are recomputed from `phases` whenever a document is
/// built, so they can never disagree with the phases.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "DocumentRepr")]
pub struct Document {
    phases: Vec<Phase>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
struct DocumentRepr {
    #[serde(default)]
    phases: Vec<Phase>,
}

impl From<DocumentRepr> for Document {
    fn from(repr: DocumentRepr) -> Self {
        Self::new(repr.phases)
    }
}

impl Document {
    /// Build a document, deriving nodes, edges and phase statuses
    ///
    /// Repeated dependencies of a task are kept once, so edge ids are unique.
    #[must_use]
    pub fn new(mut phases: Vec<Phase>) -> Self {
        for task in phases.iter_mut().flat_map(|p| p.tasks.iter_mut()) {
            let mut seen = HashSet::with_capacity(task.dependencies.len());
            task.dependencies.retain(|dep| seen.insert(dep.clone()));
        }

        let mut nodes = Vec::with_capacity(phases.iter().map(|p| p.tasks.len() + 1).sum());
        let mut edges = Vec::new();

        for phase in &phases {
            nodes.push(Node {
                id: phase.id.clone(),
                kind: NodeKind::Phase,
                label: phase.title.clone(),
                status: phase.status(),
                parent_phase_id: None,
            });
            for task in &phase.tasks {
                nodes.push(Node {
                    id: task.id.clone(),
                    kind: NodeKind::Task,
                    label: task.content.clone(),
                    status: task.status,
                    parent_phase_id: Some(phase.id.clone()),
                });
                edges.extend(
                    task.dependencies
                        .iter()
                        .map(|dep| Edge::dependency(dep, &task.id)),
                );
            }
        }

        Self {
            phases,
            nodes,
            edges,
        }
    }

    /// Phases in document order
    #[inline]
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Derived nodes, each phase followed by its tasks
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Derived dependency edges
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Give up the phases, typically to build an edited document
    #[inline]
    #[must_use]
    pub fn into_phases(self) -> Vec<Phase> {
        self.phases
    }

    /// Look up a phase
    #[must_use]
    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Look up a task
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks().find(|t| t.id == id)
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether `id` names a phase or task
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// All tasks in document order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(|p| p.tasks.iter())
    }

    /// Number of tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }

    /// Descriptors for the layout side, in document order
    #[must_use]
    pub fn node_descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes.iter().map(NodeDescriptor::from).collect()
    }
}
