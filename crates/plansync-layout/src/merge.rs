//! Merge engine
//!
//! Reconciles a prior [`LayoutMap`] against the current node set: retained
//! ids keep their placement untouched, stale ids are pruned and new ids get
//! a default placement that does not overlap anything already placed.
//!
//! Default geometry:
//!
//! ```text
//! (50,50)  phase            280 x 50
//!          +150  task task task   280 x 80, columns 320 apart
//!          +250  task ...         rows 100 apart
//! ```

use crate::snapshot::{LayoutMap, NodeLayout};
use plansync_model::{NodeDescriptor, NodeKind};
use std::collections::{HashMap, HashSet};

/// Placement origin
pub const ORIGIN: (f64, f64) = (50.0, 50.0);
/// Default node width
pub const NODE_WIDTH: f64 = 280.0;
/// Default task height
pub const TASK_HEIGHT: f64 = 80.0;
/// Default phase height
pub const PHASE_HEIGHT: f64 = 50.0;
/// Horizontal distance between grid columns
pub const COLUMN_PITCH: f64 = 320.0;
/// Vertical distance between grid rows
pub const ROW_PITCH: f64 = 100.0;
/// Tasks per grid row
pub const GRID_COLUMNS: usize = 3;

/// Offset from a phase's top edge to its first task row
const TASK_OFFSET: f64 = PHASE_HEIGHT + ROW_PITCH;

/// Result of a merge
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeOutcome {
    /// Placement for every current node
    pub layout: LayoutMap,
    /// Ids that received a default placement, in document order
    pub added: Vec<String>,
    /// Ids dropped from the prior layout, sorted
    pub removed: Vec<String>,
}

impl MergeOutcome {
    /// Whether the merge changed nothing
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Merge `prior` against the nodes, given in document order
#[must_use]
pub fn merge(nodes: &[NodeDescriptor], prior: &LayoutMap) -> MergeOutcome {
    let current: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let removed: Vec<String> = prior
        .keys()
        .filter(|id| !current.contains(id.as_str()))
        .cloned()
        .collect();

    let mut layout: LayoutMap = prior
        .iter()
        .filter(|(id, _)| current.contains(id.as_str()))
        .map(|(id, rect)| (id.clone(), *rect))
        .collect();

    let mut added = Vec::new();
    let mut ordinals: HashMap<Option<&str>, usize> = HashMap::new();

    for node in nodes {
        let ordinal = match node.kind {
            NodeKind::Phase => 0,
            NodeKind::Task => {
                let counter = ordinals.entry(node.parent_phase_id.as_deref()).or_insert(0);
                let ordinal = *counter;
                *counter += 1;
                ordinal
            }
        };
        if layout.contains_key(&node.id) {
            continue;
        }
        let rect = match node.kind {
            NodeKind::Phase => place_phase(&layout),
            NodeKind::Task => place_task(&layout, node.parent_phase_id.as_deref(), ordinal),
        };
        layout.insert(node.id.clone(), rect);
        added.push(node.id.clone());
    }

    if !added.is_empty() || !removed.is_empty() {
        tracing::debug!(added = added.len(), removed = removed.len(), "merged layout");
    }
    MergeOutcome {
        layout,
        added,
        removed,
    }
}

/// Fresh placement for every node
#[must_use]
pub fn generate(nodes: &[NodeDescriptor]) -> LayoutMap {
    merge(nodes, &LayoutMap::new()).layout
}

/// Below the lowest placed node, or at the origin
fn place_phase(placed: &LayoutMap) -> NodeLayout {
    let y = placed
        .values()
        .map(NodeLayout::bottom)
        .reduce(f64::max)
        .map_or(ORIGIN.1, |bottom| bottom + ROW_PITCH);
    NodeLayout::new(ORIGIN.0, y, NODE_WIDTH, PHASE_HEIGHT)
}

/// First free grid slot at or after `ordinal` under the owning phase
fn place_task(placed: &LayoutMap, phase_id: Option<&str>, ordinal: usize) -> NodeLayout {
    let (base_x, base_y) = phase_id
        .and_then(|id| placed.get(id))
        .map_or(ORIGIN, |phase| (phase.x, phase.y + TASK_OFFSET));

    // finitely many rects, so some slot further down is always free
    let mut slot = ordinal;
    loop {
        let rect = grid_rect(base_x, base_y, slot);
        if !placed.values().any(|other| other.intersects(&rect)) {
            return rect;
        }
        slot += 1;
    }
}

#[allow(clippy::cast_precision_loss)]
fn grid_rect(base_x: f64, base_y: f64, slot: usize) -> NodeLayout {
    let column = (slot % GRID_COLUMNS) as f64;
    let row = (slot / GRID_COLUMNS) as f64;
    NodeLayout::new(
        base_x + column * COLUMN_PITCH,
        base_y + row * ROW_PITCH,
        NODE_WIDTH,
        TASK_HEIGHT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_test_utils::{arb_document, sample_document};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn nodes() -> Vec<NodeDescriptor> {
        sample_document().node_descriptors()
    }

    #[test]
    fn generate_places_phases_and_grid() {
        let layout = generate(&nodes());
        assert_eq!(layout["phase_1"], NodeLayout::new(50.0, 50.0, 280.0, 50.0));
        assert_eq!(layout["t1"], NodeLayout::new(50.0, 200.0, 280.0, 80.0));
        assert_eq!(layout["t2"], NodeLayout::new(370.0, 200.0, 280.0, 80.0));
        // below t1's bottom edge at 280
        assert_eq!(layout["phase_2"], NodeLayout::new(50.0, 380.0, 280.0, 50.0));
        assert_eq!(layout["t3"], NodeLayout::new(50.0, 530.0, 280.0, 80.0));
    }

    #[test]
    fn grid_wraps_after_three_columns() {
        let doc = plansync_test_utils::document_with_tasks(4);
        let layout = generate(&doc.node_descriptors());
        assert_eq!((layout["t3"].x, layout["t3"].y), (690.0, 200.0));
        assert_eq!((layout["t4"].x, layout["t4"].y), (50.0, 300.0));
    }

    #[test]
    fn retained_positions_untouched_and_stale_pruned() {
        let mut prior = generate(&nodes());
        let moved = NodeLayout::new(900.0, 900.0, 300.0, 90.0);
        prior.insert("t1".into(), moved);
        prior.insert("gone".into(), NodeLayout::new(0.0, 0.0, 1.0, 1.0));

        let outcome = merge(&nodes(), &prior);
        assert_eq!(outcome.layout["t1"], moved);
        assert_eq!(outcome.removed, vec!["gone"]);
        assert!(outcome.added.is_empty());
        assert!(!outcome.layout.contains_key("gone"));
    }

    #[test]
    fn new_task_skips_occupied_slot() {
        let mut prior = generate(&nodes());
        prior.remove("t2");
        // something else now sits in t2's default slot
        prior.insert("t1".into(), NodeLayout::new(370.0, 200.0, 280.0, 80.0));

        let outcome = merge(&nodes(), &prior);
        assert_eq!(outcome.added, vec!["t2"]);
        let t2 = outcome.layout["t2"];
        assert_eq!((t2.x, t2.y), (690.0, 200.0));
    }

    #[test]
    fn orphan_task_grids_from_origin() {
        let nodes = vec![NodeDescriptor::task("t1", "phase_9")];
        let layout = generate(&nodes);
        assert_eq!((layout["t1"].x, layout["t1"].y), ORIGIN);
    }

    #[test]
    fn empty_inputs() {
        let outcome = merge(&[], &LayoutMap::new());
        assert!(outcome.layout.is_empty());
        assert!(outcome.is_unchanged());
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(doc in arb_document()) {
            let nodes = doc.node_descriptors();
            let first = merge(&nodes, &LayoutMap::new());
            let second = merge(&nodes, &first.layout);
            prop_assert!(second.is_unchanged());
            prop_assert_eq!(second.layout, first.layout);
        }

        #[test]
        fn added_nodes_never_overlap(doc in arb_document()) {
            let layout = generate(&doc.node_descriptors());
            let rects: Vec<_> = layout.values().collect();
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    prop_assert!(!a.intersects(b));
                }
            }
        }

        #[test]
        fn every_node_placed_and_nothing_else(doc in arb_document()) {
            let nodes = doc.node_descriptors();
            let mut prior = LayoutMap::new();
            prior.insert("stale".into(), NodeLayout::new(0.0, 0.0, 10.0, 10.0));
            let outcome = merge(&nodes, &prior);
            prop_assert_eq!(outcome.layout.len(), nodes.len());
            prop_assert_eq!(outcome.added.len(), nodes.len());
            prop_assert_eq!(outcome.removed, vec!["stale".to_string()]);
        }
    }
}
