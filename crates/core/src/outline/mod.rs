#![forbid(unsafe_code)]

//! Turns the flat, level-ordered checklist rows of one (team, zone) into a
//! numbered, parent-aware outline.
//!
//! The input comes pre-sorted by (level, sort_key, point_id): every level-1
//! row first, then every level-2 row, and so on. The outline walks that
//! shape recursively. For a section, its descendants are *emitted* before
//! the section itself, but the section keeps the lowest display order
//! reserved at recursion entry, so the numbering still reads top-down:
//!
//! ```text
//! input  (level order):   1 "Safety"   1.1 "E-stop"   1.2 "Guards"   2 "Weight"
//! output (emission):      "1.1." (#2)  "1.2." (#3)    "1." (#1)      "2." (#4)
//! ```
//!
//! Display orders are unique and identify rows within one render; they are
//! not a sort key for re-querying the store.

use crate::checklist::ChecklistItem;
use crate::ids::PointId;

#[cfg(test)]
mod tests;

/// Hard cap on checklist nesting. Real checklists are two or three levels
/// deep; anything past this is treated as corrupt input rather than a
/// reason to recurse further.
pub const MAX_DEPTH: usize = 32;

/// One renderable row of the outline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineNode {
    pub item: ChecklistItem,
    /// 1-based, unique within one linearization. A section's order is
    /// lower than every descendant's even though the section is emitted
    /// after them.
    pub display_order: u32,
    /// Display orders of every transitive descendant, all assigned before
    /// the section's own node is emitted. Empty for leaf points.
    pub descendant_display_orders: Vec<u32>,
    /// Dotted section numbering, e.g. "2.1.3.".
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutlineError {
    /// Levels must form contiguous runs 1, 2, 3, … in input order.
    LevelOutOfSequence { point_id: i64, level: u32 },
    DepthExceeded { depth: usize },
    /// Items whose ancestor chain never reaches a level-1 row.
    OrphanedItems { point_ids: Vec<i64> },
}

impl std::fmt::Display for OutlineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LevelOutOfSequence { point_id, level } => {
                write!(f, "level out of sequence (point_id={point_id}, level={level})")
            }
            Self::DepthExceeded { depth } => {
                write!(f, "checklist nesting too deep (depth={depth}, max={MAX_DEPTH})")
            }
            Self::OrphanedItems { point_ids } => {
                write!(f, "orphaned checklist items (point_ids={point_ids:?})")
            }
        }
    }
}

impl std::error::Error for OutlineError {}

/// Linearize a level-ordered checklist into outline nodes.
///
/// Children are emitted before their section header; the caller places
/// rows by `display_order`. The multiset of point ids in the output always
/// equals the input's, or the call fails.
pub fn linearize(items: &[ChecklistItem]) -> Result<Vec<OutlineNode>, OutlineError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let levels = partition_levels(items)?;
    if levels.len() > MAX_DEPTH {
        return Err(OutlineError::DepthExceeded {
            depth: levels.len(),
        });
    }

    let mut out = Vec::with_capacity(items.len());
    emit_level(&levels, 0, 1, "", None, &mut out);

    if out.len() != items.len() {
        let emitted: std::collections::BTreeSet<i64> =
            out.iter().map(|node| node.item.point_id.get()).collect();
        let point_ids = items
            .iter()
            .map(|item| item.point_id.get())
            .filter(|id| !emitted.contains(id))
            .collect();
        return Err(OutlineError::OrphanedItems { point_ids });
    }

    Ok(out)
}

/// Split the flat input into one slice per level. Runs must start at
/// level 1 and ascend one level at a time.
fn partition_levels(items: &[ChecklistItem]) -> Result<Vec<&[ChecklistItem]>, OutlineError> {
    let mut runs = Vec::new();
    let mut current = items[0].level;
    if current != 1 {
        return Err(OutlineError::LevelOutOfSequence {
            point_id: items[0].point_id.get(),
            level: current,
        });
    }

    let mut start = 0;
    for (index, item) in items.iter().enumerate() {
        if item.level == current {
            continue;
        }
        if item.level != current + 1 {
            return Err(OutlineError::LevelOutOfSequence {
                point_id: item.point_id.get(),
                level: item.level,
            });
        }
        runs.push(&items[start..index]);
        current = item.level;
        start = index;
    }
    runs.push(&items[start..]);
    Ok(runs)
}

/// Emit every item of `levels[depth]` that belongs to `parent`, depth
/// first. Returns the next unused display order.
///
/// The current item reserves `next_order` before recursing, so its
/// descendants take the orders right after it; the item itself is pushed
/// once all of them are out.
fn emit_level(
    levels: &[&[ChecklistItem]],
    depth: usize,
    first_order: u32,
    prefix: &str,
    parent: Option<PointId>,
    out: &mut Vec<OutlineNode>,
) -> u32 {
    let mut sibling = 1u32;
    let mut next_order = first_order;

    for item in levels[depth] {
        if item.parent_section_id != parent {
            continue;
        }

        let label = format!("{prefix}{sibling}.");
        let order = next_order;
        next_order += 1;

        let mut descendants = Vec::new();
        if item.is_section && depth + 1 < levels.len() {
            let before = out.len();
            next_order = emit_level(
                levels,
                depth + 1,
                next_order,
                &label,
                Some(item.point_id),
                out,
            );
            descendants.extend(out[before..].iter().map(|node| node.display_order));
        }

        out.push(OutlineNode {
            item: item.clone(),
            display_order: order,
            descendant_display_orders: descendants,
            label,
        });
        sibling += 1;
    }

    next_order
}
