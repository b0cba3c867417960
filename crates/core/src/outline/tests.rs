use super::*;
use crate::checklist::{CLEARED, PENDING};

fn item(id: i64, level: u32, parent: Option<i64>, is_section: bool) -> ChecklistItem {
    ChecklistItem {
        point_id: PointId::new(id),
        parent_section_id: parent.map(PointId::new),
        level,
        is_section,
        value: if is_section { None } else { Some(PENDING) },
        description: format!("point {id}"),
    }
}

fn orders_by_id(outline: &[OutlineNode]) -> std::collections::BTreeMap<i64, u32> {
    outline
        .iter()
        .map(|node| (node.item.point_id.get(), node.display_order))
        .collect()
}

#[test]
fn children_are_emitted_before_their_section() {
    let mut section = item(1, 1, None, true);
    section.value = Some(PENDING);
    let mut items = vec![
        section,
        item(4, 1, None, false),
        item(2, 2, Some(1), false),
        item(3, 2, Some(1), false),
    ];
    items[1].value = Some(CLEARED);
    items[2].value = Some(CLEARED);
    // Level order, as the store returns it.
    items.sort_by_key(|i| i.level);

    let outline = linearize(&items).expect("linearize");

    let emitted: Vec<i64> = outline.iter().map(|n| n.item.point_id.get()).collect();
    assert_eq!(emitted, vec![2, 3, 1, 4]);

    let labels: Vec<&str> = outline.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["1.1.", "1.2.", "1.", "2."]);

    let orders = orders_by_id(&outline);
    assert_eq!(orders[&1], 1);
    assert_eq!(orders[&2], 2);
    assert_eq!(orders[&3], 3);
    assert_eq!(orders[&4], 4);

    let section = outline.iter().find(|n| n.item.point_id.get() == 1).unwrap();
    assert_eq!(section.descendant_display_orders, vec![2, 3]);
}

#[test]
fn nested_sections_collect_transitive_descendants() {
    let items = vec![
        item(1, 1, None, true),
        item(5, 1, None, false),
        item(2, 2, Some(1), true),
        item(3, 3, Some(2), false),
        item(4, 3, Some(2), false),
    ];

    let outline = linearize(&items).expect("linearize");
    let emitted: Vec<i64> = outline.iter().map(|n| n.item.point_id.get()).collect();
    assert_eq!(emitted, vec![3, 4, 2, 1, 5]);

    let orders = orders_by_id(&outline);
    assert_eq!(orders[&1], 1);
    assert_eq!(orders[&2], 2);
    assert_eq!(orders[&3], 3);
    assert_eq!(orders[&4], 4);
    assert_eq!(orders[&5], 5);

    let inner = outline.iter().find(|n| n.item.point_id.get() == 2).unwrap();
    assert_eq!(inner.descendant_display_orders, vec![3, 4]);
    assert_eq!(inner.label, "1.1.");

    let root = outline.iter().find(|n| n.item.point_id.get() == 1).unwrap();
    assert_eq!(root.descendant_display_orders, vec![3, 4, 2]);

    let leaf = outline.iter().find(|n| n.item.point_id.get() == 3).unwrap();
    assert_eq!(leaf.label, "1.1.1.");
    assert!(leaf.descendant_display_orders.is_empty());
}

#[test]
fn outline_is_complete_with_unique_labels_and_orders() {
    let items = vec![
        item(10, 1, None, true),
        item(20, 1, None, true),
        item(30, 1, None, false),
        item(11, 2, Some(10), false),
        item(12, 2, Some(10), true),
        item(21, 2, Some(20), false),
        item(13, 3, Some(12), false),
        item(14, 3, Some(12), false),
    ];

    let outline = linearize(&items).expect("linearize");
    assert_eq!(outline.len(), items.len());

    let mut labels: Vec<&str> = outline.iter().map(|n| n.label.as_str()).collect();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), items.len());

    let mut orders: Vec<u32> = outline.iter().map(|n| n.display_order).collect();
    orders.sort();
    assert_eq!(orders, (1..=items.len() as u32).collect::<Vec<_>>());

    // Every recorded descendant sits strictly below its section's level
    // and traces back to it through parent links.
    for node in &outline {
        for order in &node.descendant_display_orders {
            let descendant = outline
                .iter()
                .find(|n| n.display_order == *order)
                .expect("descendant exists");
            assert!(descendant.item.level > node.item.level);

            let mut cursor = descendant.item.parent_section_id;
            let mut reached = false;
            while let Some(parent) = cursor {
                if parent == node.item.point_id {
                    reached = true;
                    break;
                }
                cursor = outline
                    .iter()
                    .find(|n| n.item.point_id == parent)
                    .and_then(|n| n.item.parent_section_id);
            }
            assert!(reached, "descendant does not trace back to its section");
        }
    }
}

#[test]
fn empty_input_yields_empty_outline() {
    assert_eq!(linearize(&[]).expect("linearize"), Vec::new());
}

#[test]
fn orphaned_items_are_reported() {
    let items = vec![
        item(1, 1, None, true),
        item(2, 2, Some(99), false),
        item(3, 2, Some(1), false),
    ];

    assert_eq!(
        linearize(&items).unwrap_err(),
        OutlineError::OrphanedItems { point_ids: vec![2] }
    );
}

#[test]
fn level_runs_must_start_at_one_and_ascend_by_one() {
    let items = vec![item(1, 2, None, false)];
    assert_eq!(
        linearize(&items).unwrap_err(),
        OutlineError::LevelOutOfSequence {
            point_id: 1,
            level: 2
        }
    );

    let items = vec![item(1, 1, None, true), item(2, 3, Some(1), false)];
    assert_eq!(
        linearize(&items).unwrap_err(),
        OutlineError::LevelOutOfSequence {
            point_id: 2,
            level: 3
        }
    );
}

#[test]
fn pathological_nesting_depth_is_rejected() {
    let mut items = Vec::new();
    for level in 1..=(MAX_DEPTH as u32 + 1) {
        let id = i64::from(level);
        let parent = if level == 1 { None } else { Some(id - 1) };
        items.push(item(id, level, parent, true));
    }

    assert_eq!(
        linearize(&items).unwrap_err(),
        OutlineError::DepthExceeded {
            depth: MAX_DEPTH + 1
        }
    );
}
