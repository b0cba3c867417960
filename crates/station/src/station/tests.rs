use super::*;
use hm_core::checklist::PENDING;
use hm_storage::{DefinePointRequest, DefineZoneRequest, ImportTeamRequest};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("hm_station_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn open_desk(dir: &PathBuf, name: &str) -> Station {
    let station_id = StationId::try_new(name).expect("station id");
    Station::open(dir, station_id).expect("open station")
}

/// Zone 1: section 10 ("Safety") with points 11 and 12, then loose point
/// 20. Two teams, Alpha (101) and Beta (102).
fn seed(station: &mut Station) {
    let store = station.store_mut();
    store
        .define_zone(DefineZoneRequest {
            zone_id: 1,
            name: "Mechanics".to_string(),
        })
        .expect("zone");

    let points = [
        (10, None, 1, true, 1, "Safety"),
        (11, Some(10), 2, false, 1, "Emergency stop reachable"),
        (12, Some(10), 2, false, 2, "Guards fitted"),
        (20, None, 1, false, 2, "Weight within limit"),
    ];
    for (point_id, parent, level, is_section, sort_key, description) in points {
        store
            .define_point(DefinePointRequest {
                point_id,
                zone_id: 1,
                parent_section_id: parent,
                level,
                is_section,
                sort_key,
                description: description.to_string(),
            })
            .expect("point");
    }

    for (team_id, number, name) in [(1, 101, "Alpha"), (2, 102, "Beta")] {
        store
            .import_team(ImportTeamRequest {
                team_id,
                number,
                name: name.to_string(),
                category: 1,
            })
            .expect("team");
    }
}

fn register_first_row(station: &mut Station) {
    match station
        .toggle_registration(RowPosition::new(1))
        .expect("toggle registration")
    {
        RegistrationOutcome::Updated { registered, .. } => assert!(registered),
        other => panic!("expected Updated, got {other:?}"),
    }
}

#[test]
fn unregistered_teams_are_refused_quietly() {
    let dir = temp_dir("unregistered_teams_are_refused_quietly");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);

    let info = desk.team_at(RowPosition::new(1)).expect("team at row 1");
    assert_eq!(info.name, "Alpha");
    assert_eq!(info.number, 101);

    match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::NotRegistered => {}
        other => panic!("expected NotRegistered, got {other:?}"),
    }
    assert!(!desk.editing());
}

#[test]
fn page_is_numbered_and_ordered_for_display() {
    let dir = temp_dir("page_is_numbered_and_ordered_for_display");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);

    let page = match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(page) => page,
        other => panic!("expected Opened, got {other:?}"),
    };

    assert_eq!(page.header, "(101) Alpha - Zone 1");
    assert_eq!(page.comment, "");

    let texts: Vec<&str> = page.rows.iter().map(|row| row.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "1.-Safety",
            "1.1.-Emergency stop reachable",
            "1.2.-Guards fitted",
            "2.-Weight within limit",
        ]
    );
    assert!(page.rows.iter().all(|row| row.visible));
    assert_eq!(page.rows[0].descendant_display_orders, vec![2, 3]);

    desk.discard().expect("discard");
}

#[test]
fn section_toggles_cascade_to_descendants() {
    let dir = temp_dir("section_toggles_cascade_to_descendants");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);
    match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(_) => {}
        other => panic!("expected Opened, got {other:?}"),
    }

    let leaf = desk.toggle(PointId::new(11)).expect("toggle leaf");
    assert_eq!(leaf.new_value, CLEARED);
    assert!(leaf.affected_display_orders.is_empty());

    let section = desk.toggle(PointId::new(10)).expect("toggle section");
    assert_eq!(section.new_value, CLEARED);
    assert_eq!(section.display_order, 1);
    assert_eq!(section.affected_display_orders, vec![2, 3]);

    desk.discard().expect("discard");
}

#[test]
fn save_persists_and_reports_the_row_to_refresh() {
    let dir = temp_dir("save_persists_and_reports_the_row_to_refresh");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);
    match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(_) => {}
        other => panic!("expected Opened, got {other:?}"),
    }

    assert_eq!(
        desk.active_team(),
        Some((TeamId::new(1), ZoneId::new(1)))
    );

    desk.toggle(PointId::new(11)).expect("toggle");
    desk.set_comment("cabling redone").expect("comment");
    let closed = desk.save().expect("save");
    assert_eq!(
        closed,
        ClosedChecklist {
            team_id: 1,
            zone_id: 1,
            saved: true
        }
    );
    assert!(!desk.editing());

    let items = desk
        .store()
        .query_items(TeamId::new(1), ZoneId::new(1))
        .expect("items");
    let value = items
        .iter()
        .find(|item| item.point_id == PointId::new(11))
        .and_then(|item| item.value);
    assert_eq!(value, Some(CLEARED));
    assert_eq!(
        desk.store()
            .get_comment(TeamId::new(1), ZoneId::new(1))
            .expect("comment"),
        "cabling redone"
    );
}

#[test]
fn discard_leaves_the_store_untouched() {
    let dir = temp_dir("discard_leaves_the_store_untouched");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);
    match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(_) => {}
        other => panic!("expected Opened, got {other:?}"),
    }

    desk.toggle(PointId::new(12)).expect("toggle");
    let closed = desk.discard().expect("discard");
    assert!(!closed.saved);

    let items = desk
        .store()
        .query_items(TeamId::new(1), ZoneId::new(1))
        .expect("items");
    assert!(items.iter().all(|item| item.value == Some(PENDING)));
}

#[test]
fn roster_configuration_is_frozen_while_editing() {
    let dir = temp_dir("roster_configuration_is_frozen_while_editing");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);
    match desk
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(_) => {}
        other => panic!("expected Opened, got {other:?}"),
    }

    assert!(!desk.set_filter(RosterFilter::Registered));
    assert!(!desk.set_sort(RosterSort::Name));
    assert!(!desk.set_categories(Some(BTreeSet::from([1]))));
    match desk
        .open_checklist(RowPosition::new(2), ZoneId::new(1))
        .expect("second open")
    {
        OpenOutcome::EditInProgress => {}
        other => panic!("expected EditInProgress, got {other:?}"),
    }
    match desk
        .toggle_registration(RowPosition::new(2))
        .expect("registration while editing")
    {
        RegistrationOutcome::EditInProgress => {}
        other => panic!("expected EditInProgress, got {other:?}"),
    }

    desk.discard().expect("discard");
    assert!(desk.set_filter(RosterFilter::Registered));
}

#[test]
fn conflicts_surface_as_retryable_messages() {
    let dir = temp_dir("conflicts_surface_as_retryable_messages");
    let mut desk1 = open_desk(&dir, "desk-1");
    let mut desk2 = open_desk(&dir, "desk-2");
    seed(&mut desk1);
    register_first_row(&mut desk1);

    match desk1
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::Opened(_) => {}
        other => panic!("expected Opened, got {other:?}"),
    }

    match desk2
        .open_checklist(RowPosition::new(1), ZoneId::new(1))
        .expect("second station open")
    {
        OpenOutcome::Locked(message) => {
            assert!(message.retryable);
            assert!(message.body.contains("desk-1"));
        }
        other => panic!("expected Locked, got {other:?}"),
    }

    match desk2
        .toggle_registration(RowPosition::new(1))
        .expect("registration against lock")
    {
        RegistrationOutcome::Locked(message) => assert!(message.retryable),
        other => panic!("expected Locked, got {other:?}"),
    }

    desk1.discard().expect("discard");
}

#[test]
fn vanished_rows_are_reported_stale() {
    let dir = temp_dir("vanished_rows_are_reported_stale");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);

    match desk
        .open_checklist(RowPosition::new(9), ZoneId::new(1))
        .expect("open")
    {
        OpenOutcome::StaleRow => {}
        other => panic!("expected StaleRow, got {other:?}"),
    }
    match desk
        .toggle_registration(RowPosition::new(9))
        .expect("toggle")
    {
        RegistrationOutcome::StaleRow => {}
        other => panic!("expected StaleRow, got {other:?}"),
    }
}

#[test]
fn refresh_roster_builds_a_validated_view() {
    let dir = temp_dir("refresh_roster_builds_a_validated_view");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);
    register_first_row(&mut desk);

    let view = desk.refresh_roster().expect("refresh");
    assert_eq!(view.zone_ids, vec![1]);
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[0].row_order, 1);
    assert_eq!(view.rows[0].name, "Alpha");
    assert_eq!(view.rows[0].state, "registered");
    assert_eq!(view.rows[0].zone_values, vec![Some(1)]);
    assert_eq!(view.rows[1].state, "not_registered");
    assert_eq!(view.rows[1].zone_values, vec![None]);
    assert_eq!(view.summary.total, 2);
    assert_eq!(
        view.summary_line,
        "Total: 2 - Unregistered: 1 - Registered: 1 - Homologated: 0"
    );
}

#[test]
fn no_active_checklist_is_a_usable_message() {
    let dir = temp_dir("no_active_checklist_is_a_usable_message");
    let mut desk = open_desk(&dir, "desk-1");
    seed(&mut desk);

    let err = desk.toggle(PointId::new(11)).unwrap_err();
    let message = err.user_message();
    assert_eq!(message.title, "No checklist open");
    assert!(!message.retryable);
}
