use std::collections::BTreeSet;

use chrono::Utc;
use daybook_core::app::{ImportOutcome, Planner};
use daybook_core::confirm::Fixed;
use daybook_core::datastore::DataStore;
use daybook_core::recurrence::{Recurrence, RecurrenceRequest};
use daybook_core::task::Status;
use tempfile::tempdir;

#[test]
fn planner_session_survives_datastore_and_export_round_trip() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let mut planner = Planner::new("2024-01-01");
    let weekly = RecurrenceRequest {
        recurrence: Recurrence::Weekly {
            days: BTreeSet::from([0]),
        },
        until: "2024-01-14".to_string(),
    };
    let ids = planner.add_task("weekly review", &weekly);
    assert_eq!(ids.len(), 2);

    let every_other = RecurrenceRequest {
        recurrence: Recurrence::EveryN { step: 2 },
        until: "2024-01-07".to_string(),
    };
    planner.add_task("run", &every_other);
    planner.update_status(ids[0], Status::Ongoing);

    store
        .save_session(&planner.to_session())
        .expect("save session");
    let reopened = DataStore::open(temp.path()).expect("reopen datastore");
    let session = reopened
        .load_session()
        .expect("load session")
        .expect("session saved");
    let mut restored = Planner::from_session(session, "2024-02-01");

    assert_eq!(restored.history(), planner.history());
    assert_eq!(restored.selected_date(), "2024-01-01");
    assert_eq!(
        restored.history().marked_dates().len(),
        5,
        "Jan 1, 3, 5, 7 and 8 carry tasks"
    );
    assert_eq!(restored.counts().ongoing, 1);
    assert_eq!(restored.counts().todo, 1);

    assert!(restored.undo());
    assert_eq!(restored.counts().ongoing, 0);
    assert!(restored.redo());
    assert_eq!(restored.counts().ongoing, 1);

    let exported = restored.export_text(Utc::now()).expect("export");
    let mut fresh = Planner::new("2024-02-01");
    let outcome = fresh
        .import_text(&exported, "2024-02-01", &Fixed(false))
        .expect("import into empty planner");
    assert!(matches!(outcome, ImportOutcome::Loaded { tasks: 6, .. }));
    assert_eq!(fresh.history(), restored.history());
    assert_eq!(fresh.selected_date(), restored.selected_date());
    assert!(!fresh.can_undo());
}
