//! Expiry registration and sweep tests.

use super::*;
use crate::tasks::{spawn_expiry_sweeper, ManualTicker};

fn expiring(url: &str, offset: Duration) -> Paste {
    Paste {
        expire_on: Some(Utc::now() + offset),
        ..Paste::new(url, "short lived", "secret1")
    }
}

#[tokio::test]
async fn due_paste_is_deleted_by_exactly_one_sweep() {
    let (db, _temp) = setup_temp_db().await;
    db.pastes
        .create(expiring("old", Duration::minutes(-1)), false)
        .await
        .expect("create");
    let paste = db.pastes.get("old").await.expect("get").expect("exists");
    assert!(paste.expire_on.is_some());

    let report = db.pastes.sweep_expired(Utc::now()).await.expect("sweep");
    assert_eq!(report.deleted, vec!["old".to_string()]);
    assert!(db.pastes.get("old").await.expect("get").is_none());

    let report = db.pastes.sweep_expired(Utc::now()).await.expect("sweep");
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn future_paste_survives_until_due() {
    let (db, _temp) = setup_temp_db().await;
    db.pastes
        .create(expiring("later", Duration::hours(1)), false)
        .await
        .expect("create");

    for _ in 0..3 {
        let report = db.pastes.sweep_expired(Utc::now()).await.expect("sweep");
        assert!(report.deleted.is_empty());
    }
    assert!(db.pastes.get("later").await.expect("get").is_some());

    let report = db
        .pastes
        .sweep_expired(Utc::now() + Duration::hours(2))
        .await
        .expect("sweep");
    assert_eq!(report.deleted, vec!["later".to_string()]);
}

#[tokio::test]
async fn protected_due_paste_is_dropped_from_the_index() {
    let (db, _temp) = setup_temp_db().await;
    let locked = Paste {
        metadata: Metadata {
            locked: Some(true),
            ..Metadata::default()
        },
        ..expiring("locked", Duration::minutes(-5))
    };
    db.pastes.create(locked, false).await.expect("create");
    db.expiry
        .put("vanished", Utc::now() - Duration::minutes(5))
        .await
        .expect("put");

    let report = db.pastes.sweep_expired(Utc::now()).await.expect("sweep");
    assert!(report.deleted.is_empty());
    assert_eq!(report.discarded.len(), 2);

    let survivor = db.pastes.get("locked").await.expect("get").expect("exists");
    assert!(survivor.expire_on.is_none(), "record removed");
    assert!(db.expiry.due(Utc::now()).await.expect("due").is_empty());
}

#[tokio::test]
async fn delete_and_rename_keep_the_index_in_step() {
    let (db, _temp) = setup_temp_db().await;
    db.pastes
        .create(expiring("gone", Duration::hours(1)), false)
        .await
        .expect("create");
    db.pastes.delete("gone", "secret1").await.expect("delete");
    assert!(db.expiry.get("gone").await.expect("get").is_none());

    db.pastes
        .create(expiring("before", Duration::hours(1)), false)
        .await
        .expect("create");
    let expire_on = db.expiry.get("before").await.expect("get");
    let edit = PasteEdit {
        new_url: "after".to_string(),
        ..edit_of("before", "secret1", "still short lived")
    };
    db.pastes.edit(edit, false).await.expect("rename");
    assert!(db.expiry.get("before").await.expect("get").is_none());
    assert_eq!(db.expiry.get("after").await.expect("get"), expire_on);
}

#[tokio::test]
async fn import_without_expiry_clears_the_old_schedule() {
    let (db, _temp) = setup_temp_db().await;
    db.pastes
        .create(expiring("demo", Duration::seconds(30)), false)
        .await
        .expect("create");
    let exported = db.pastes.get("demo").await.expect("get").expect("exists");

    let report = db
        .pastes
        .import_all(vec![Paste {
            expire_on: None,
            ..exported
        }])
        .await
        .expect("import");
    assert_eq!(report.imported, vec!["demo".to_string()]);
    let imported = db.pastes.get("demo").await.expect("get").expect("exists");
    assert!(imported.expire_on.is_none());

    let report = db
        .pastes
        .sweep_expired(Utc::now() + Duration::hours(1))
        .await
        .expect("sweep");
    assert!(report.deleted.is_empty());
    assert!(db.pastes.get("demo").await.expect("get").is_some());
}

#[tokio::test]
async fn sweeper_task_runs_on_each_tick() {
    let (db, _temp) = setup_temp_db().await;
    db.pastes
        .create(expiring("old", Duration::minutes(-1)), false)
        .await
        .expect("create");

    let (handle, ticker) = ManualTicker::new();
    let mut sweeper = spawn_expiry_sweeper(db.pastes.clone(), ticker);
    assert!(db.pastes.get("old").await.expect("get").is_some());

    assert!(handle.tick());
    assert!(sweeper.wait_for_runs(1).await);
    assert!(db.pastes.get("old").await.expect("get").is_none());

    sweeper.stop().await;
}
