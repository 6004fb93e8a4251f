mod common;

use assert_matches::assert_matches;
use common::{assert_total_consistent, movement, purchase, quantity_at, spawn_app};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use stockledger_api::entities::stock_movement::{self, MovementKind};
use stockledger_api::entities::stock_take_session::StockTakeStatus;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::stock_take::CountEntry;
use uuid::Uuid;

fn count(product_id: Uuid, counted_quantity: i64) -> CountEntry {
    CountEntry {
        product_id,
        variant_id: None,
        counted_quantity,
        notes: None,
    }
}

#[tokio::test]
async fn open_snapshots_only_positive_rows_at_the_location() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let on_shelf = Uuid::new_v4();
    let sold_out = Uuid::new_v4();
    let elsewhere = Uuid::new_v4();

    purchase(&app, tenant, on_shelf, "Main Store", 10).await;
    // A row that exists but has been drained back to zero.
    purchase(&app, tenant, sold_out, "Main Store", 2).await;
    app.ledger
        .apply_movement(movement(
            tenant,
            sold_out,
            MovementKind::Sale,
            2,
            Some("Main Store"),
            None,
        ))
        .await
        .unwrap();
    purchase(&app, tenant, elsewhere, "Back Room", 5).await;

    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, actor)
        .await
        .expect("open should succeed");

    assert_eq!(detail.session.status(), Some(StockTakeStatus::InProgress));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].product_id, on_shelf);
    assert_eq!(detail.items[0].expected_quantity, 10);
    assert!(!detail.items[0].counted);
}

#[tokio::test]
async fn snapshot_is_immune_to_later_movements() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();

    app.ledger
        .apply_movement(movement(
            tenant,
            product,
            MovementKind::Sale,
            4,
            Some("Main Store"),
            None,
        ))
        .await
        .unwrap();

    let detail = app
        .stock_takes
        .get(tenant, detail.session.id)
        .await
        .unwrap();
    assert_eq!(detail.items[0].expected_quantity, 10);
}

#[tokio::test]
async fn counts_are_last_write_wins_and_idempotent() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();
    let session_id = detail.session.id;

    app.stock_takes
        .record_counts(tenant, session_id, vec![count(product, 7)])
        .await
        .expect("first count should succeed");
    let items = app
        .stock_takes
        .record_counts(tenant, session_id, vec![count(product, 5)])
        .await
        .expect("recount should succeed");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].counted_quantity, 5);
    assert!(items[0].counted);

    // Replaying the same batch changes nothing.
    let items = app
        .stock_takes
        .record_counts(tenant, session_id, vec![count(product, 5)])
        .await
        .unwrap();
    assert_eq!(items[0].counted_quantity, 5);
}

#[tokio::test]
async fn counting_an_unknown_item_fails_the_whole_batch() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();

    let err = app
        .stock_takes
        .record_counts(
            tenant,
            detail.session.id,
            vec![count(product, 9), count(stranger, 1)],
        )
        .await
        .expect_err("unknown item must fail");
    assert_matches!(err, ServiceError::UnknownItem(_));

    // The known line from the failed batch was rolled back too.
    let detail = app
        .stock_takes
        .get(tenant, detail.session.id)
        .await
        .unwrap();
    assert!(!detail.items[0].counted);
    assert_eq!(detail.items[0].counted_quantity, 0);
}

#[tokio::test]
async fn negative_counts_are_rejected() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();

    let err = app
        .stock_takes
        .record_counts(tenant, detail.session.id, vec![count(product, -1)])
        .await
        .expect_err("negative count must fail");
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn finalize_writes_one_correction_per_nonzero_variance() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let short = Uuid::new_v4();
    let exact = Uuid::new_v4();
    let over = Uuid::new_v4();

    purchase(&app, tenant, short, "Main Store", 10).await;
    purchase(&app, tenant, exact, "Main Store", 4).await;
    purchase(&app, tenant, over, "Main Store", 2).await;

    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, actor)
        .await
        .unwrap();
    let session_id = detail.session.id;

    app.stock_takes
        .record_counts(
            tenant,
            session_id,
            vec![count(short, 7), count(exact, 4), count(over, 3)],
        )
        .await
        .unwrap();

    let outcome = app
        .stock_takes
        .finalize(tenant, session_id, actor)
        .await
        .expect("finalize should succeed");

    assert_eq!(outcome.session.status(), Some(StockTakeStatus::Completed));
    assert!(outcome.session.completed_at.is_some());
    assert_eq!(outcome.corrections.len(), 2, "exact count yields no correction");

    for correction in &outcome.corrections {
        assert_eq!(correction.kind, "STOCK_TAKE_CORRECTION");
        assert_eq!(correction.reference_type.as_deref(), Some("stock_take"));
        assert_eq!(
            correction.reference_id.as_deref(),
            Some(session_id.to_string().as_str())
        );
    }

    assert_eq!(quantity_at(&app, tenant, short, "Main Store").await, 7);
    assert_eq!(quantity_at(&app, tenant, exact, "Main Store").await, 4);
    assert_eq!(quantity_at(&app, tenant, over, "Main Store").await, 3);
    for product in [short, exact, over] {
        assert_total_consistent(&app, tenant, product).await;
    }
}

#[tokio::test]
async fn uncounted_items_produce_no_correction() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let actor = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, actor)
        .await
        .unwrap();

    let outcome = app
        .stock_takes
        .finalize(tenant, detail.session.id, actor)
        .await
        .expect("finalize with no counts should succeed");

    assert!(outcome.corrections.is_empty());
    assert_eq!(quantity_at(&app, tenant, product, "Main Store").await, 10);
}

#[tokio::test]
async fn finalize_conflicts_when_stock_raced_below_the_correction() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let actor = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 5).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, actor)
        .await
        .unwrap();
    let session_id = detail.session.id;

    // Counted none on the shelf; variance is -5 against the snapshot.
    app.stock_takes
        .record_counts(tenant, session_id, vec![count(product, 0)])
        .await
        .unwrap();

    // Stock moves after the count: 3 sold, only 2 remain.
    app.ledger
        .apply_movement(movement(
            tenant,
            product,
            MovementKind::Sale,
            3,
            Some("Main Store"),
            None,
        ))
        .await
        .unwrap();

    let err = app
        .stock_takes
        .finalize(tenant, session_id, actor)
        .await
        .expect_err("finalize must conflict");
    assert_matches!(
        err,
        ServiceError::ReconciliationConflict {
            variance: -5,
            available: 2,
            ..
        }
    );

    // Nothing was applied and the session is still open for a recount.
    let detail = app.stock_takes.get(tenant, session_id).await.unwrap();
    assert_eq!(detail.session.status(), Some(StockTakeStatus::InProgress));
    assert_eq!(quantity_at(&app, tenant, product, "Main Store").await, 2);
    let corrections = stock_movement::Entity::find()
        .filter(stock_movement::Column::Kind.eq("STOCK_TAKE_CORRECTION"))
        .count(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(corrections, 0);
}

#[tokio::test]
async fn closed_sessions_reject_further_operations() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let actor = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 5).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, actor)
        .await
        .unwrap();
    let session_id = detail.session.id;

    app.stock_takes
        .finalize(tenant, session_id, actor)
        .await
        .unwrap();

    let err = app
        .stock_takes
        .record_counts(tenant, session_id, vec![count(product, 1)])
        .await
        .expect_err("counting a completed session must fail");
    assert_matches!(err, ServiceError::InvalidState(_));

    let err = app
        .stock_takes
        .finalize(tenant, session_id, actor)
        .await
        .expect_err("double finalize must fail");
    assert_matches!(err, ServiceError::InvalidState(_));

    let err = app
        .stock_takes
        .cancel(tenant, session_id)
        .await
        .expect_err("cancelling a completed session must fail");
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn cancel_discards_counts_without_movements() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 5).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();
    let session_id = detail.session.id;

    app.stock_takes
        .record_counts(tenant, session_id, vec![count(product, 0)])
        .await
        .unwrap();

    let session = app
        .stock_takes
        .cancel(tenant, session_id)
        .await
        .expect("cancel should succeed");
    assert_eq!(session.status(), Some(StockTakeStatus::Cancelled));

    assert_eq!(quantity_at(&app, tenant, product, "Main Store").await, 5);
    let count = stock_movement::Entity::find()
        .count(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(count, 1, "only the seeding purchase is recorded");
}

#[tokio::test]
async fn sessions_are_scoped_to_their_tenant() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 5).await;
    let detail = app
        .stock_takes
        .open(tenant, "Main Store".into(), None, Uuid::new_v4())
        .await
        .unwrap();

    let err = app
        .stock_takes
        .get(intruder, detail.session.id)
        .await
        .expect_err("foreign tenant must not see the session");
    assert_matches!(err, ServiceError::NotFound(_));

    let err = app
        .stock_takes
        .finalize(intruder, detail.session.id, Uuid::new_v4())
        .await
        .expect_err("foreign tenant must not finalize");
    assert_matches!(err, ServiceError::NotFound(_));
}
