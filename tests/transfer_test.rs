mod common;

use assert_matches::assert_matches;
use common::{assert_total_consistent, purchase, quantity_at, spawn_app};
use sea_orm::{EntityTrait, PaginatorTrait};
use stockledger_api::entities::stock_movement;
use stockledger_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn transfer_moves_stock_atomically() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let actor = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 10).await;

    let movement = app
        .ledger
        .transfer(
            tenant,
            product,
            None,
            "Main Store".into(),
            "Back Room".into(),
            4,
            None,
            None,
            actor,
        )
        .await
        .expect("transfer should succeed");

    // One TRANSFER row carrying both locations and the positive magnitude.
    assert_eq!(movement.kind, "TRANSFER");
    assert_eq!(movement.quantity_delta, 4);
    assert_eq!(movement.location_from.as_deref(), Some("Main Store"));
    assert_eq!(movement.location_to.as_deref(), Some("Back Room"));

    assert_eq!(quantity_at(&app, tenant, product, "Main Store").await, 6);
    assert_eq!(quantity_at(&app, tenant, product, "Back Room").await, 4);
    assert_eq!(
        app.ledger.total_stock(tenant, product, None).await.unwrap(),
        10
    );
    assert_total_consistent(&app, tenant, product).await;
}

#[tokio::test]
async fn transfer_with_insufficient_source_changes_nothing() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 3).await;

    let err = app
        .ledger
        .transfer(
            tenant,
            product,
            None,
            "Main Store".into(),
            "Back Room".into(),
            5,
            None,
            None,
            Uuid::new_v4(),
        )
        .await
        .expect_err("transfer beyond available must fail");

    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            requested: 5,
            available: 3,
            ..
        }
    );
    assert_eq!(quantity_at(&app, tenant, product, "Main Store").await, 3);
    assert_eq!(quantity_at(&app, tenant, product, "Back Room").await, 0);

    let count = stock_movement::Entity::find()
        .count(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(count, 1, "only the seeding purchase is recorded");
}

#[tokio::test]
async fn transfer_to_same_location_is_rejected() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    purchase(&app, tenant, product, "Main Store", 3).await;

    let err = app
        .ledger
        .transfer(
            tenant,
            product,
            None,
            "Main Store".into(),
            "Main Store".into(),
            1,
            None,
            None,
            Uuid::new_v4(),
        )
        .await
        .expect_err("same-location transfer must fail");
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn transfer_requires_positive_quantity() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();

    for quantity in [0, -2] {
        let err = app
            .ledger
            .transfer(
                tenant,
                product,
                None,
                "A".into(),
                "B".into(),
                quantity,
                None,
                None,
                Uuid::new_v4(),
            )
            .await
            .expect_err("non-positive transfer must fail");
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn opposite_transfers_conserve_total_stock() {
    let app = spawn_app().await;
    let tenant = Uuid::new_v4();
    let product = Uuid::new_v4();
    let actor = Uuid::new_v4();

    purchase(&app, tenant, product, "A", 5).await;
    purchase(&app, tenant, product, "B", 5).await;

    let a_to_b = app.ledger.transfer(
        tenant,
        product,
        None,
        "A".into(),
        "B".into(),
        3,
        None,
        None,
        actor,
    );
    let b_to_a = app.ledger.transfer(
        tenant,
        product,
        None,
        "B".into(),
        "A".into(),
        2,
        None,
        None,
        actor,
    );
    let (first, second) = tokio::join!(a_to_b, b_to_a);
    first.expect("A->B transfer should succeed");
    second.expect("B->A transfer should succeed");

    assert_eq!(quantity_at(&app, tenant, product, "A").await, 4);
    assert_eq!(quantity_at(&app, tenant, product, "B").await, 6);
    assert_eq!(
        app.ledger.total_stock(tenant, product, None).await.unwrap(),
        10
    );
    assert_total_consistent(&app, tenant, product).await;
}
