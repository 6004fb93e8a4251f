#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use stockledger_api::db::DbPool;
use stockledger_api::entities::stock_movement::MovementKind;
use stockledger_api::events::{Event, EventSender};
use stockledger_api::migrator::Migrator;
use stockledger_api::services::ledger::{LedgerService, NewMovement};
use stockledger_api::services::stock_take::StockTakeService;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub ledger: LedgerService,
    pub stock_takes: StockTakeService,
    // Held open so event publication inside the services never errors.
    _event_rx: mpsc::Receiver<Event>,
}

pub async fn spawn_app() -> TestApp {
    // One connection per test keeps each in-memory database private.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(opts)
        .await
        .expect("failed to connect to in-memory sqlite");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let db = Arc::new(db);
    let (tx, rx) = mpsc::channel(256);
    let events = Arc::new(EventSender::new(tx));

    TestApp {
        ledger: LedgerService::new(db.clone(), events.clone(), false),
        stock_takes: StockTakeService::new(db.clone(), events, false),
        db,
        _event_rx: rx,
    }
}

pub fn movement(
    tenant_id: Uuid,
    product_id: Uuid,
    kind: MovementKind,
    quantity: i64,
    location_from: Option<&str>,
    location_to: Option<&str>,
) -> NewMovement {
    NewMovement {
        tenant_id,
        product_id,
        variant_id: None,
        kind,
        quantity,
        location_from: location_from.map(str::to_string),
        location_to: location_to.map(str::to_string),
        reference: None,
        notes: None,
        created_by: Uuid::new_v4(),
    }
}

pub async fn purchase(
    app: &TestApp,
    tenant_id: Uuid,
    product_id: Uuid,
    location: &str,
    quantity: i64,
) {
    app.ledger
        .apply_movement(movement(
            tenant_id,
            product_id,
            MovementKind::Purchase,
            quantity,
            None,
            Some(location),
        ))
        .await
        .expect("purchase should succeed");
}

pub async fn quantity_at(app: &TestApp, tenant_id: Uuid, product_id: Uuid, location: &str) -> i64 {
    app.ledger
        .get_location_stock(tenant_id, product_id, None, Some(location))
        .await
        .expect("stock query should succeed")
        .into_iter()
        .map(|row| row.quantity)
        .sum()
}

/// The product-wide aggregate must always equal the sum over location rows.
pub async fn assert_total_consistent(app: &TestApp, tenant_id: Uuid, product_id: Uuid) {
    let rows = app
        .ledger
        .get_location_stock(tenant_id, product_id, None, None)
        .await
        .expect("stock query should succeed");
    let scan_sum: i64 = rows.iter().map(|row| row.quantity).sum();
    let total = app
        .ledger
        .total_stock(tenant_id, product_id, None)
        .await
        .expect("total query should succeed");
    assert_eq!(total, scan_sum, "aggregate diverged from location scan");
}
