use crate::{
    db::DbPool,
    entities::{
        location_stock::{self, Entity as LocationStock},
        product_stock::{self, Entity as ProductStock},
        stock_movement::{self, Entity as StockMovement, MovementKind},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use sea_orm::sea_query::{Condition, Expr};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    static ref STOCK_MOVEMENTS: IntCounter = register_int_counter!(
        "stock_movements_total",
        "Total number of stock movements applied"
    )
    .expect("metric can be created");
    static ref STOCK_MOVEMENT_FAILURES: IntCounter = register_int_counter!(
        "stock_movement_failures_total",
        "Total number of rejected stock movements"
    )
    .expect("metric can be created");
    static ref STOCK_TRANSFERS: IntCounter = register_int_counter!(
        "stock_transfers_total",
        "Total number of completed stock transfers"
    )
    .expect("metric can be created");
}

/// Bounded retry for optimistic version conflicts. Validation failures are
/// never retried.
pub(crate) const MAX_TXN_ATTEMPTS: u32 = 5;

/// Opaque link back to the originating business event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReference {
    pub reference_type: String,
    pub reference_id: String,
}

impl MovementReference {
    pub fn new(reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
        }
    }
}

/// A movement intent submitted by a caller (sales, purchasing, an admin UI,
/// or the stock take finalizer). `quantity` is a positive magnitude for
/// `PURCHASE`/`SALE`/`RETURN`/`TRANSFER` and a signed delta for
/// `ADJUSTMENT`/`STOCK_TAKE_CORRECTION`.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub kind: MovementKind,
    pub quantity: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    pub reference: Option<MovementReference>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// Filters for reading the movement log.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    /// Matches either side of a movement.
    pub location: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Result of a legacy absolute "set". When the requested value already
/// matches the current quantity, no movement is recorded.
#[derive(Debug, Clone)]
pub struct SetQuantityOutcome {
    pub quantity: i64,
    pub movement: Option<stock_movement::Model>,
}

/// The ledger service is the only writer of `location_stock`. Every write
/// happens inside one transaction that also maintains the `product_stock`
/// aggregate and appends the immutable movement record.
#[derive(Clone)]
pub struct LedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    strict_locations: bool,
}

impl LedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, strict_locations: bool) -> Self {
        Self {
            db_pool,
            event_sender,
            strict_locations,
        }
    }

    /// Applies one movement: validates the kind-specific shape, mutates the
    /// touched `location_stock` rows and the product aggregate, and appends
    /// the movement record, all in one atomic unit. On any error nothing is
    /// mutated and no movement is appended.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, product_id = %cmd.product_id, kind = %cmd.kind))]
    pub async fn apply_movement(
        &self,
        cmd: NewMovement,
    ) -> Result<stock_movement::Model, ServiceError> {
        let effects = kind_effects(&cmd).map_err(|e| {
            STOCK_MOVEMENT_FAILURES.inc();
            e
        })?;

        let movement = self
            .run_movement_txn(&cmd, &effects)
            .await
            .map_err(|e| {
                STOCK_MOVEMENT_FAILURES.inc();
                e
            })?;

        STOCK_MOVEMENTS.inc();
        if cmd.kind == MovementKind::Transfer {
            STOCK_TRANSFERS.inc();
        }

        self.publish_movement_event(&movement, &cmd).await;

        info!(
            movement_id = %movement.id,
            quantity_delta = %movement.quantity_delta,
            "stock movement applied"
        );

        Ok(movement)
    }

    /// Transfer Coordinator: debit one location and credit another as a
    /// single unit of work, recording one `TRANSFER` movement carrying both
    /// locations. An observer never sees stock in flight.
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        location_from: String,
        location_to: String,
        quantity: i64,
        reference: Option<MovementReference>,
        notes: Option<String>,
        created_by: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        self.apply_movement(NewMovement {
            tenant_id,
            product_id,
            variant_id,
            kind: MovementKind::Transfer,
            quantity,
            location_from: Some(location_from),
            location_to: Some(location_to),
            reference,
            notes,
            created_by,
        })
        .await
    }

    /// Legacy absolute "set": overwrite a location's quantity by recording
    /// an `ADJUSTMENT` whose delta is `new_value - current`, so the change
    /// still flows through the ledger instead of silently bypassing it.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_quantity(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        location: String,
        new_quantity: i64,
        reference: Option<MovementReference>,
        notes: Option<String>,
        created_by: Uuid,
    ) -> Result<SetQuantityOutcome, ServiceError> {
        if new_quantity < 0 {
            STOCK_MOVEMENT_FAILURES.inc();
            return Err(ServiceError::ValidationError(
                "absolute quantity cannot be negative".into(),
            ));
        }

        // The delta is derived from the quantity read inside the transaction
        // so a concurrent write cannot turn the overwrite into a stale diff.
        let mut attempt = 0;
        let outcome = loop {
            let location = location.clone();
            let reference = reference.clone();
            let notes = notes.clone();
            let strict = self.strict_locations;

            let result = self
                .db_pool
                .transaction::<_, SetQuantityOutcome, ServiceError>(move |txn| {
                    Box::pin(async move {
                        let current =
                            find_stock_row(txn, tenant_id, product_id, variant_id, &location)
                                .await?
                                .map(|row| row.quantity)
                                .unwrap_or(0);
                        let delta = new_quantity - current;
                        if delta == 0 {
                            return Ok(SetQuantityOutcome {
                                quantity: current,
                                movement: None,
                            });
                        }

                        let (location_from, location_to) = if delta > 0 {
                            (None, Some(location))
                        } else {
                            (Some(location), None)
                        };
                        let cmd = NewMovement {
                            tenant_id,
                            product_id,
                            variant_id,
                            kind: MovementKind::Adjustment,
                            quantity: delta,
                            location_from,
                            location_to,
                            reference,
                            notes,
                            created_by,
                        };
                        let effects = kind_effects(&cmd)?;
                        if strict {
                            require_known_locations(txn, tenant_id, &effects).await?;
                        }
                        apply_effects(txn, tenant_id, product_id, variant_id, &effects).await?;
                        let movement = record_movement(txn, &cmd).await?;

                        Ok(SetQuantityOutcome {
                            quantity: new_quantity,
                            movement: Some(movement),
                        })
                    })
                })
                .await
                .map_err(unwrap_txn_error);

            match result {
                Err(ServiceError::ConcurrentModification(key))
                    if attempt + 1 < MAX_TXN_ATTEMPTS =>
                {
                    attempt += 1;
                    warn!(attempt, key = %key, "version conflict setting quantity; retrying");
                }
                Err(e) => {
                    STOCK_MOVEMENT_FAILURES.inc();
                    return Err(e);
                }
                Ok(outcome) => break outcome,
            }
        };

        if let Some(movement) = &outcome.movement {
            STOCK_MOVEMENTS.inc();
            let event = Event::MovementRecorded {
                movement_id: movement.id,
                tenant_id: movement.tenant_id,
                product_id: movement.product_id,
                variant_id: movement.variant_id,
                kind: MovementKind::Adjustment,
                quantity_delta: movement.quantity_delta,
            };
            if let Err(e) = self.event_sender.send(event).await {
                warn!(movement_id = %movement.id, "failed to publish movement event: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Current stock rows for a product, optionally narrowed to one variant
    /// and/or one location.
    pub async fn get_location_stock(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        location: Option<&str>,
    ) -> Result<Vec<location_stock::Model>, ServiceError> {
        let mut query = LocationStock::find()
            .filter(location_stock::Column::TenantId.eq(tenant_id))
            .filter(location_stock::Column::ProductId.eq(product_id));
        if let Some(variant) = variant_id {
            query = query.filter(location_stock::Column::VariantId.eq(variant));
        }
        if let Some(location) = location {
            query = query.filter(location_stock::Column::Location.eq(location));
        }

        query
            .order_by(location_stock::Column::Location, Order::Asc)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Maintained total across all locations. An absent variant means the
    /// whole product, summing the aggregates of the base key and every
    /// variant, the same scope `get_location_stock` returns without a
    /// variant filter. A missing aggregate row means no stock has ever
    /// been recorded.
    pub async fn total_stock(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<i64, ServiceError> {
        let mut query = ProductStock::find()
            .filter(product_stock::Column::TenantId.eq(tenant_id))
            .filter(product_stock::Column::ProductId.eq(product_id));
        if let Some(variant) = variant_id {
            query = query.filter(product_stock::Column::VariantId.eq(variant));
        }

        Ok(query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .iter()
            .map(|row| row.total_quantity)
            .sum())
    }

    /// Movement log, newest first, paginated. `page` is 1-based.
    pub async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let mut query = StockMovement::find()
            .filter(stock_movement::Column::TenantId.eq(tenant_id));

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(stock_movement::Column::Kind.eq(kind.as_str()));
        }
        if let Some(location) = filter.location {
            query = query.filter(
                Condition::any()
                    .add(stock_movement::Column::LocationFrom.eq(location.clone()))
                    .add(stock_movement::Column::LocationTo.eq(location)),
            );
        }
        if let Some(after) = filter.created_after {
            query = query.filter(stock_movement::Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            query = query.filter(stock_movement::Column::CreatedAt.lte(before));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .paginate(self.db_pool.as_ref(), limit.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    /// Runs the transactional core with bounded retry on version conflicts.
    async fn run_movement_txn(
        &self,
        cmd: &NewMovement,
        effects: &[(String, i64)],
    ) -> Result<stock_movement::Model, ServiceError> {
        let mut attempt = 0;
        loop {
            let cmd = cmd.clone();
            let effects = effects.to_vec();
            let strict = self.strict_locations;

            let result = self
                .db_pool
                .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                    Box::pin(async move {
                        if strict {
                            require_known_locations(txn, cmd.tenant_id, &effects).await?;
                        }
                        apply_effects(txn, cmd.tenant_id, cmd.product_id, cmd.variant_id, &effects)
                            .await?;
                        record_movement(txn, &cmd).await
                    })
                })
                .await
                .map_err(unwrap_txn_error);

            match result {
                Err(ServiceError::ConcurrentModification(key)) if attempt + 1 < MAX_TXN_ATTEMPTS => {
                    attempt += 1;
                    warn!(attempt, key = %key, "version conflict applying movement; retrying");
                }
                other => return other,
            }
        }
    }

    async fn publish_movement_event(&self, movement: &stock_movement::Model, cmd: &NewMovement) {
        let event = if cmd.kind == MovementKind::Transfer {
            Event::StockTransferred {
                movement_id: movement.id,
                tenant_id: movement.tenant_id,
                product_id: movement.product_id,
                location_from: movement.location_from.clone().unwrap_or_default(),
                location_to: movement.location_to.clone().unwrap_or_default(),
                quantity: movement.quantity_delta,
            }
        } else {
            Event::MovementRecorded {
                movement_id: movement.id,
                tenant_id: movement.tenant_id,
                product_id: movement.product_id,
                variant_id: movement.variant_id,
                kind: cmd.kind,
                quantity_delta: movement.quantity_delta,
            }
        };

        // The movement row is already committed; losing the notification is
        // logged but never reported as a ledger failure.
        if let Err(e) = self.event_sender.send(event).await {
            warn!(movement_id = %movement.id, "failed to publish movement event: {}", e);
        }
    }
}

pub(crate) fn unwrap_txn_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Resolves a movement intent into per-location signed deltas, validating
/// the kind-specific shape. Transfers return their two effects sorted by
/// location name so concurrent opposite transfers acquire rows in the same
/// order.
pub(crate) fn kind_effects(cmd: &NewMovement) -> Result<Vec<(String, i64)>, ServiceError> {
    match cmd.kind {
        MovementKind::Purchase | MovementKind::Return => {
            let to = require_location(cmd.location_to.as_deref(), "location_to", cmd.kind)?;
            require_positive(cmd.quantity, cmd.kind)?;
            Ok(vec![(to.to_string(), cmd.quantity)])
        }
        MovementKind::Sale => {
            let from = require_location(cmd.location_from.as_deref(), "location_from", cmd.kind)?;
            require_positive(cmd.quantity, cmd.kind)?;
            Ok(vec![(from.to_string(), -cmd.quantity)])
        }
        MovementKind::Adjustment | MovementKind::StockTakeCorrection => {
            if cmd.quantity == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "{} requires a nonzero quantity",
                    cmd.kind
                )));
            }
            let location = if cmd.quantity > 0 {
                require_location(cmd.location_to.as_deref(), "location_to", cmd.kind)?
            } else {
                require_location(cmd.location_from.as_deref(), "location_from", cmd.kind)?
            };
            Ok(vec![(location.to_string(), cmd.quantity)])
        }
        MovementKind::Transfer => {
            let from = require_location(cmd.location_from.as_deref(), "location_from", cmd.kind)?;
            let to = require_location(cmd.location_to.as_deref(), "location_to", cmd.kind)?;
            require_positive(cmd.quantity, cmd.kind)?;
            if from == to {
                return Err(ServiceError::InvalidOperation(
                    "cannot transfer stock to the same location".into(),
                ));
            }
            let mut effects = vec![(from.to_string(), -cmd.quantity), (to.to_string(), cmd.quantity)];
            effects.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(effects)
        }
    }
}

fn require_location<'a>(
    location: Option<&'a str>,
    field: &str,
    kind: MovementKind,
) -> Result<&'a str, ServiceError> {
    match location {
        Some(l) if !l.trim().is_empty() => Ok(l),
        _ => Err(ServiceError::ValidationError(format!(
            "{} requires {}",
            kind, field
        ))),
    }
}

fn require_positive(quantity: i64, kind: MovementKind) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "{} requires a positive quantity",
            kind
        )));
    }
    Ok(())
}

async fn find_stock_row<C: sea_orm::ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    location: &str,
) -> Result<Option<location_stock::Model>, ServiceError> {
    let mut query = LocationStock::find()
        .filter(location_stock::Column::TenantId.eq(tenant_id))
        .filter(location_stock::Column::ProductId.eq(product_id))
        .filter(location_stock::Column::Location.eq(location));
    query = match variant_id {
        Some(variant) => query.filter(location_stock::Column::VariantId.eq(variant)),
        None => query.filter(location_stock::Column::VariantId.is_null()),
    };

    query.one(conn).await.map_err(ServiceError::db_error)
}

/// Under strict configuration every touched location must already hold at
/// least one stock row for the tenant.
async fn require_known_locations(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    effects: &[(String, i64)],
) -> Result<(), ServiceError> {
    for (location, _) in effects {
        let known = LocationStock::find()
            .filter(location_stock::Column::TenantId.eq(tenant_id))
            .filter(location_stock::Column::Location.eq(location.as_str()))
            .count(txn)
            .await
            .map_err(ServiceError::db_error)?
            > 0;
        if !known {
            return Err(ServiceError::UnknownLocation(location.clone()));
        }
    }
    Ok(())
}

/// Applies signed per-location deltas to `location_stock` and the
/// `product_stock` aggregate. Every decrease is checked against the current
/// quantity first; a shortfall aborts the whole transaction with
/// `InsufficientStock` and no partial state. Updates are conditional on the
/// row version so a concurrent writer can never be silently overwritten.
pub(crate) async fn apply_effects(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    effects: &[(String, i64)],
) -> Result<(), ServiceError> {
    let now = Utc::now();

    for (location, delta) in effects {
        let existing = find_stock_row(txn, tenant_id, product_id, variant_id, location).await?;

        match existing {
            Some(row) => {
                // Stored quantities are never negative, so checked_add can
                // only fail on an absurdly large increase.
                let new_quantity = row.quantity.checked_add(*delta).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "quantity at {} overflows the ledger range",
                        location
                    ))
                })?;
                if new_quantity < 0 {
                    return Err(ServiceError::InsufficientStock {
                        location: location.clone(),
                        requested: delta.saturating_neg(),
                        available: row.quantity,
                    });
                }

                let updated = LocationStock::update_many()
                    .col_expr(location_stock::Column::Quantity, Expr::value(new_quantity))
                    .col_expr(location_stock::Column::Version, Expr::value(row.version + 1))
                    .col_expr(location_stock::Column::UpdatedAt, Expr::value(now))
                    .filter(location_stock::Column::Id.eq(row.id))
                    .filter(location_stock::Column::Version.eq(row.version))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                if updated.rows_affected == 0 {
                    return Err(ServiceError::ConcurrentModification(format!(
                        "location_stock {}/{}",
                        product_id, location
                    )));
                }
            }
            None => {
                if *delta < 0 {
                    return Err(ServiceError::InsufficientStock {
                        location: location.clone(),
                        requested: delta.saturating_neg(),
                        available: 0,
                    });
                }

                location_stock::ActiveModel {
                    tenant_id: Set(tenant_id),
                    product_id: Set(product_id),
                    variant_id: Set(variant_id),
                    location: Set(location.clone()),
                    quantity: Set(*delta),
                    reserved_quantity: Set(0),
                    version: Set(0),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
            }
        }
    }

    let net: i64 = effects.iter().map(|(_, delta)| delta).sum();
    if net != 0 {
        apply_aggregate_delta(txn, tenant_id, product_id, variant_id, net, now).await?;
    }

    Ok(())
}

async fn apply_aggregate_delta(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let mut query = ProductStock::find()
        .filter(product_stock::Column::TenantId.eq(tenant_id))
        .filter(product_stock::Column::ProductId.eq(product_id));
    query = match variant_id {
        Some(variant) => query.filter(product_stock::Column::VariantId.eq(variant)),
        None => query.filter(product_stock::Column::VariantId.is_null()),
    };

    match query.one(txn).await.map_err(ServiceError::db_error)? {
        Some(row) => {
            let new_total = row.total_quantity.checked_add(delta).ok_or_else(|| {
                ServiceError::ValidationError(
                    "product total quantity overflows the ledger range".into(),
                )
            })?;
            let updated = ProductStock::update_many()
                .col_expr(
                    product_stock::Column::TotalQuantity,
                    Expr::value(new_total),
                )
                .col_expr(product_stock::Column::Version, Expr::value(row.version + 1))
                .col_expr(product_stock::Column::UpdatedAt, Expr::value(now))
                .filter(product_stock::Column::Id.eq(row.id))
                .filter(product_stock::Column::Version.eq(row.version))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if updated.rows_affected == 0 {
                return Err(ServiceError::ConcurrentModification(format!(
                    "product_stock {}",
                    product_id
                )));
            }
        }
        None => {
            product_stock::ActiveModel {
                tenant_id: Set(tenant_id),
                product_id: Set(product_id),
                variant_id: Set(variant_id),
                total_quantity: Set(delta),
                version: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;
        }
    }

    Ok(())
}

/// Appends the immutable movement record. Transfers store the positive
/// magnitude with both locations; every other kind stores the signed delta
/// against its single location. Only the location a kind actually touches
/// is persisted, so the movement log's location filter never matches a
/// movement that left that location untouched.
pub(crate) async fn record_movement(
    txn: &DatabaseTransaction,
    cmd: &NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let (reference_type, reference_id) = match &cmd.reference {
        Some(r) => (Some(r.reference_type.clone()), Some(r.reference_id.clone())),
        None => (None, None),
    };
    let quantity_delta = match cmd.kind {
        MovementKind::Sale => -cmd.quantity,
        _ => cmd.quantity,
    };
    let (location_from, location_to) = match cmd.kind {
        MovementKind::Purchase | MovementKind::Return => (None, cmd.location_to.clone()),
        MovementKind::Sale => (cmd.location_from.clone(), None),
        MovementKind::Adjustment | MovementKind::StockTakeCorrection => {
            if cmd.quantity > 0 {
                (None, cmd.location_to.clone())
            } else {
                (cmd.location_from.clone(), None)
            }
        }
        MovementKind::Transfer => (cmd.location_from.clone(), cmd.location_to.clone()),
    };

    stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(cmd.tenant_id),
        product_id: Set(cmd.product_id),
        variant_id: Set(cmd.variant_id),
        kind: Set(cmd.kind.as_str().to_string()),
        quantity_delta: Set(quantity_delta),
        location_from: Set(location_from),
        location_to: Set(location_to),
        reference_type: Set(reference_type),
        reference_id: Set(reference_id),
        notes: Set(cmd.notes.clone()),
        created_by: Set(cmd.created_by),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)
}
