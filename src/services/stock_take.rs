use crate::{
    db::DbPool,
    entities::{
        location_stock::{self, Entity as LocationStock},
        stock_movement::{self, MovementKind},
        stock_take_item::{self, Entity as StockTakeItem},
        stock_take_session::{self, Entity as StockTakeSession, StockTakeStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{
        self, MovementReference, NewMovement, MAX_TXN_ATTEMPTS,
    },
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    static ref STOCK_TAKES_OPENED: IntCounter = register_int_counter!(
        "stock_takes_opened_total",
        "Total number of stock take sessions opened"
    )
    .expect("metric can be created");
    static ref STOCK_TAKES_COMPLETED: IntCounter = register_int_counter!(
        "stock_takes_completed_total",
        "Total number of stock take sessions finalized"
    )
    .expect("metric can be created");
    static ref STOCK_TAKE_FAILURES: IntCounter = register_int_counter!(
        "stock_take_failures_total",
        "Total number of failed stock take operations"
    )
    .expect("metric can be created");
}

/// One counted line submitted by a counter. Submitting the same
/// (product, variant) twice overwrites the earlier count.
#[derive(Debug, Clone)]
pub struct CountEntry {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub counted_quantity: i64,
    pub notes: Option<String>,
}

/// A session together with its count sheet.
#[derive(Debug, Clone)]
pub struct StockTakeDetail {
    pub session: stock_take_session::Model,
    pub items: Vec<stock_take_item::Model>,
}

/// Result of finalizing a session: the closed session and the correction
/// movements it produced, one per nonzero variance.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub session: stock_take_session::Model,
    pub corrections: Vec<stock_movement::Model>,
}

/// Manages the stock take lifecycle: open a snapshot of a location, collect
/// counts against it, and finalize by writing one `STOCK_TAKE_CORRECTION`
/// movement per discrepancy through the same transactional core the ledger
/// uses.
pub struct StockTakeService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    strict_locations: bool,
}

impl StockTakeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, strict_locations: bool) -> Self {
        Self {
            db_pool,
            event_sender,
            strict_locations,
        }
    }

    /// Opens a session for a location. The count sheet is a snapshot of every
    /// stock row with a positive quantity at that location; movements applied
    /// after this point do not change the expected quantities.
    #[instrument(skip(self, notes))]
    pub async fn open(
        &self,
        tenant_id: Uuid,
        location: String,
        notes: Option<String>,
        created_by: Uuid,
    ) -> Result<StockTakeDetail, ServiceError> {
        if location.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "location must not be empty".into(),
            ));
        }

        let strict = self.strict_locations;
        let detail = self
            .db_pool
            .transaction::<_, StockTakeDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let rows = LocationStock::find()
                        .filter(location_stock::Column::TenantId.eq(tenant_id))
                        .filter(location_stock::Column::Location.eq(location.as_str()))
                        .filter(location_stock::Column::Quantity.gt(0))
                        .order_by_asc(location_stock::Column::ProductId)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    if strict && rows.is_empty() {
                        let known = LocationStock::find()
                            .filter(location_stock::Column::TenantId.eq(tenant_id))
                            .filter(location_stock::Column::Location.eq(location.as_str()))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            > 0;
                        if !known {
                            return Err(ServiceError::UnknownLocation(location));
                        }
                    }

                    let now = Utc::now();
                    let session = stock_take_session::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        location: Set(location),
                        status: Set(StockTakeStatus::InProgress.as_str().to_string()),
                        notes: Set(notes),
                        created_by: Set(created_by),
                        created_at: Set(now),
                        completed_at: Set(None),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut items = Vec::with_capacity(rows.len());
                    for row in rows {
                        let item = stock_take_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            session_id: Set(session.id),
                            product_id: Set(row.product_id),
                            variant_id: Set(row.variant_id),
                            expected_quantity: Set(row.quantity),
                            counted_quantity: Set(0),
                            counted: Set(false),
                            notes: Set(None),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                        items.push(item);
                    }

                    Ok(StockTakeDetail { session, items })
                })
            })
            .await
            .map_err(ledger::unwrap_txn_error)
            .map_err(|e| {
                STOCK_TAKE_FAILURES.inc();
                e
            })?;

        STOCK_TAKES_OPENED.inc();
        info!(
            session_id = %detail.session.id,
            location = %detail.session.location,
            items = detail.items.len(),
            "stock take opened"
        );

        let event = Event::StockTakeOpened {
            session_id: detail.session.id,
            tenant_id,
            location: detail.session.location.clone(),
            item_count: detail.items.len(),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(session_id = %detail.session.id, "failed to publish stock take event: {}", e);
        }

        Ok(detail)
    }

    pub async fn get(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<StockTakeDetail, ServiceError> {
        let session = find_session(self.db_pool.as_ref(), tenant_id, session_id).await?;
        let items = StockTakeItem::find()
            .filter(stock_take_item::Column::SessionId.eq(session_id))
            .order_by_asc(stock_take_item::Column::ProductId)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(StockTakeDetail { session, items })
    }

    /// Records counted quantities against an open session. Counts are
    /// last-write-wins per (product, variant); resubmitting a batch is
    /// idempotent. A count for an item outside the session snapshot is
    /// rejected with `UnknownItem` and fails the whole batch.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn record_counts(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        entries: Vec<CountEntry>,
    ) -> Result<Vec<stock_take_item::Model>, ServiceError> {
        if entries.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one count entry is required".into(),
            ));
        }
        for entry in &entries {
            if entry.counted_quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "counted quantity cannot be negative".into(),
                ));
            }
        }

        let updated = self
            .db_pool
            .transaction::<_, Vec<stock_take_item::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let session = find_session(txn, tenant_id, session_id).await?;
                    require_in_progress(&session)?;

                    let mut updated = Vec::with_capacity(entries.len());
                    for entry in entries {
                        let item = find_item(txn, session_id, entry.product_id, entry.variant_id)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::UnknownItem(format!(
                                    "product {} is not part of this stock take",
                                    entry.product_id
                                ))
                            })?;

                        let mut active: stock_take_item::ActiveModel = item.into();
                        active.counted_quantity = Set(entry.counted_quantity);
                        active.counted = Set(true);
                        if entry.notes.is_some() {
                            active.notes = Set(entry.notes);
                        }
                        let item = active.update(txn).await.map_err(ServiceError::db_error)?;
                        updated.push(item);
                    }

                    Ok(updated)
                })
            })
            .await
            .map_err(ledger::unwrap_txn_error)
            .map_err(|e| {
                STOCK_TAKE_FAILURES.inc();
                e
            })?;

        Ok(updated)
    }

    /// Closes the session and reconciles the ledger: one
    /// `STOCK_TAKE_CORRECTION` movement per counted item whose variance is
    /// nonzero, all inside a single transaction. If stock moved since the
    /// snapshot and a correction would drive a quantity negative, the whole
    /// finalize rolls back with `ReconciliationConflict` and the session
    /// stays open. Items never counted produce no correction.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        created_by: Uuid,
    ) -> Result<FinalizeOutcome, ServiceError> {
        let mut attempt = 0;
        let outcome = loop {
            let result = self
                .db_pool
                .transaction::<_, FinalizeOutcome, ServiceError>(move |txn| {
                    Box::pin(async move {
                        let session = find_session(txn, tenant_id, session_id).await?;
                        require_in_progress(&session)?;

                        let items = StockTakeItem::find()
                            .filter(stock_take_item::Column::SessionId.eq(session_id))
                            .order_by_asc(stock_take_item::Column::ProductId)
                            .all(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        let mut corrections = Vec::new();
                        for item in items.iter().filter(|i| i.counted && i.variance() != 0) {
                            let movement =
                                apply_correction(txn, &session, item, created_by).await?;
                            corrections.push(movement);
                        }

                        let now = Utc::now();
                        let closed = StockTakeSession::update_many()
                            .col_expr(
                                stock_take_session::Column::Status,
                                Expr::value(StockTakeStatus::Completed.as_str()),
                            )
                            .col_expr(
                                stock_take_session::Column::CompletedAt,
                                Expr::value(Some(now)),
                            )
                            .filter(stock_take_session::Column::Id.eq(session_id))
                            .filter(
                                stock_take_session::Column::Status
                                    .eq(StockTakeStatus::InProgress.as_str()),
                            )
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if closed.rows_affected == 0 {
                            return Err(ServiceError::InvalidState(
                                "stock take session is no longer in progress".into(),
                            ));
                        }

                        let session = find_session(txn, tenant_id, session_id).await?;
                        Ok(FinalizeOutcome {
                            session,
                            corrections,
                        })
                    })
                })
                .await
                .map_err(ledger::unwrap_txn_error);

            match result {
                Err(ServiceError::ConcurrentModification(key))
                    if attempt + 1 < MAX_TXN_ATTEMPTS =>
                {
                    attempt += 1;
                    warn!(attempt, key = %key, "version conflict finalizing stock take; retrying");
                }
                Err(e) => {
                    STOCK_TAKE_FAILURES.inc();
                    return Err(e);
                }
                Ok(outcome) => break outcome,
            }
        };

        STOCK_TAKES_COMPLETED.inc();
        info!(
            session_id = %session_id,
            corrections = outcome.corrections.len(),
            "stock take finalized"
        );

        let event = Event::StockTakeCompleted {
            session_id,
            tenant_id,
            corrections: outcome.corrections.len(),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(session_id = %session_id, "failed to publish stock take event: {}", e);
        }

        Ok(outcome)
    }

    /// Cancels an open session. Recorded counts are discarded and no
    /// movements are written.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<stock_take_session::Model, ServiceError> {
        let session = self
            .db_pool
            .transaction::<_, stock_take_session::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let session = find_session(txn, tenant_id, session_id).await?;
                    require_in_progress(&session)?;

                    let mut active: stock_take_session::ActiveModel = session.into();
                    active.status = Set(StockTakeStatus::Cancelled.as_str().to_string());
                    active.completed_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ledger::unwrap_txn_error)
            .map_err(|e| {
                STOCK_TAKE_FAILURES.inc();
                e
            })?;

        info!(session_id = %session_id, "stock take cancelled");

        let event = Event::StockTakeCancelled {
            session_id,
            tenant_id,
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(session_id = %session_id, "failed to publish stock take event: {}", e);
        }

        Ok(session)
    }
}

async fn find_session<C: sea_orm::ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    session_id: Uuid,
) -> Result<stock_take_session::Model, ServiceError> {
    StockTakeSession::find_by_id(session_id)
        .filter(stock_take_session::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("stock take session {}", session_id)))
}

fn require_in_progress(session: &stock_take_session::Model) -> Result<(), ServiceError> {
    if session.status() != Some(StockTakeStatus::InProgress) {
        return Err(ServiceError::InvalidState(format!(
            "stock take session {} is {}",
            session.id, session.status
        )));
    }
    Ok(())
}

async fn find_item(
    txn: &DatabaseTransaction,
    session_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> Result<Option<stock_take_item::Model>, ServiceError> {
    let mut query = StockTakeItem::find()
        .filter(stock_take_item::Column::SessionId.eq(session_id))
        .filter(stock_take_item::Column::ProductId.eq(product_id));
    query = match variant_id {
        Some(variant) => query.filter(stock_take_item::Column::VariantId.eq(variant)),
        None => query.filter(stock_take_item::Column::VariantId.is_null()),
    };

    query.one(txn).await.map_err(ServiceError::db_error)
}

/// Applies one correction for a counted discrepancy. The ledger's
/// insufficient-stock rejection is translated into `ReconciliationConflict`
/// because it means the physical count raced with later movements.
async fn apply_correction(
    txn: &DatabaseTransaction,
    session: &stock_take_session::Model,
    item: &stock_take_item::Model,
    created_by: Uuid,
) -> Result<stock_movement::Model, ServiceError> {
    let variance = item.variance();
    let (location_from, location_to) = if variance > 0 {
        (None, Some(session.location.clone()))
    } else {
        (Some(session.location.clone()), None)
    };

    let cmd = NewMovement {
        tenant_id: session.tenant_id,
        product_id: item.product_id,
        variant_id: item.variant_id,
        kind: MovementKind::StockTakeCorrection,
        quantity: variance,
        location_from,
        location_to,
        reference: Some(MovementReference::new("stock_take", session.id.to_string())),
        notes: item.notes.clone(),
        created_by,
    };

    let effects = ledger::kind_effects(&cmd)?;
    match ledger::apply_effects(txn, cmd.tenant_id, cmd.product_id, cmd.variant_id, &effects).await
    {
        Err(ServiceError::InsufficientStock {
            location,
            requested: _,
            available,
        }) => {
            return Err(ServiceError::ReconciliationConflict {
                product_id: item.product_id,
                variant_id: item.variant_id,
                location,
                variance,
                needed: -variance,
                available,
            })
        }
        other => other?,
    }

    ledger::record_movement(txn, &cmd).await
}
