use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of movement kinds. Stored as a string in the database and
/// parsed at the boundary so an invalid kind is rejected instead of stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
    Return,
    StockTakeCorrection,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "PURCHASE",
            MovementKind::Sale => "SALE",
            MovementKind::Adjustment => "ADJUSTMENT",
            MovementKind::Transfer => "TRANSFER",
            MovementKind::Return => "RETURN",
            MovementKind::StockTakeCorrection => "STOCK_TAKE_CORRECTION",
        }
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(MovementKind::Purchase),
            "SALE" => Ok(MovementKind::Sale),
            "ADJUSTMENT" => Ok(MovementKind::Adjustment),
            "TRANSFER" => Ok(MovementKind::Transfer),
            "RETURN" => Ok(MovementKind::Return),
            "STOCK_TAKE_CORRECTION" => Ok(MovementKind::StockTakeCorrection),
            other => Err(format!("unknown movement kind: {}", other)),
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in the stock ledger. Rows are only ever inserted;
/// corrections are made by appending new, opposite-signed movements.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub kind: String,
    pub quantity_delta: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        self.kind.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_storage_form() {
        for kind in [
            MovementKind::Purchase,
            MovementKind::Sale,
            MovementKind::Adjustment,
            MovementKind::Transfer,
            MovementKind::Return,
            MovementKind::StockTakeCorrection,
        ] {
            assert_eq!(kind.as_str().parse::<MovementKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("DISAPPEARED".parse::<MovementKind>().is_err());
        assert!("sale".parse::<MovementKind>().is_err());
    }
}
