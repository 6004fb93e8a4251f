use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One snapshotted line of a stock take session. The snapshot is the
/// authoritative scope of the session: counts against pairs not present
/// here are rejected rather than silently added.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_take_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub expected_quantity: i64,
    pub counted_quantity: i64,
    /// False until the first count is recorded for the item.
    pub counted: bool,
    pub notes: Option<String>,
}

impl Model {
    pub fn variance(&self) -> i64 {
        self.counted_quantity - self.expected_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_take_session::Entity",
        from = "Column::SessionId",
        to = "super::stock_take_session::Column::Id"
    )]
    Session,
}

impl Related<super::stock_take_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
