pub mod location_stock;
pub mod product_stock;
pub mod stock_movement;
pub mod stock_take_item;
pub mod stock_take_session;
