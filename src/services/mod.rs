pub mod ledger;
pub mod stock_take;
