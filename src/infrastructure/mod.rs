pub mod models;
pub mod order_store;
pub mod product_lookup;
