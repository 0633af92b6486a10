// Store and catalog
pub mod store;
pub mod product;
pub mod product_pricing;
pub mod product_recipe;
pub mod raw_material;
pub mod material_batch;
pub mod material_cost_history;
pub mod sub_recipe;
pub mod sub_recipe_ingredient;

// Ledgers
pub mod material_usage_log;
pub mod price_change_notification;

// Orders
pub mod customer;
pub mod order;
pub mod order_item;
pub mod order_item_option;
pub mod payment;
