// Recipe graph and batch allocation
pub mod batch_allocator;
pub mod recipe_cost;

// Stock and pricing mutations
pub mod material_deduction;
pub mod pricing;

// Use cases
pub mod catalog;
pub mod checkout;
