pub mod alerts;
pub mod inventory;
pub mod orders;
pub mod search;
pub mod shipments;
