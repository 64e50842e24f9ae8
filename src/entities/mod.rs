pub mod alert;
pub mod item;
pub mod order;
pub mod order_item;
pub mod shipment;
