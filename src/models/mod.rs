pub mod offer;
pub mod order;
