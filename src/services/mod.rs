pub mod cart_service;
pub mod catalog_service;
pub mod coupon_service;
pub mod order_service;

pub use cart_service::*;
pub use catalog_service::*;
pub use coupon_service::*;
pub use order_service::*;
