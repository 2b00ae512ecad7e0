pub mod businesses;
pub mod cart_items;
pub mod coupons;
pub mod order_items;
pub mod orders;
pub mod products;

pub use businesses as business_entity;
pub use cart_items as cart_item_entity;
pub use coupons as coupon_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use products as product_entity;

pub use businesses::BusinessStatus;
pub use coupons::DiscountType;
pub use orders::OrderStatus;
pub use products::ProductStatus;
