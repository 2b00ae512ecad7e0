pub mod auth;
pub mod cart;
pub mod common;
pub mod coupon;
pub mod order;
pub mod pagination;

pub use auth::*;
pub use cart::*;
pub use common::*;
pub use coupon::*;
pub use order::*;
pub use pagination::*;
