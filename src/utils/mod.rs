pub mod code_generator;
pub mod jwt;

pub use code_generator::{generate_coupon_code, is_valid_coupon_code, normalize_coupon_code};
pub use jwt::*;
