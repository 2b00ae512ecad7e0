pub mod cart;
pub mod coupon;
pub mod order;

pub use cart::cart_config;
pub use coupon::coupon_config;
pub use order::order_config;

use crate::error::{AppError, AppResult};
use crate::models::AuthContext;
use actix_web::{HttpMessage, HttpRequest, web};

/// 取出鉴权中间件写入的身份上下文
fn auth_context(req: &HttpRequest) -> AppResult<AuthContext> {
    req.extensions()
        .get::<AuthContext>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// 请求体/查询串/路径解析失败统一返回 JSON 错误包
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    );
}
