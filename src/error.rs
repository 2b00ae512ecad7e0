use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Coupon ineligible: {0}")]
    Ineligible(String),

    #[error("Coupon expired: {0}")]
    Expired(String),

    #[error("Cart is empty")]
    EmptyCart,

    /// 下单事务中的持久化失败, 事务已整体回滚
    #[error("Order creation failed: {0}")]
    OrderCreation(DbErr),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART"),
            AppError::AuthError(_) | AppError::JwtError(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_ERROR")
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Ineligible(_) => (StatusCode::CONFLICT, "COUPON_INELIGIBLE"),
            AppError::Expired(_) => (StatusCode::CONFLICT, "COUPON_EXPIRED"),
            AppError::OrderCreation(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ORDER_CREATION_FAILED")
            }
            AppError::DatabaseError(_) => (StatusCode::SERVICE_UNAVAILABLE, "DATABASE_ERROR"),
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code) = self.status_and_code();
        let message = match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Ineligible(msg)
            | AppError::Expired(msg) => {
                log::warn!("{error_code}: {msg}");
                msg.clone()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                "Invalid access token".to_string()
            }
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                "Forbidden".to_string()
            }
            AppError::EmptyCart => "Unable to create order. Cart is empty.".to_string(),
            AppError::OrderCreation(err) => {
                log::error!("Order creation rolled back: {err}");
                "Unable to create order.".to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Unable to complete request.".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}
