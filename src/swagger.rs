use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{DiscountType, OrderStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::cart::add_item,
        handlers::cart::get_cart,
        handlers::cart::get_count,
        handlers::cart::update_item,
        handlers::cart::remove_item,
        handlers::coupon::apply_coupon,
        handlers::coupon::create_coupon,
        handlers::coupon::list_business_coupons,
        handlers::coupon::update_coupon_status,
        handlers::coupon::delete_coupon,
        handlers::order::create_order,
        handlers::order::get_orders,
        handlers::order::get_order,
    ),
    components(
        schemas(
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartItemResponse,
            UpdateCartItemResponse,
            RemoveCartItemResponse,
            CartCountResponse,
            CartSnapshotLine,
            CartSnapshot,
            CreateCouponRequest,
            UpdateCouponStatusRequest,
            ApplyCouponRequest,
            ApplyCouponResponse,
            CouponResponse,
            DiscountType,
            CreateOrderRequest,
            CreateOrderResponse,
            OrderQuery,
            OrderSummaryResponse,
            OrderItemResponse,
            OrderDetailResponse,
            OrderStatus,
            Role,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "cart", description = "Shopping cart API"),
        (name = "coupon", description = "Coupon API"),
        (name = "order", description = "Order API"),
    ),
    info(
        title = "Marketplace Core API",
        version = "1.0.0",
        description = "Cart, coupon and checkout REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_checkout_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/orders/create"));
        assert!(doc.paths.paths.contains_key("/coupons/apply"));
        assert!(doc.paths.paths.contains_key("/cart/items/{id}"));
    }
}
