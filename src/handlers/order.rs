use super::auth_context;
use crate::models::*;
use crate::services::OrderService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/orders/create",
    tag = "order",
    request_body = CreateOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "下单成功 (或幂等键重放)", body = CreateOrderResponse),
        (status = 400, description = "购物车为空"),
        (status = 401, description = "未授权"),
        (status = 403, description = "仅顾客可下单"),
        (status = 404, description = "优惠码不存在"),
        (status = 409, description = "优惠码已过期或不满足使用条件"),
        (status = 503, description = "下单失败, 已回滚")
    )
)]
pub async fn create_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match order_service.create_order(&ctx, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取订单列表成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match order_service.list_orders(&ctx, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(
        ("id" = i64, Path, description = "订单ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单详情", body = OrderDetailResponse),
        (status = 401, description = "未授权"),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match order_service.get_order(&ctx, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(get_orders))
            .route("/create", web::post().to(create_order))
            .route("/{id}", web::get().to(get_order)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::cart_config;
    use crate::middlewares::AuthMiddleware;
    use crate::services::{CartService, CatalogService};
    use crate::test_support::*;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_checkout_flow() {
        let db = setup_db().await;
        let business = seed_business(&db, SELLER_ID, "Shop").await;
        let product = seed_product(&db, business.id, "Lamp", 2_500).await;
        let cart = CartService::new(db.clone(), CatalogService::new(db.clone()));
        let orders = OrderService::new(db.clone());
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(cart))
                .app_data(web::Data::new(orders))
                .service(
                    web::scope("/api/v1")
                        .configure(cart_config)
                        .configure(order_config),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/orders/create")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "EMPTY_CART");

        let req = test::TestRequest::post()
            .uri("/api/v1/cart/add")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({"product_id": product.id, "quantity": 3}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/v1/orders/create")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["total_amount"], 7_500);
        assert_eq!(body["data"]["status"], "pending");
        let order_id = body["data"]["order_id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{order_id}"))
            .insert_header(bearer(&customer()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["id"], order_id);
        assert_eq!(body["data"]["items"][0]["price"], 2_500);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{order_id}"))
            .insert_header(bearer(&other_customer()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
