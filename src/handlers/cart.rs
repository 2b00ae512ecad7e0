use super::auth_context;
use crate::models::*;
use crate::services::CartService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/cart/add",
    tag = "cart",
    request_body = AddCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "加入购物车成功", body = CartItemResponse),
        (status = 400, description = "数量不合法"),
        (status = 401, description = "未授权"),
        (status = 403, description = "仅顾客可用"),
        (status = 404, description = "商品不存在或已下架")
    )
)]
pub async fn add_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    request: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match cart_service.add_item(&ctx, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购物车快照 (实时价格)", body = CartSnapshot),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_cart(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match cart_service.snapshot(&ctx).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/cart/count",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购物车行数", body = CartCountResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_count(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match cart_service.count(&ctx).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/cart/items/{id}",
    tag = "cart",
    params(
        ("id" = i64, Path, description = "购物车行ID")
    ),
    request_body = UpdateCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功; 数量 <= 0 时删除该行", body = UpdateCartItemResponse),
        (status = 401, description = "未授权"),
        (status = 404, description = "购物车行不存在")
    )
)]
pub async fn update_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match cart_service
        .update_quantity(&ctx, path.into_inner(), request.quantity)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart/items/{id}",
    tag = "cart",
    params(
        ("id" = i64, Path, description = "购物车行ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除结果 (幂等)", body = RemoveCartItemResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn remove_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match cart_service.remove_item(&ctx, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cart_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("", web::get().to(get_cart))
            .route("/add", web::post().to(add_item))
            .route("/count", web::get().to(get_count))
            .route("/items/{id}", web::put().to(update_item))
            .route("/items/{id}", web::delete().to(remove_item)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middlewares::AuthMiddleware;
    use crate::services::CatalogService;
    use crate::test_support::*;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_cart_requires_token() {
        let db = setup_db().await;
        let cart = CartService::new(db.clone(), CatalogService::new(db));
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(cart))
                .service(web::scope("/api/v1").configure(cart_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/cart").to_request();
        let Err(err) = test::try_call_service(&app, req).await else {
            panic!("request without token must be rejected");
        };
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn test_add_then_read_cart() {
        let db = setup_db().await;
        let business = seed_business(&db, SELLER_ID, "Shop").await;
        let product = seed_product(&db, business.id, "Lamp", 2_500).await;
        let cart = CartService::new(db.clone(), CatalogService::new(db));
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(cart))
                .service(web::scope("/api/v1").configure(cart_config)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/cart/add")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({"product_id": product.id, "quantity": 2}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/v1/cart")
            .insert_header(bearer(&customer()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["subtotal"], 5_000);
        assert_eq!(body["data"]["lines"][0]["name"], "Lamp");

        let req = test::TestRequest::post()
            .uri("/api/v1/cart/add")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({"product_id": product.id, "quantity": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_body_uses_error_envelope() {
        let db = setup_db().await;
        let cart = CartService::new(db.clone(), CatalogService::new(db));
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(cart))
                .configure(crate::handlers::extractor_config)
                .service(web::scope("/api/v1").configure(cart_config)),
        )
        .await;

        for body in [r#"{"product_id": 1"#, r#"{"product_id": "x", "quantity": 1}"#] {
            let req = test::TestRequest::post()
                .uri("/api/v1/cart/add")
                .insert_header(bearer(&customer()))
                .insert_header(("content-type", "application/json"))
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }
}
