use super::auth_context;
use crate::models::*;
use crate::services::CouponService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/coupons/apply",
    tag = "coupon",
    request_body = ApplyCouponRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "优惠码试算成功", body = ApplyCouponResponse),
        (status = 401, description = "未授权"),
        (status = 404, description = "优惠码不存在或未启用"),
        (status = 409, description = "优惠码已过期或不满足使用条件")
    )
)]
pub async fn apply_coupon(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    request: web::Json<ApplyCouponRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match coupon_service.apply(&ctx, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/coupons",
    tag = "coupon",
    request_body = CreateCouponRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "创建优惠券成功", body = CouponResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权"),
        (status = 403, description = "非店铺所有者"),
        (status = 409, description = "优惠码已存在")
    )
)]
pub async fn create_coupon(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    request: web::Json<CreateCouponRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match coupon_service.create(&ctx, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/coupons/business/{business_id}",
    tag = "coupon",
    params(
        ("business_id" = i64, Path, description = "店铺ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "店铺优惠券列表", body = Vec<CouponResponse>),
        (status = 401, description = "未授权"),
        (status = 403, description = "非店铺所有者")
    )
)]
pub async fn list_business_coupons(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match coupon_service
        .list_for_business(&ctx, path.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/coupons/{id}/status",
    tag = "coupon",
    params(
        ("id" = i64, Path, description = "优惠券ID")
    ),
    request_body = UpdateCouponStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态已更新", body = CouponResponse),
        (status = 401, description = "未授权"),
        (status = 403, description = "非店铺所有者"),
        (status = 404, description = "优惠券不存在")
    )
)]
pub async fn update_coupon_status(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCouponStatusRequest>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;

    match coupon_service
        .update_status(&ctx, path.into_inner(), request.is_active)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/coupons/{id}",
    tag = "coupon",
    params(
        ("id" = i64, Path, description = "优惠券ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 401, description = "未授权"),
        (status = 403, description = "非店铺所有者"),
        (status = 404, description = "优惠券不存在"),
        (status = 409, description = "已有订单使用该优惠券")
    )
)]
pub async fn delete_coupon(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = auth_context(&req)?;
    let coupon_id = path.into_inner();

    match coupon_service.delete(&ctx, coupon_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            serde_json::json!({ "id": coupon_id }),
            "Coupon deleted",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn coupon_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/coupons")
            .route("", web::post().to(create_coupon))
            .route("/apply", web::post().to(apply_coupon))
            .route("/business/{business_id}", web::get().to(list_business_coupons))
            .route("/{id}/status", web::put().to(update_coupon_status))
            .route("/{id}", web::delete().to(delete_coupon)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DiscountType;
    use crate::middlewares::AuthMiddleware;
    use crate::services::CatalogService;
    use crate::test_support::*;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_expired_and_ineligible_map_to_conflict_codes() {
        let db = setup_db().await;
        let business = seed_business(&db, SELLER_ID, "Shop").await;
        seed_coupon(&db, business.id, "FIVE", DiscountType::Fixed, 500).await;
        let coupons = CouponService::new(db.clone(), CatalogService::new(db));
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(coupons))
                .service(web::scope("/api/v1").configure(coupon_config)),
        )
        .await;

        // 空购物车没有可抵扣的金额
        let req = test::TestRequest::post()
            .uri("/api/v1/coupons/apply")
            .insert_header(bearer(&customer()))
            .set_json(serde_json::json!({"code": "five"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "COUPON_INELIGIBLE");
    }

    #[actix_web::test]
    async fn test_seller_creates_and_lists_coupons() {
        let db = setup_db().await;
        let business = seed_business(&db, SELLER_ID, "Shop").await;
        let coupons = CouponService::new(db.clone(), CatalogService::new(db));
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(test_jwt()))
                .app_data(web::Data::new(coupons))
                .service(web::scope("/api/v1").configure(coupon_config)),
        )
        .await;

        let payload = serde_json::json!({
            "business_id": business.id,
            "code": "launch",
            "discount_type": "percentage",
            "discount_value": 15,
            "start_date": "2020-01-01T00:00:00Z",
            "end_date": "2099-01-01T00:00:00Z"
        });
        let req = test::TestRequest::post()
            .uri("/api/v1/coupons")
            .insert_header(bearer(&seller()))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/v1/coupons")
            .insert_header(bearer(&seller()))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/coupons/business/{}", business.id))
            .insert_header(bearer(&seller()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0]["code"], "LAUNCH");

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/coupons/business/{}", business.id))
            .insert_header(bearer(&other_seller()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
