use crate::entities::{DiscountType, coupon_entity as coupons, order_entity as orders};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{CartService, CatalogService};
use crate::utils::{generate_coupon_code, is_valid_coupon_code, normalize_coupon_code};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

/// 自动生成优惠码的最大尝试次数
const MAX_CODE_ATTEMPTS: usize = 5;

/// 计算优惠券对购物车快照的优惠金额 (美分), 按顺序检查, 第一个失败即返回:
/// 1. 未启用 -> NotFound
/// 2. 不在有效期 -> Expired
/// 3. 整车小计低于门槛 -> Ineligible
/// 4. 限定商品不在购物车中 -> Ineligible
///
/// 结果满足 0 <= discount <= 折扣基数
pub fn calculate_discount(
    coupon: &coupons::Model,
    snapshot: &CartSnapshot,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    if !coupon.is_active {
        return Err(AppError::NotFound("Coupon not found".to_string()));
    }

    if !coupon.is_within_window(now) {
        return Err(AppError::Expired(format!(
            "Coupon {} is not valid at this time",
            coupon.code
        )));
    }

    if snapshot.subtotal < coupon.min_purchase {
        return Err(AppError::Ineligible(format!(
            "Minimum purchase of {} cents required",
            coupon.min_purchase
        )));
    }

    let base = match coupon.product_id {
        Some(product_id) => snapshot.subtotal_for_product(product_id),
        None => snapshot.subtotal,
    };
    if base <= 0 {
        return Err(AppError::Ineligible(
            "Coupon does not apply to any item in the cart".to_string(),
        ));
    }

    let discount = match coupon.discount_type {
        // 四舍五入到分
        DiscountType::Percentage => {
            let pct = i128::from(coupon.discount_value.clamp(0, 100));
            ((i128::from(base) * pct + 50) / 100) as i64
        }
        DiscountType::Fixed => coupon.discount_value.max(0).min(base),
    };

    Ok(discount.clamp(0, base))
}

#[derive(Clone)]
pub struct CouponService {
    pool: DatabaseConnection,
    catalog: CatalogService,
}

impl CouponService {
    pub fn new(pool: DatabaseConnection, catalog: CatalogService) -> Self {
        Self { pool, catalog }
    }

    /// 按优惠码查找已启用的优惠券; 不存在或已停用均为 NotFound
    pub async fn find_active_by_code_on<C>(conn: &C, code: &str) -> AppResult<coupons::Model>
    where
        C: ConnectionTrait,
    {
        coupons::Entity::find()
            .filter(coupons::Column::Code.eq(normalize_coupon_code(code)))
            .filter(coupons::Column::IsActive.eq(true))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))
    }

    /// 在指定连接(或下单事务)上针对快照计算优惠, 不修改任何数据
    pub async fn quote_on<C>(
        conn: &C,
        code: &str,
        snapshot: &CartSnapshot,
        now: DateTime<Utc>,
    ) -> AppResult<CouponQuote>
    where
        C: ConnectionTrait,
    {
        let coupon = Self::find_active_by_code_on(conn, code).await?;
        let discount = calculate_discount(&coupon, snapshot, now)?;
        Ok(CouponQuote {
            coupon_id: coupon.id,
            discount,
        })
    }

    /// 顾客试用优惠码, 基于当前购物车实时计算
    pub async fn apply(
        &self,
        ctx: &AuthContext,
        request: ApplyCouponRequest,
    ) -> AppResult<ApplyCouponResponse> {
        ctx.require_customer()?;

        let snapshot = CartService::snapshot_on(&self.pool, ctx.user_id).await?;
        let quote = Self::quote_on(&self.pool, &request.code, &snapshot, Utc::now()).await?;

        Ok(ApplyCouponResponse {
            coupon_id: quote.coupon_id,
            code: normalize_coupon_code(&request.code),
            subtotal: snapshot.subtotal,
            discount: quote.discount,
            total: (snapshot.subtotal - quote.discount).max(0),
        })
    }

    pub async fn create(
        &self,
        ctx: &AuthContext,
        request: CreateCouponRequest,
    ) -> AppResult<CouponResponse> {
        ctx.require_seller()?;
        self.catalog
            .ensure_business_owner(request.business_id, ctx.user_id)
            .await?;

        validate_coupon_terms(&request)?;

        if let Some(product_id) = request.product_id {
            let product = self.catalog.get_product(product_id).await?;
            if product.business_id != request.business_id {
                return Err(AppError::ValidationError(
                    "Product does not belong to this business".to_string(),
                ));
            }
        }

        let code = match request.code.as_deref() {
            Some(raw) => {
                let code = normalize_coupon_code(raw);
                if !is_valid_coupon_code(&code) {
                    return Err(AppError::ValidationError(
                        "Coupon code must be 3-32 characters of A-Z, 0-9, '_' or '-'".to_string(),
                    ));
                }
                if self.code_exists(&code).await? {
                    return Err(AppError::Conflict("Coupon code already exists".to_string()));
                }
                code
            }
            None => self.generate_unique_code().await?,
        };

        let now = Utc::now();
        let coupon = coupons::ActiveModel {
            business_id: Set(request.business_id),
            code: Set(code),
            discount_type: Set(request.discount_type),
            discount_value: Set(request.discount_value),
            min_purchase: Set(request.min_purchase.unwrap_or(0)),
            product_id: Set(request.product_id),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        log::info!(
            "Seller {} created coupon {} ({} {}) for business {}",
            ctx.user_id,
            coupon.code,
            coupon.discount_type,
            coupon.discount_value,
            coupon.business_id
        );

        Ok(coupon.into())
    }

    pub async fn list_for_business(
        &self,
        ctx: &AuthContext,
        business_id: i64,
    ) -> AppResult<Vec<CouponResponse>> {
        ctx.require_seller()?;
        self.catalog
            .ensure_business_owner(business_id, ctx.user_id)
            .await?;

        let list = coupons::Entity::find()
            .filter(coupons::Column::BusinessId.eq(business_id))
            .order_by_desc(coupons::Column::CreatedAt)
            .order_by_desc(coupons::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(list.into_iter().map(CouponResponse::from).collect())
    }

    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        coupon_id: i64,
        is_active: bool,
    ) -> AppResult<CouponResponse> {
        let coupon = self.owned_coupon(ctx, coupon_id).await?;

        let mut am = coupon.into_active_model();
        am.is_active = Set(is_active);
        am.updated_at = Set(Utc::now());
        let updated = am.update(&self.pool).await?;

        log::info!(
            "Seller {} set coupon {} active={}",
            ctx.user_id,
            updated.code,
            is_active
        );

        Ok(updated.into())
    }

    /// 删除优惠券; 已被订单引用时拒绝
    pub async fn delete(&self, ctx: &AuthContext, coupon_id: i64) -> AppResult<()> {
        let coupon = self.owned_coupon(ctx, coupon_id).await?;

        let referenced = orders::Entity::find()
            .filter(orders::Column::CouponId.eq(coupon.id))
            .count(&self.pool)
            .await?;
        if referenced > 0 {
            return Err(AppError::Conflict(
                "Coupon is referenced by existing orders".to_string(),
            ));
        }

        coupons::Entity::delete_by_id(coupon.id)
            .exec(&self.pool)
            .await?;

        log::info!("Seller {} deleted coupon {}", ctx.user_id, coupon.code);
        Ok(())
    }

    /// 读取优惠券并校验其店铺属于当前卖家
    async fn owned_coupon(&self, ctx: &AuthContext, coupon_id: i64) -> AppResult<coupons::Model> {
        ctx.require_seller()?;

        let coupon = coupons::Entity::find_by_id(coupon_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

        self.catalog
            .ensure_business_owner(coupon.business_id, ctx.user_id)
            .await?;
        Ok(coupon)
    }

    async fn code_exists(&self, code: &str) -> AppResult<bool> {
        let count = coupons::Entity::find()
            .filter(coupons::Column::Code.eq(code))
            .count(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// 生成未被占用的优惠码
    async fn generate_unique_code(&self) -> AppResult<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_coupon_code();
            if !self.code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AppError::InternalError(
            "Unable to generate a unique coupon code".to_string(),
        ))
    }
}

fn validate_coupon_terms(request: &CreateCouponRequest) -> AppResult<()> {
    match request.discount_type {
        DiscountType::Percentage if !(1..=100).contains(&request.discount_value) => {
            return Err(AppError::ValidationError(
                "Percentage discount must be between 1 and 100".to_string(),
            ));
        }
        DiscountType::Fixed if request.discount_value <= 0 => {
            return Err(AppError::ValidationError(
                "Fixed discount must be greater than 0".to_string(),
            ));
        }
        _ => {}
    }

    if request.min_purchase.is_some_and(|m| m < 0) {
        return Err(AppError::ValidationError(
            "Minimum purchase cannot be negative".to_string(),
        ));
    }

    if request.start_date >= request.end_date {
        return Err(AppError::ValidationError(
            "Start date must be before end date".to_string(),
        ));
    }

    Ok(())
}

/// 并发创建同码时唯一索引兜底
fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Coupon code already exists".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
