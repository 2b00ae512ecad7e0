use crate::entities::{DiscountType, coupon_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub business_id: i64,
    /// 不传则自动生成8位优惠码
    #[schema(example = "SUMMER10")]
    pub code: Option<String>,
    pub discount_type: DiscountType,
    /// percentage: 1-100 的整数百分比; fixed: 美分
    #[schema(example = 10)]
    pub discount_value: i64,
    /// 最低消费(美分), 默认 0
    pub min_purchase: Option<i64>,
    /// 为空表示全店通用
    pub product_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCouponStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    #[schema(example = "SUMMER10")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    pub id: i64,
    pub business_id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_purchase: i64,
    pub product_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<coupon_entity::Model> for CouponResponse {
    fn from(m: coupon_entity::Model) -> Self {
        Self {
            id: m.id,
            business_id: m.business_id,
            code: m.code,
            discount_type: m.discount_type,
            discount_value: m.discount_value,
            min_purchase: m.min_purchase,
            product_id: m.product_id,
            start_date: m.start_date,
            end_date: m.end_date,
            is_active: m.is_active,
            created_at: m.created_at,
        }
    }
}

/// 优惠券对某个购物车快照的计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponQuote {
    pub coupon_id: i64,
    /// 优惠金额(美分), 0 <= discount <= 折扣基数
    pub discount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyCouponResponse {
    pub coupon_id: i64,
    pub code: String,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}
