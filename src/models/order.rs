use crate::entities::{OrderStatus, order_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// 可选优惠码, 针对本次下单的购物车快照计算
    pub coupon_code: Option<String>,
    /// 客户端幂等键: 同一用户重复提交同一键只会创建一个订单;
    /// 重放时 coupon_code 须与首次一致, 否则返回 409 Conflict
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: i64,
    pub subtotal_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    /// true 表示命中幂等键, 返回的是之前创建的订单
    pub replayed: bool,
}

impl CreateOrderResponse {
    pub fn from_order(m: &order_entity::Model, replayed: bool) -> Self {
        Self {
            order_id: m.id,
            subtotal_amount: m.subtotal_amount,
            discount_amount: m.discount_amount,
            total_amount: m.total_amount,
            status: m.status.clone(),
            replayed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub id: i64,
    pub user_id: i64,
    pub subtotal_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub coupon_id: Option<i64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<order_entity::Model> for OrderSummaryResponse {
    fn from(m: order_entity::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            subtotal_amount: m.subtotal_amount,
            discount_amount: m.discount_amount,
            total_amount: m.total_amount,
            coupon_id: m.coupon_id,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub name: Option<String>,
    pub image: Option<String>,
    pub quantity: i32,
    /// 下单时单价 (美分)
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderSummaryResponse,
    pub items: Vec<OrderItemResponse>,
}
