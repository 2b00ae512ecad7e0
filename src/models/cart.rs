use crate::entities::cart_item_entity;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    #[schema(example = 12)]
    pub product_id: i64,
    #[schema(example = 2)]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// <= 0 等同于删除该行
    #[schema(example = 3)]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cart_item_entity::Model> for CartItemResponse {
    fn from(m: cart_item_entity::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            quantity: m.quantity,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 更新数量的结果: 数量 <= 0 时该行被删除, item 为 None
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateCartItemResponse {
    pub item: Option<CartItemResponse>,
    pub removed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveCartItemResponse {
    pub rows_affected: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCountResponse {
    pub count: u64,
}

/// 购物车快照中的一行 (购物车行 + 实时商品信息)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSnapshotLine {
    pub line_id: i64,
    pub product_id: i64,
    pub name: String,
    /// 当前单价 (美分)
    pub unit_price: i64,
    pub image: Option<String>,
    pub stock_quantity: i32,
    pub business_id: i64,
    pub business_name: String,
    pub quantity: i32,
}

impl CartSnapshotLine {
    /// 行小计, 溢出时为 None
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// 购物车快照: 不持久化, 每次读取都重新计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSnapshot {
    pub user_id: i64,
    pub lines: Vec<CartSnapshotLine>,
    /// Σ(unit_price × quantity), 美分
    pub subtotal: i64,
}

impl CartSnapshot {
    pub fn new(user_id: i64, lines: Vec<CartSnapshotLine>) -> AppResult<Self> {
        let subtotal = lines
            .iter()
            .try_fold(0i64, |acc, line| acc.checked_add(line.line_total()?))
            .ok_or_else(|| AppError::ValidationError("Cart total is out of range".to_string()))?;
        Ok(Self {
            user_id,
            lines,
            subtotal,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 指定商品所在行的小计
    pub fn subtotal_for_product(&self, product_id: i64) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .filter_map(CartSnapshotLine::line_total)
            .fold(0i64, i64::saturating_add)
    }
}

#[cfg(test)]
pub(crate) fn snapshot_line(product_id: i64, unit_price: i64, quantity: i32) -> CartSnapshotLine {
    CartSnapshotLine {
        line_id: product_id,
        product_id,
        name: format!("Product {product_id}"),
        unit_price,
        image: None,
        stock_quantity: 100,
        business_id: 1,
        business_name: "Shop".to_string(),
        quantity,
    }
}
