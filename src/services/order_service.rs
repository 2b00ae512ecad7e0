use crate::entities::{
    OrderStatus, business_entity as businesses, coupon_entity as coupons,
    order_entity as orders, order_item_entity as order_items, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{CartService, CouponService};
use crate::utils::normalize_coupon_code;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, RelationTrait, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

#[derive(Debug, FromQueryResult)]
struct OrderItemRow {
    product_id: i64,
    quantity: i32,
    price: i64,
    name: Option<String>,
    image: Option<String>,
}

impl From<OrderItemRow> for OrderItemResponse {
    fn from(r: OrderItemRow) -> Self {
        Self {
            product_id: r.product_id,
            name: r.name,
            image: r.image,
            quantity: r.quantity,
            price: r.price,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    pool: DatabaseConnection,
}

impl OrderService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 下单: 在同一事务内锁定读取购物车快照, 计算优惠, 写入订单和明细, 移除已下单的购物车行
    ///
    /// 持久化失败整体回滚并返回 OrderCreation; 空购物车/优惠券不可用等业务错误原样返回
    pub async fn create_order(
        &self,
        ctx: &AuthContext,
        request: CreateOrderRequest,
    ) -> AppResult<CreateOrderResponse> {
        ctx.require_customer()?;

        if let Some(key) = request.idempotency_key
            && let Some(existing) = self.find_by_idempotency_key(ctx.user_id, key).await?
        {
            log::info!(
                "User {} replayed idempotency key {}, returning order {}",
                ctx.user_id,
                key,
                existing.id
            );
            return self.replay(&request, &existing).await;
        }

        let txn = self.pool.begin().await.map_err(AppError::OrderCreation)?;

        match Self::place_order(&txn, ctx.user_id, &request, Utc::now()).await {
            Ok(order) => {
                txn.commit().await.map_err(|e| {
                    log::error!("Order commit failed for user {}: {}", ctx.user_id, e);
                    AppError::OrderCreation(e)
                })?;

                log::info!(
                    "User {} created order {} (subtotal {}, discount {}, total {})",
                    ctx.user_id,
                    order.id,
                    order.subtotal_amount,
                    order.discount_amount,
                    order.total_amount
                );
                Ok(CreateOrderResponse::from_order(&order, false))
            }
            Err(err) => {
                if let Err(rb) = txn.rollback().await {
                    log::error!("Order rollback failed for user {}: {}", ctx.user_id, rb);
                }
                log::warn!("Order for user {} rolled back: {}", ctx.user_id, err);

                // 同一幂等键的并发请求: 唯一索引拦下后返回先提交的订单
                if let (AppError::OrderCreation(db_err), Some(key)) =
                    (&err, request.idempotency_key)
                    && matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
                    && let Some(existing) = self.find_by_idempotency_key(ctx.user_id, key).await?
                {
                    return self.replay(&request, &existing).await;
                }

                Err(err)
            }
        }
    }

    async fn place_order(
        txn: &DatabaseTransaction,
        user_id: i64,
        request: &CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> AppResult<orders::Model> {
        let snapshot = CartService::snapshot_for_update_on(txn, user_id)
            .await
            .map_err(|e| match e {
                AppError::DatabaseError(db_err) => AppError::OrderCreation(db_err),
                other => other,
            })?;
        if snapshot.is_empty() {
            return Err(AppError::EmptyCart);
        }

        let quote = match requested_coupon_code(request) {
            Some(code) => Some(CouponService::quote_on(txn, code, &snapshot, now).await?),
            None => None,
        };

        persist_order(txn, &snapshot, quote, request.idempotency_key, now)
            .await
            .map_err(AppError::OrderCreation)
    }

    /// 幂等键重放: 请求的优惠码必须与原订单一致, 否则 Conflict
    async fn replay(
        &self,
        request: &CreateOrderRequest,
        existing: &orders::Model,
    ) -> AppResult<CreateOrderResponse> {
        let same_coupon = match (requested_coupon_code(request), existing.coupon_id) {
            (None, None) => true,
            (Some(code), Some(coupon_id)) => coupons::Entity::find_by_id(coupon_id)
                .one(&self.pool)
                .await?
                .is_some_and(|c| c.code == normalize_coupon_code(code)),
            _ => false,
        };

        if !same_coupon {
            return Err(AppError::Conflict(
                "Idempotency key was already used with a different coupon".to_string(),
            ));
        }
        Ok(CreateOrderResponse::from_order(existing, true))
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: i64,
        key: Uuid,
    ) -> AppResult<Option<orders::Model>> {
        let order = orders::Entity::find()
            .filter(orders::Column::UserId.eq(user_id))
            .filter(orders::Column::IdempotencyKey.eq(key))
            .one(&self.pool)
            .await?;
        Ok(order)
    }

    /// 订单列表: 顾客看自己的, 卖家看包含自家商品的, 管理员看全部
    pub async fn list_orders(
        &self,
        ctx: &AuthContext,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderSummaryResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let select = orders::Entity::find().filter(visibility(ctx));

        let total = select.clone().count(&self.pool).await?;
        let list = select
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        let items = list.into_iter().map(OrderSummaryResponse::from).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 订单详情; 无权查看与不存在同样返回 NotFound
    pub async fn get_order(&self, ctx: &AuthContext, order_id: i64) -> AppResult<OrderDetailResponse> {
        let order = orders::Entity::find_by_id(order_id)
            .filter(visibility(ctx))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let items = order_items::Entity::find()
            .select_only()
            .column(order_items::Column::ProductId)
            .column(order_items::Column::Quantity)
            .column(order_items::Column::Price)
            .column_as(products::Column::Name, "name")
            .column_as(products::Column::Image, "image")
            .join(JoinType::LeftJoin, order_items::Relation::Product.def())
            .filter(order_items::Column::OrderId.eq(order.id))
            .order_by_asc(order_items::Column::Id)
            .into_model::<OrderItemRow>()
            .all(&self.pool)
            .await?;

        Ok(OrderDetailResponse {
            order: order.into(),
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        })
    }
}

/// 事务内写入: 订单 -> 明细 -> 移除已下单的购物车行; 任一步失败由调用方回滚
async fn persist_order(
    txn: &DatabaseTransaction,
    snapshot: &CartSnapshot,
    quote: Option<CouponQuote>,
    idempotency_key: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<orders::Model, DbErr> {
    let discount = quote.map(|q| q.discount).unwrap_or(0);

    let order = orders::ActiveModel {
        user_id: Set(snapshot.user_id),
        subtotal_amount: Set(snapshot.subtotal),
        discount_amount: Set(discount),
        total_amount: Set((snapshot.subtotal - discount).max(0)),
        coupon_id: Set(quote.map(|q| q.coupon_id)),
        idempotency_key: Set(idempotency_key),
        status: Set(OrderStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let items = snapshot.lines.iter().map(|line| order_items::ActiveModel {
        order_id: Set(order.id),
        product_id: Set(line.product_id),
        quantity: Set(line.quantity),
        price: Set(line.unit_price),
        ..Default::default()
    });
    order_items::Entity::insert_many(items)
        .exec_without_returning(txn)
        .await?;

    CartService::remove_snapshot_lines_on(txn, snapshot).await?;

    Ok(order)
}

/// 空白优惠码按未传处理
fn requested_coupon_code(request: &CreateOrderRequest) -> Option<&str> {
    request
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// 按角色限定可见订单
fn visibility(ctx: &AuthContext) -> Condition {
    match ctx.role {
        Role::Admin => Condition::all(),
        Role::Customer => Condition::all().add(orders::Column::UserId.eq(ctx.user_id)),
        Role::Seller => Condition::all().add(seller_orders(ctx.user_id)),
    }
}

/// 包含该卖家任一店铺商品的订单ID
fn seller_orders(seller_id: i64) -> SimpleExpr {
    let order_ids = order_items::Entity::find()
        .select_only()
        .column(order_items::Column::OrderId)
        .join(JoinType::InnerJoin, order_items::Relation::Product.def())
        .join(JoinType::InnerJoin, products::Relation::Business.def())
        .filter(businesses::Column::UserId.eq(seller_id))
        .into_query();
    orders::Column::Id.in_subquery(order_ids)
}
