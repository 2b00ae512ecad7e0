use crate::entities::{
    ProductStatus, business_entity as businesses, cart_item_entity as cart_items,
    product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::CatalogService;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, FromQueryResult, IntoActiveModel, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Select, Set,
};

/// 单个购物车行允许的最大数量
pub const MAX_LINE_QUANTITY: i32 = 9_999;

fn check_line_quantity(quantity: i32) -> AppResult<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::ValidationError(format!(
            "Quantity per cart line cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// 购物车快照查询行 (cart_items ⨝ products ⨝ businesses)
#[derive(Debug, FromQueryResult)]
struct SnapshotRow {
    line_id: i64,
    product_id: i64,
    quantity: i32,
    name: String,
    unit_price: i64,
    image: Option<String>,
    stock_quantity: i32,
    business_id: i64,
    business_name: String,
}

fn snapshot_query(user_id: i64) -> Select<cart_items::Entity> {
    cart_items::Entity::find()
        .select_only()
        .column_as(cart_items::Column::Id, "line_id")
        .column_as(cart_items::Column::ProductId, "product_id")
        .column_as(cart_items::Column::Quantity, "quantity")
        .column_as(products::Column::Name, "name")
        .column_as(products::Column::Price, "unit_price")
        .column_as(products::Column::Image, "image")
        .column_as(products::Column::StockQuantity, "stock_quantity")
        .column_as(products::Column::BusinessId, "business_id")
        .column_as(businesses::Column::Name, "business_name")
        .join(JoinType::InnerJoin, cart_items::Relation::Product.def())
        .join(JoinType::InnerJoin, products::Relation::Business.def())
        .filter(cart_items::Column::UserId.eq(user_id))
        .filter(products::Column::Status.eq(ProductStatus::Active))
        .order_by_desc(cart_items::Column::CreatedAt)
        .order_by_desc(cart_items::Column::Id)
}

fn into_snapshot(user_id: i64, rows: Vec<SnapshotRow>) -> AppResult<CartSnapshot> {
    CartSnapshot::new(user_id, rows.into_iter().map(CartSnapshotLine::from).collect())
}

impl From<SnapshotRow> for CartSnapshotLine {
    fn from(r: SnapshotRow) -> Self {
        Self {
            line_id: r.line_id,
            product_id: r.product_id,
            name: r.name,
            unit_price: r.unit_price,
            image: r.image,
            stock_quantity: r.stock_quantity,
            business_id: r.business_id,
            business_name: r.business_name,
            quantity: r.quantity,
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    pool: DatabaseConnection,
    catalog: CatalogService,
}

impl CartService {
    pub fn new(pool: DatabaseConnection, catalog: CatalogService) -> Self {
        Self { pool, catalog }
    }

    /// 加入购物车: 已存在同一商品时数量累加 (单条 upsert 语句, 并发加购也不会丢数量)
    /// 累加后超过 MAX_LINE_QUANTITY 时 upsert 不生效并返回 ValidationError; 不校验库存
    pub async fn add_item(
        &self,
        ctx: &AuthContext,
        request: AddCartItemRequest,
    ) -> AppResult<CartItemResponse> {
        ctx.require_customer()?;

        if request.quantity <= 0 {
            return Err(AppError::ValidationError(
                "Quantity must be a positive integer".to_string(),
            ));
        }
        check_line_quantity(request.quantity)?;

        self.catalog.get_active_product(request.product_id).await?;

        let now = Utc::now();
        let affected = cart_items::Entity::insert(cart_items::ActiveModel {
            user_id: Set(ctx.user_id),
            product_id: Set(request.product_id),
            quantity: Set(request.quantity),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([cart_items::Column::UserId, cart_items::Column::ProductId])
                .value(
                    cart_items::Column::Quantity,
                    Expr::col((cart_items::Entity, cart_items::Column::Quantity))
                        .add(request.quantity),
                )
                .value(cart_items::Column::UpdatedAt, now)
                .action_and_where(
                    Expr::col((cart_items::Entity, cart_items::Column::Quantity))
                        .lte(MAX_LINE_QUANTITY - request.quantity),
                )
                .to_owned(),
        )
        .exec_without_returning(&self.pool)
        .await?;

        if affected == 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity per cart line cannot exceed {MAX_LINE_QUANTITY}"
            )));
        }

        let line = cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(ctx.user_id))
            .filter(cart_items::Column::ProductId.eq(request.product_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::InternalError("Cart line vanished after upsert".into()))?;

        log::debug!(
            "User {} cart line {} now holds {} x product {}",
            ctx.user_id,
            line.id,
            line.quantity,
            line.product_id
        );

        Ok(line.into())
    }

    /// 修改数量; 数量 <= 0 时删除该行
    pub async fn update_quantity(
        &self,
        ctx: &AuthContext,
        line_id: i64,
        quantity: i32,
    ) -> AppResult<UpdateCartItemResponse> {
        ctx.require_customer()?;
        check_line_quantity(quantity)?;

        let line = cart_items::Entity::find_by_id(line_id)
            .filter(cart_items::Column::UserId.eq(ctx.user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

        if quantity <= 0 {
            cart_items::Entity::delete_by_id(line.id)
                .exec(&self.pool)
                .await?;
            return Ok(UpdateCartItemResponse {
                item: None,
                removed: true,
            });
        }

        let mut am = line.into_active_model();
        am.quantity = Set(quantity);
        am.updated_at = Set(Utc::now());
        let updated = am.update(&self.pool).await?;

        Ok(UpdateCartItemResponse {
            item: Some(updated.into()),
            removed: false,
        })
    }

    /// 删除购物车行; 幂等, 行不存在时 rows_affected = 0
    pub async fn remove_item(
        &self,
        ctx: &AuthContext,
        line_id: i64,
    ) -> AppResult<RemoveCartItemResponse> {
        ctx.require_customer()?;

        let result = cart_items::Entity::delete_many()
            .filter(cart_items::Column::Id.eq(line_id))
            .filter(cart_items::Column::UserId.eq(ctx.user_id))
            .exec(&self.pool)
            .await?;

        Ok(RemoveCartItemResponse {
            rows_affected: result.rows_affected,
        })
    }

    pub async fn snapshot(&self, ctx: &AuthContext) -> AppResult<CartSnapshot> {
        ctx.require_customer()?;
        Self::snapshot_on(&self.pool, ctx.user_id).await
    }

    /// 在指定连接(或事务)上读取购物车快照, 只包含可售商品, 按加入时间倒序
    pub async fn snapshot_on<C>(conn: &C, user_id: i64) -> AppResult<CartSnapshot>
    where
        C: ConnectionTrait,
    {
        let rows = snapshot_query(user_id).into_model::<SnapshotRow>().all(conn).await?;
        into_snapshot(user_id, rows)
    }

    /// 下单事务内读取快照并锁定对应购物车行 (SELECT ... FOR UPDATE),
    /// 提交前并发加购会等待; SQLite 无行锁, 由数据库级写锁串行化
    pub async fn snapshot_for_update_on<C>(conn: &C, user_id: i64) -> AppResult<CartSnapshot>
    where
        C: ConnectionTrait,
    {
        let rows = snapshot_query(user_id)
            .lock_exclusive()
            .into_model::<SnapshotRow>()
            .all(conn)
            .await?;
        into_snapshot(user_id, rows)
    }

    /// 清空用户购物车
    pub async fn clear_on<C>(conn: &C, user_id: i64) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let result = cart_items::Entity::delete_many()
            .filter(cart_items::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// 下单的最后一步: 只删除快照中的行, 且要求数量未变;
    /// 任一行被并发修改或删除时返回错误, 由调用方回滚
    /// 下架商品的购物车行不在快照中, 保留在购物车里
    pub async fn remove_snapshot_lines_on<C>(conn: &C, snapshot: &CartSnapshot) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let lines = snapshot.lines.iter().fold(Condition::any(), |cond, line| {
            cond.add(
                Condition::all()
                    .add(cart_items::Column::Id.eq(line.line_id))
                    .add(cart_items::Column::Quantity.eq(line.quantity)),
            )
        });

        let result = cart_items::Entity::delete_many()
            .filter(cart_items::Column::UserId.eq(snapshot.user_id))
            .filter(lines)
            .exec(conn)
            .await?;

        if result.rows_affected != snapshot.lines.len() as u64 {
            return Err(DbErr::Custom(format!(
                "Cart changed during checkout: expected {} lines, removed {}",
                snapshot.lines.len(),
                result.rows_affected
            )));
        }
        Ok(result.rows_affected)
    }

    pub async fn count(&self, ctx: &AuthContext) -> AppResult<CartCountResponse> {
        ctx.require_customer()?;
        let count = cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(ctx.user_id))
            .count(&self.pool)
            .await?;
        Ok(CartCountResponse { count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    async fn setup() -> (DatabaseConnection, CartService, i64, i64) {
        let db = setup_db().await;
        let business = seed_business(&db, SELLER_ID, "Corner Shop").await;
        let mug = seed_product(&db, business.id, "Mug", 1_250).await;
        let tea = seed_product(&db, business.id, "Tea", 800).await;
        let service = CartService::new(db.clone(), CatalogService::new(db.clone()));
        (db, service, mug.id, tea.id)
    }

    #[tokio::test]
    async fn test_repeated_add_accumulates_quantity() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();

        service.add_item(&ctx, add(mug, 2)).await.unwrap();
        let line = service.add_item(&ctx, add(mug, 3)).await.unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(service.count(&ctx).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_quantity() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();

        for quantity in [0, -4] {
            assert!(matches!(
                service.add_item(&ctx, add(mug, quantity)).await,
                Err(AppError::ValidationError(_))
            ));
        }
        assert_eq!(service.count(&ctx).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_add_unknown_or_inactive_product_is_not_found() {
        let (db, service, mug, _tea) = setup().await;
        let ctx = customer();
        set_product_status(&db, mug, ProductStatus::Deleted).await;

        assert!(matches!(
            service.add_item(&ctx, add(mug, 1)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.add_item(&ctx, add(424_242, 1)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_only_customers_use_the_cart() {
        let (_db, service, mug, _tea) = setup().await;
        assert!(matches!(
            service.add_item(&seller(), add(mug, 1)).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();
        let line = service.add_item(&ctx, add(mug, 1)).await.unwrap();

        let updated = service.update_quantity(&ctx, line.id, 7).await.unwrap();
        assert!(!updated.removed);
        assert_eq!(updated.item.unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();
        let line = service.add_item(&ctx, add(mug, 1)).await.unwrap();

        let updated = service.update_quantity(&ctx, line.id, 0).await.unwrap();
        assert!(updated.removed);
        assert!(updated.item.is_none());
        assert!(service.snapshot(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_other_users_line_is_not_found() {
        let (_db, service, mug, _tea) = setup().await;
        let line = service.add_item(&customer(), add(mug, 1)).await.unwrap();

        assert!(matches!(
            service.update_quantity(&other_customer(), line.id, 3).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();
        let line = service.add_item(&ctx, add(mug, 1)).await.unwrap();

        assert_eq!(service.remove_item(&ctx, line.id).await.unwrap().rows_affected, 1);
        assert_eq!(service.remove_item(&ctx, line.id).await.unwrap().rows_affected, 0);
    }

    #[tokio::test]
    async fn test_remove_does_not_touch_other_users_lines() {
        let (_db, service, mug, _tea) = setup().await;
        let line = service.add_item(&customer(), add(mug, 1)).await.unwrap();

        let result = service.remove_item(&other_customer(), line.id).await.unwrap();
        assert_eq!(result.rows_affected, 0);
        assert_eq!(service.count(&customer()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_uses_live_prices_and_skips_inactive_products() {
        let (db, service, mug, tea) = setup().await;
        let ctx = customer();
        service.add_item(&ctx, add(mug, 2)).await.unwrap();
        service.add_item(&ctx, add(tea, 3)).await.unwrap();

        let snapshot = service.snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.subtotal, 2 * 1_250 + 3 * 800);
        assert_eq!(snapshot.lines[0].business_name, "Corner Shop");

        set_product_price(&db, mug, 1_000).await;
        let snapshot = service.snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.subtotal, 2 * 1_000 + 3 * 800);

        set_product_status(&db, tea, ProductStatus::Inactive).await;
        let snapshot = service.snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].product_id, mug);
        assert_eq!(snapshot.subtotal, 2_000);
    }

    #[tokio::test]
    async fn test_clear_only_affects_one_user() {
        let (db, service, mug, tea) = setup().await;
        service.add_item(&customer(), add(mug, 1)).await.unwrap();
        service.add_item(&customer(), add(tea, 1)).await.unwrap();
        service.add_item(&other_customer(), add(mug, 1)).await.unwrap();

        let cleared = CartService::clear_on(&db, CUSTOMER_ID).await.unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(service.count(&customer()).await.unwrap().count, 0);
        assert_eq!(service.count(&other_customer()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_accumulated_quantity_is_capped() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();

        assert!(matches!(
            service.add_item(&ctx, add(mug, i32::MAX)).await,
            Err(AppError::ValidationError(_))
        ));

        service.add_item(&ctx, add(mug, MAX_LINE_QUANTITY)).await.unwrap();
        assert!(matches!(
            service.add_item(&ctx, add(mug, 1)).await,
            Err(AppError::ValidationError(_))
        ));

        let snapshot = service.snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.lines[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(snapshot.subtotal, i64::from(MAX_LINE_QUANTITY) * 1_250);
    }

    #[tokio::test]
    async fn test_update_quantity_is_capped() {
        let (_db, service, mug, _tea) = setup().await;
        let ctx = customer();
        let line = service.add_item(&ctx, add(mug, 1)).await.unwrap();

        assert!(matches!(
            service.update_quantity(&ctx, line.id, MAX_LINE_QUANTITY + 1).await,
            Err(AppError::ValidationError(_))
        ));
        let updated = service
            .update_quantity(&ctx, line.id, MAX_LINE_QUANTITY)
            .await
            .unwrap();
        assert_eq!(updated.item.unwrap().quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_remove_snapshot_lines_keeps_unlisted_lines() {
        let (db, service, mug, tea) = setup().await;
        let ctx = customer();
        service.add_item(&ctx, add(mug, 2)).await.unwrap();
        service.add_item(&ctx, add(tea, 1)).await.unwrap();
        set_product_status(&db, tea, ProductStatus::Inactive).await;

        let snapshot = CartService::snapshot_for_update_on(&db, CUSTOMER_ID)
            .await
            .unwrap();
        assert_eq!(snapshot.lines.len(), 1);

        let removed = CartService::remove_snapshot_lines_on(&db, &snapshot)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        // 下架商品的行不在快照中, 继续留在购物车
        assert_eq!(service.count(&ctx).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_remove_snapshot_lines_detects_changed_quantity() {
        let (db, service, mug, _tea) = setup().await;
        let ctx = customer();
        service.add_item(&ctx, add(mug, 2)).await.unwrap();

        let snapshot = CartService::snapshot_on(&db, CUSTOMER_ID).await.unwrap();
        // 快照之后又加购了 3 件
        service.add_item(&ctx, add(mug, 3)).await.unwrap();

        assert!(CartService::remove_snapshot_lines_on(&db, &snapshot).await.is_err());
        let snapshot = service.snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.lines[0].quantity, 5);
    }
}
