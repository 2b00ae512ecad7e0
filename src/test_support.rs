//! 服务层测试公共夹具: SQLite 内存库 + 真实迁移

use crate::entities::{
    BusinessStatus, DiscountType, ProductStatus, business_entity as businesses,
    coupon_entity as coupons, order_entity as orders, order_item_entity as order_items,
    product_entity as products,
};
use crate::models::{AddCartItemRequest, AuthContext, Role};
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, Set,
};

pub const CUSTOMER_ID: i64 = 100;
pub const OTHER_CUSTOMER_ID: i64 = 101;
pub const SELLER_ID: i64 = 200;
pub const OTHER_SELLER_ID: i64 = 201;
pub const ADMIN_ID: i64 = 1;

pub async fn setup_db() -> DatabaseConnection {
    // 内存库每个连接各自独立, 必须单连接
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub fn customer() -> AuthContext {
    AuthContext::new(CUSTOMER_ID, Role::Customer)
}

pub fn other_customer() -> AuthContext {
    AuthContext::new(OTHER_CUSTOMER_ID, Role::Customer)
}

pub fn seller() -> AuthContext {
    AuthContext::new(SELLER_ID, Role::Seller)
}

pub fn other_seller() -> AuthContext {
    AuthContext::new(OTHER_SELLER_ID, Role::Seller)
}

pub fn admin() -> AuthContext {
    AuthContext::new(ADMIN_ID, Role::Admin)
}

pub fn add(product_id: i64, quantity: i32) -> AddCartItemRequest {
    AddCartItemRequest {
        product_id,
        quantity,
    }
}

pub async fn seed_business(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> businesses::Model {
    businesses::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.to_string()),
        status: Set(BusinessStatus::Approved),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_product(
    db: &DatabaseConnection,
    business_id: i64,
    name: &str,
    price: i64,
) -> products::Model {
    let now = Utc::now();
    products::ActiveModel {
        business_id: Set(business_id),
        name: Set(name.to_string()),
        price: Set(price),
        image: Set(Some(format!("{}.jpg", name.to_lowercase()))),
        stock_quantity: Set(50),
        status: Set(ProductStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn load_product(db: &DatabaseConnection, product_id: i64) -> products::ActiveModel {
    products::Entity::find_by_id(product_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .into_active_model()
}

pub async fn set_product_status(db: &DatabaseConnection, product_id: i64, status: ProductStatus) {
    let mut am = load_product(db, product_id).await;
    am.status = Set(status);
    am.update(db).await.unwrap();
}

pub async fn set_product_price(db: &DatabaseConnection, product_id: i64, price: i64) {
    let mut am = load_product(db, product_id).await;
    am.price = Set(price);
    am.update(db).await.unwrap();
}

/// 直接写库的优惠券, 有效期为当前时间前后各一天
pub async fn seed_coupon(
    db: &DatabaseConnection,
    business_id: i64,
    code: &str,
    discount_type: DiscountType,
    discount_value: i64,
) -> coupons::Model {
    let now = Utc::now();
    coupons::ActiveModel {
        business_id: Set(business_id),
        code: Set(code.to_string()),
        discount_type: Set(discount_type),
        discount_value: Set(discount_value),
        min_purchase: Set(0),
        product_id: Set(None),
        start_date: Set(now - Duration::days(1)),
        end_date: Set(now + Duration::days(1)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn count_orders(db: &DatabaseConnection) -> u64 {
    orders::Entity::find().count(db).await.unwrap()
}

pub async fn count_order_items(db: &DatabaseConnection) -> u64 {
    order_items::Entity::find().count(db).await.unwrap()
}

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_jwt() -> crate::utils::JwtService {
    crate::utils::JwtService::new(TEST_JWT_SECRET, 3600)
}

/// Authorization 请求头
pub fn bearer(ctx: &AuthContext) -> (&'static str, String) {
    let token = test_jwt()
        .generate_access_token(ctx.user_id, ctx.role)
        .unwrap();
    ("Authorization", format!("Bearer {token}"))
}
