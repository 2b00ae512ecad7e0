use crate::entities::{business_entity as businesses, product_entity as products};
use crate::error::{AppError, AppResult};
use sea_orm::{DatabaseConnection, EntityTrait};

/// 目录只读访问: 商品价格/库存/状态, 店铺归属
#[derive(Clone)]
pub struct CatalogService {
    pool: DatabaseConnection,
}

impl CatalogService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get_product(&self, product_id: i64) -> AppResult<products::Model> {
        products::Entity::find_by_id(product_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    /// 仅返回可售商品; 下架/删除的商品按不存在处理
    pub async fn get_active_product(&self, product_id: i64) -> AppResult<products::Model> {
        let product = self.get_product(product_id).await?;
        if !product.is_active() {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        Ok(product)
    }

    pub async fn get_business(&self, business_id: i64) -> AppResult<businesses::Model> {
        businesses::Entity::find_by_id(business_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".to_string()))
    }

    /// 校验店铺属于当前卖家
    pub async fn ensure_business_owner(
        &self,
        business_id: i64,
        user_id: i64,
    ) -> AppResult<businesses::Model> {
        let business = self.get_business(business_id).await?;
        if business.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(business)
    }
}
