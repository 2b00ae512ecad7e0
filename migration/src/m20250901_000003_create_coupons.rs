use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_catalog_tables::{Businesses, Products};

/// Coupons (店铺优惠券)
/// - discount_type: percentage | fixed
/// - discount_value: percentage 时为整数百分比 (1-100), fixed 时为美分
/// - product_id: NULL 表示全店通用
#[derive(DeriveIden)]
pub enum Coupons {
    Table,
    Id,
    BusinessId,
    Code,
    DiscountType,
    DiscountValue,
    MinPurchase,
    ProductId,
    StartDate,
    EndDate,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Coupons::BusinessId).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::Code).string_len(32).not_null())
                    .col(ColumnDef::new(Coupons::DiscountType).string_len(16).not_null())
                    .col(ColumnDef::new(Coupons::DiscountValue).big_integer().not_null())
                    .col(
                        ColumnDef::new(Coupons::MinPurchase)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Coupons::ProductId).big_integer().null())
                    .col(
                        ColumnDef::new(Coupons::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Coupons::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Coupons::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupons_business")
                            .from(Coupons::Table, Coupons::BusinessId)
                            .to(Businesses::Table, Businesses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupons_product")
                            .from(Coupons::Table, Coupons::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // 优惠码全局唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupons_code_unique")
                    .table(Coupons::Table)
                    .col(Coupons::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupons_business")
                    .table(Coupons::Table)
                    .col(Coupons::BusinessId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Coupons::Table).to_owned())
            .await?;
        Ok(())
    }
}
