//! Order repository
//!
//! Order ingestion is idempotent on (integration_id, external_order_id):
//! re-delivery of the same platform webhook updates the existing row and
//! replaces its line items instead of inserting duplicates. The unique
//! index backstops the race where two identical deliveries land together.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use crate::models::{order, order_item};

/// Normalized order fields extracted from a platform payload.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub external_order_id: String,
    pub customer_id: Option<Uuid>,
    pub status: String,
    pub total: f64,
    pub currency: String,
    pub tracking_number: Option<String>,
    pub placed_at: Option<DateTimeWithTimeZone>,
    pub items: Vec<NewOrderItem>,
}

/// One normalized line item.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub sku: Option<String>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Repository for order database operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: DatabaseConnection,
}

impl OrderRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Upsert an order by its external id, returning the row and whether it
    /// was newly created.
    ///
    /// On update the line items are replaced wholesale; platforms resend the
    /// full item list on every delivery, so a merge would only preserve
    /// stale rows.
    pub async fn upsert(
        &self,
        integration_id: Uuid,
        new: NewOrder,
    ) -> Result<(order::Model, bool), sea_orm::DbErr> {
        match self
            .find_by_external_id(integration_id, &new.external_order_id)
            .await?
        {
            Some(existing) => {
                let updated = self.update_in_place(existing, new).await?;
                Ok((updated, false))
            }
            None => match self.insert_fresh(integration_id, &new).await {
                Ok(model) => Ok((model, true)),
                Err(err) if is_unique_violation(&err) => {
                    // Lost the race against a concurrent identical delivery.
                    let winner = self
                        .find_by_external_id(integration_id, &new.external_order_id)
                        .await?
                        .ok_or(err)?;
                    let updated = self.update_in_place(winner, new).await?;
                    Ok((updated, false))
                }
                Err(err) => Err(err),
            },
        }
    }

    async fn insert_fresh(
        &self,
        integration_id: Uuid,
        new: &NewOrder,
    ) -> Result<order::Model, sea_orm::DbErr> {
        let now = chrono::Utc::now().into();
        let row = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(integration_id),
            customer_id: Set(new.customer_id),
            external_order_id: Set(new.external_order_id.clone()),
            status: Set(new.status.clone()),
            total: Set(new.total),
            currency: Set(new.currency.clone()),
            tracking_number: Set(new.tracking_number.clone()),
            courier_slug: Set(None),
            placed_at: Set(new.placed_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = row.insert(&self.db).await?;
        self.replace_items(model.id, &new.items).await?;
        Ok(model)
    }

    async fn update_in_place(
        &self,
        existing: order::Model,
        new: NewOrder,
    ) -> Result<order::Model, sea_orm::DbErr> {
        let order_id = existing.id;

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new.status);
        active.total = Set(new.total);
        active.currency = Set(new.currency);
        active.placed_at = Set(new.placed_at);
        if new.customer_id.is_some() {
            active.customer_id = Set(new.customer_id);
        }
        // A tracking number, once known, is never blanked by a re-delivery
        // that omits it.
        if new.tracking_number.is_some() {
            active.tracking_number = Set(new.tracking_number);
        }
        active.updated_at = Set(chrono::Utc::now().into());

        let model = active.update(&self.db).await?;
        self.replace_items(order_id, &new.items).await?;
        Ok(model)
    }

    async fn replace_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<(), sea_orm::DbErr> {
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&self.db)
            .await?;

        for item in items {
            let row = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                sku: Set(item.sku.clone()),
                title: Set(item.title.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
            };
            row.insert(&self.db).await?;
        }

        Ok(())
    }

    pub async fn find_by_external_id(
        &self,
        integration_id: Uuid,
        external_order_id: &str,
    ) -> Result<Option<order::Model>, sea_orm::DbErr> {
        order::Entity::find()
            .filter(order::Column::IntegrationId.eq(integration_id))
            .filter(order::Column::ExternalOrderId.eq(external_order_id))
            .one(&self.db)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, sea_orm::DbErr> {
        order::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn items_for(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, sea_orm::DbErr> {
        order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&self.db)
            .await
    }

    /// Persist the courier slug the tracking reconciler settled on.
    pub async fn set_courier(
        &self,
        order: order::Model,
        courier_slug: &str,
    ) -> Result<order::Model, sea_orm::DbErr> {
        let mut active: order::ActiveModel = order.into();
        active.courier_slug = Set(Some(courier_slug.to_string()));
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await
    }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err,
        sea_orm::DbErr::Query(sea_orm::RuntimeErr::SqlxError(sqlx))
        | sea_orm::DbErr::Exec(sea_orm::RuntimeErr::SqlxError(sqlx))
            if sqlx
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
    )
}
