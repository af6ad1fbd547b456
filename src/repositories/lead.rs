//! Lead repository
//!
//! Lead creation writes the lead row and its `created` event in one
//! transaction: the audit trail starts at birth or the lead does not exist.
//! Tag association runs after the transaction and is best-effort; a tagging
//! failure leaves the lead standing and is only logged.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{lead, lead_event, lead_tag, tag};

const DEFAULT_TAG_COLOR: &str = "#6b7280";

/// Fields accepted when creating a lead.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub source: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub logistic_status: Option<String>,
    pub cod_status: Option<String>,
    pub kpi_status: Option<String>,
}

/// Repository for lead database operations
#[derive(Debug, Clone)]
pub struct LeadRepository {
    db: DatabaseConnection,
}

impl LeadRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a lead together with its `created` event, atomically.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        new: NewLead,
    ) -> Result<lead::Model, sea_orm::DbErr> {
        let txn = self.db.begin().await?;

        let now = chrono::Utc::now().into();
        let lead_row = lead::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            source: Set(new.source.clone()),
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            notes: Set(new.notes),
            logistic_status: Set(new.logistic_status),
            cod_status: Set(new.cod_status),
            kpi_status: Set(new.kpi_status),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = lead_row.insert(&txn).await?;

        let event_row = lead_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            lead_id: Set(model.id),
            event_type: Set("created".to_string()),
            detail: Set(Some(serde_json::json!({ "source": new.source }))),
            created_at: Set(now),
        };
        event_row.insert(&txn).await?;

        txn.commit().await?;
        Ok(model)
    }

    /// Associate tags with a lead, creating missing tags with the default
    /// color. Best-effort: any failure is logged and swallowed.
    pub async fn attach_tags(&self, tenant_id: Uuid, lead_id: Uuid, tag_names: &[String]) {
        for name in tag_names {
            if let Err(err) = self.attach_tag(tenant_id, lead_id, name).await {
                tracing::warn!(
                    %lead_id,
                    tag = %name,
                    error = %err,
                    "Tag association failed, lead left without this tag"
                );
            }
        }
    }

    async fn attach_tag(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        name: &str,
    ) -> Result<(), sea_orm::DbErr> {
        let existing = tag::Entity::find()
            .filter(tag::Column::TenantId.eq(tenant_id))
            .filter(tag::Column::Name.eq(name))
            .one(&self.db)
            .await?;

        let tag_id = match existing {
            Some(t) => t.id,
            None => {
                let row = tag::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(tenant_id),
                    name: Set(name.to_string()),
                    color: Set(DEFAULT_TAG_COLOR.to_string()),
                    created_at: Set(chrono::Utc::now().into()),
                };
                row.insert(&self.db).await?.id
            }
        };

        let already_linked = lead_tag::Entity::find_by_id((lead_id, tag_id))
            .one(&self.db)
            .await?
            .is_some();
        if !already_linked {
            let link = lead_tag::ActiveModel {
                lead_id: Set(lead_id),
                tag_id: Set(tag_id),
            };
            link.insert(&self.db).await?;
        }

        Ok(())
    }

    /// Append an audit event to an existing lead. Best-effort for update
    /// paths: failures are logged, never propagated.
    pub async fn append_event(&self, lead_id: Uuid, event_type: &str, detail: Option<Value>) {
        let row = lead_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            lead_id: Set(lead_id),
            event_type: Set(event_type.to_string()),
            detail: Set(detail),
            created_at: Set(chrono::Utc::now().into()),
        };

        if let Err(err) = row.insert(&self.db).await {
            tracing::warn!(%lead_id, event_type, error = %err, "Lead event logging failed");
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<lead::Model>, sea_orm::DbErr> {
        lead::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn events_for(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<lead_event::Model>, sea_orm::DbErr> {
        lead_event::Entity::find()
            .filter(lead_event::Column::LeadId.eq(lead_id))
            .order_by_asc(lead_event::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    pub async fn tags_for(&self, lead_id: Uuid) -> Result<Vec<tag::Model>, sea_orm::DbErr> {
        let links = lead_tag::Entity::find()
            .filter(lead_tag::Column::LeadId.eq(lead_id))
            .all(&self.db)
            .await?;
        let tag_ids: Vec<Uuid> = links.into_iter().map(|l| l.tag_id).collect();

        tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .all(&self.db)
            .await
    }
}
