//! Customer repository
//!
//! Customers are unique by (tenant, email). Duplicate creation is an
//! expected outcome surfaced as [`CustomerCreateOutcome::Duplicate`], not an
//! error; the handler maps it to 409.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::customer;

/// Fields accepted when creating a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub source: Option<String>,
}

/// Result of a creation attempt.
#[derive(Debug)]
pub enum CustomerCreateOutcome {
    Created(customer::Model),
    /// A customer with this (tenant, email) already exists.
    Duplicate(customer::Model),
}

/// Repository for customer database operations
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: DatabaseConnection,
}

impl CustomerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a customer, reporting a duplicate instead of inserting twice.
    ///
    /// The pre-check keeps the common duplicate path cheap; the unique
    /// constraint still backstops the race where two identical requests
    /// arrive together, in which case the loser re-reads the winner's row.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        new: NewCustomer,
    ) -> Result<CustomerCreateOutcome, sea_orm::DbErr> {
        if let Some(existing) = self.find_by_email(tenant_id, &new.email).await? {
            return Ok(CustomerCreateOutcome::Duplicate(existing));
        }

        let now = chrono::Utc::now().into();
        let row = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            name: Set(new.name),
            email: Set(new.email.clone()),
            phone: Set(new.phone),
            address: Set(new.address),
            source: Set(new.source),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match row.insert(&self.db).await {
            Ok(model) => Ok(CustomerCreateOutcome::Created(model)),
            Err(err) if is_unique_violation(&err) => {
                let winner = self
                    .find_by_email(tenant_id, &new.email)
                    .await?
                    .ok_or(err)?;
                Ok(CustomerCreateOutcome::Duplicate(winner))
            }
            Err(err) => Err(err),
        }
    }

    /// Find an existing customer, or create one from the given fields.
    ///
    /// Used by the order ingestion path, where a repeat purchase from a
    /// known email should link to the existing customer.
    pub async fn find_or_create(
        &self,
        tenant_id: Uuid,
        new: NewCustomer,
    ) -> Result<customer::Model, sea_orm::DbErr> {
        match self.create(tenant_id, new).await? {
            CustomerCreateOutcome::Created(model) | CustomerCreateOutcome::Duplicate(model) => {
                Ok(model)
            }
        }
    }

    pub async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<customer::Model>, sea_orm::DbErr> {
        customer::Entity::find()
            .filter(customer::Column::TenantId.eq(tenant_id))
            .filter(customer::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<customer::Model>, sea_orm::DbErr> {
        customer::Entity::find_by_id(id).one(&self.db).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretRegistry;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, PaginatorTrait};

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None).await.expect("Migrations failed");
        db
    }

    fn sample() -> NewCustomer {
        NewCustomer {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            address: None,
            source: Some("webhook".to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reports_duplicate_without_second_row() {
        let db = test_db().await;
        let tenant = SecretRegistry::new(db.clone())
            .issue_tenant(None)
            .await
            .unwrap();
        let repo = CustomerRepository::new(db.clone());

        let first = repo.create(tenant.id, sample()).await.unwrap();
        assert!(matches!(first, CustomerCreateOutcome::Created(_)));

        let second = repo.create(tenant.id, sample()).await.unwrap();
        assert!(matches!(second, CustomerCreateOutcome::Duplicate(_)));

        let count = customer::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_same_email_allowed_across_tenants() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db.clone());
        let tenant_a = registry.issue_tenant(None).await.unwrap();
        let tenant_b = registry.issue_tenant(None).await.unwrap();
        let repo = CustomerRepository::new(db);

        let a = repo.create(tenant_a.id, sample()).await.unwrap();
        let b = repo.create(tenant_b.id, sample()).await.unwrap();

        assert!(matches!(a, CustomerCreateOutcome::Created(_)));
        assert!(matches!(b, CustomerCreateOutcome::Created(_)));
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let db = test_db().await;
        let tenant = SecretRegistry::new(db.clone())
            .issue_tenant(None)
            .await
            .unwrap();
        let repo = CustomerRepository::new(db);

        let first = repo.find_or_create(tenant.id, sample()).await.unwrap();
        let second = repo.find_or_create(tenant.id, sample()).await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
