//! # Repositories
//!
//! Narrow persistence operations over the entity models. All writes that
//! must be idempotent under concurrent duplicate deliveries lean on the
//! storage-layer unique constraints, never on check-then-insert alone.

pub mod customer;
pub mod lead;
pub mod notification_job;
pub mod order;

pub use customer::{CustomerRepository, NewCustomer};
pub use lead::{LeadRepository, NewLead};
pub use notification_job::NotificationJobRepository;
pub use order::{NewOrder, NewOrderItem, OrderRepository};
