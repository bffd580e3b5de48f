//! Collaborator traits consumed by the engine
//!
//! The engine is persistence- and transport-agnostic: everything it reads or
//! writes goes through these traits. `chatdesk-persistence` ships in-memory
//! reference implementations; production callers wire their own backends.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{PaymentError, StoreError};
use crate::types::{
    Appointment, BusinessProfile, Conversation, Customer, FaqEntry, FlowState, Service,
};

/// Conversation records keyed by (business id, customer phone)
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Get the conversation, creating it if this is the first contact.
    /// A known customer name is recorded on creation and on later turns
    /// where it was previously missing.
    async fn ensure(
        &self,
        business_id: &str,
        phone: &str,
        customer_name: Option<&str>,
    ) -> Result<Conversation, StoreError>;

    /// Targeted update of the flow-state field only. `None` clears an active
    /// flow. Other conversation fields and metadata are never touched.
    async fn set_flow_state(
        &self,
        business_id: &str,
        phone: &str,
        state: Option<FlowState>,
    ) -> Result<(), StoreError>;
}

/// Customer records keyed by (business id, phone)
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find(&self, business_id: &str, phone: &str) -> Result<Option<Customer>, StoreError>;

    /// Create the customer if absent; fill in a missing name if one is known
    async fn upsert(
        &self,
        business_id: &str,
        phone: &str,
        name: Option<&str>,
    ) -> Result<Customer, StoreError>;
}

/// Read-only service catalog, owned by the admin/configuration surface
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn list_active(&self, business_id: &str) -> Result<Vec<Service>, StoreError>;
}

/// Read-only FAQ catalog, ordered by configured priority
#[async_trait]
pub trait FaqCatalog: Send + Sync {
    async fn list_active(&self, business_id: &str) -> Result<Vec<FaqEntry>, StoreError>;
}

/// Appointment / job records
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Most recent appointment for the customer not in a terminal state
    async fn most_recent_active(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Most recent completed job with a feedback request sent but no rating
    async fn most_recent_feedback_pending(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn set_feedback_rating(
        &self,
        business_id: &str,
        appointment_id: Uuid,
        rating: u8,
    ) -> Result<(), StoreError>;

    /// Non-cancelled appointments on a date, for availability conflict checks
    async fn list_for_date(
        &self,
        business_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// Business identity lookup for templates (hours, address, review link)
#[async_trait]
pub trait BusinessDirectory: Send + Sync {
    async fn get(&self, business_id: &str) -> Result<Option<BusinessProfile>, StoreError>;
}

/// Request to initialize a payment link for a booking deposit
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    /// Minor currency units
    pub amount: i64,
    pub email: Option<String>,
    pub reference: String,
    pub metadata: Value,
}

/// External payment-link initializer
#[async_trait]
pub trait PaymentLinkProvider: Send + Sync {
    /// Returns an authorization URL the customer can pay through
    async fn initialize(&self, request: PaymentLinkRequest) -> Result<String, PaymentError>;
}

/// Structured warning event surfaced to human staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub business_id: String,
    pub customer_phone: String,
    /// Short machine-readable kind ("low_rating", "payment_link_failed", ...)
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

impl EscalationEvent {
    pub fn new(business_id: &str, customer_phone: &str, kind: &str, message: &str) -> Self {
        Self {
            business_id: business_id.to_string(),
            customer_phone: customer_phone.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            metadata: Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sink for escalation events visible to human staff
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn record(&self, event: EscalationEvent) -> Result<(), StoreError>;
}
