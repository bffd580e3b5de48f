//! Domain types for the chat automation engine
//!
//! Everything here is owned by the engine's contract with its callers: the
//! conversation record and its embedded flow state, the read-only catalog
//! types (services, FAQs, business profile), and the appointment/customer
//! records the flows create.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// =============================================================================
// Flow state
// =============================================================================

/// Identifier for a multi-turn guided dialogue
///
/// Closed set: adding a flow is a compile-time-checked exhaustive case in the
/// engine dispatch, never a silently ignored string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowId {
    Booking,
    Status,
    Inspection,
}

impl FlowId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Status => "status",
            Self::Inspection => "inspection",
        }
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data accumulated across the turns of an active flow
///
/// Fields are only ever filled in, never cleared, while the flow is alive:
/// `merge` takes the union of the current state and a turn's contribution so
/// every step can rely on all prior steps' fields being present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Resolved price in minor currency units (advisory until confirmation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_details: Option<String>,
    /// Open extension point for flow-private scratch values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl FlowData {
    /// Merge a turn's contribution into the accumulated state
    ///
    /// Only fields the incoming turn actually set are written; previously
    /// accumulated fields survive untouched.
    pub fn merge(&mut self, incoming: FlowData) {
        macro_rules! take_if_set {
            ($($field:ident),*) => {
                $(if incoming.$field.is_some() {
                    self.$field = incoming.$field;
                })*
            };
        }
        take_if_set!(
            service_id,
            service_name,
            service_category,
            duration_minutes,
            price,
            location,
            date,
            time,
            customer_name,
            car_details
        );
        self.extras.extend(incoming.extras);
    }
}

/// Persisted state of the single active flow of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowState {
    pub flow: FlowId,
    /// Step name, defined privately by the flow implementation
    pub step: String,
    pub data: FlowData,
    pub last_updated: DateTime<Utc>,
}

impl FlowState {
    /// Fresh state at the flow's entry step, optionally seeded with data
    pub fn new(flow: FlowId, seed: FlowData) -> Self {
        Self {
            flow,
            step: "start".to_string(),
            data: seed,
            last_updated: Utc::now(),
        }
    }

    /// Advance to a new step, merging the turn's data contribution
    pub fn advance(&mut self, step: String, data: FlowData) {
        self.step = step;
        self.data.merge(data);
        self.last_updated = Utc::now();
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// A customer conversation, identified by (business id, customer phone)
///
/// Flow state lives in its own field rather than inside `metadata`, so
/// clearing a flow is structurally incapable of clobbering other metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub business_id: String,
    pub customer_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// At most one active flow per conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_state: Option<FlowState>,
    /// Opaque caller-owned metadata, preserved verbatim across flow changes
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(business_id: &str, customer_phone: &str, customer_name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            business_id: business_id.to_string(),
            customer_phone: customer_phone.to_string(),
            customer_name: customer_name.map(str::to_string),
            flow_state: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_active_flow(&self) -> bool {
        self.flow_state.is_some()
    }
}

// =============================================================================
// Catalog types (read-only to the engine)
// =============================================================================

/// Per-location price override for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub location: String,
    /// Minor currency units
    pub price: i64,
}

/// A bookable service offered by a business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub business_id: String,
    pub name: String,
    pub duration_minutes: u32,
    /// Base price in minor currency units
    pub price: i64,
    pub category: String,
    pub active: bool,
    #[serde(default)]
    pub pricing_rules: Vec<PricingRule>,
    /// Flat deposit required to confirm a booking; always takes precedence
    /// over a matched location price, even a larger one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment_fee: Option<i64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl Service {
    pub fn new(business_id: &str, name: &str, duration_minutes: u32, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id: business_id.to_string(),
            name: name.to_string(),
            duration_minutes,
            price,
            category: "General".to_string(),
            active: true,
            pricing_rules: Vec::new(),
            commitment_fee: None,
            image_urls: Vec::new(),
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn commitment_fee(mut self, fee: i64) -> Self {
        self.commitment_fee = Some(fee);
        self
    }

    pub fn pricing_rule(mut self, location: &str, price: i64) -> Self {
        self.pricing_rules.push(PricingRule {
            location: location.to_string(),
            price,
        });
        self
    }

    pub fn image_url(mut self, url: &str) -> Self {
        self.image_urls.push(url.to_string());
        self
    }

    pub fn has_location_pricing(&self) -> bool {
        !self.pricing_rules.is_empty()
    }
}

/// A business-configured question/keyword/answer triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: Uuid,
    pub business_id: String,
    pub question: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub answer: String,
    pub active: bool,
    /// Orders evaluation only; the maximum score always wins
    pub priority: i32,
}

impl FaqEntry {
    pub fn new(business_id: &str, question: &str, keywords: &[&str], answer: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id: business_id.to_string(),
            question: question.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            answer: answer.to_string(),
            active: true,
            priority: 0,
        }
    }
}

/// Weekly opening hours entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub day: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
    #[serde(default)]
    pub closed: bool,
}

/// Business identity and presentation data consumed by templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub hours: Vec<DayHours>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_link: Option<String>,
}

impl BusinessProfile {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            address: None,
            hours: Vec::new(),
            review_link: None,
        }
    }
}

// =============================================================================
// Customer and appointment records
// =============================================================================

/// Customer record keyed by (business id, phone)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub business_id: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(business_id: &str, phone: &str, name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id: business_id.to_string(),
            phone: phone.to_string(),
            name: name.map(str::to_string),
            email: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Customer")
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Reserved, awaiting a deposit payment
    PendingPayment,
    Confirmed,
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Confirmed => "confirmed",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending_payment" => Self::PendingPayment,
            "confirmed" => Self::Confirmed,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }

    /// Terminal states are excluded from "active job" lookups
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appointment / job record created by the booking and inspection flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub business_id: String,
    pub customer_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub service_name: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    /// Deposit or quoted amount in minor currency units; zero means none due
    pub fee: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub feedback_request_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(
        business_id: &str,
        customer_phone: &str,
        service_name: &str,
        date: NaiveDate,
        status: AppointmentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id: business_id.to_string(),
            customer_phone: customer_phone.to_string(),
            customer_name: None,
            service_name: service_name.to_string(),
            date,
            time: None,
            duration_minutes: 60,
            status,
            fee: 0,
            payment_link: None,
            notes: None,
            feedback_request_sent: false,
            feedback_rating: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short id suffix used in customer-facing references (discount codes)
    pub fn short_ref(&self) -> String {
        let simple = self.id.simple().to_string();
        simple[simple.len() - 4..].to_uppercase()
    }
}

// =============================================================================
// Engine boundary types
// =============================================================================

/// Decoded inbound customer message plus minimal context
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub business_id: String,
    pub customer_phone: String,
    pub text: String,
    pub customer_name: Option<String>,
}

impl InboundMessage {
    pub fn new(business_id: &str, customer_phone: &str, text: &str) -> Self {
        Self {
            business_id: business_id.to_string(),
            customer_phone: customer_phone.to_string(),
            text: text.to_string(),
            customer_name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.customer_name = Some(name.to_string());
        self
    }
}

/// What the caller should do with the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    Reply,
    Escalate,
    /// The previous input was invalid and the same question stands
    RequestInfo,
}

/// Outbound decision handed back to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    /// 0-100
    pub confidence: u8,
    pub action: ResponseAction,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ProcessedReply {
    pub fn reply(response: impl Into<String>, confidence: u8) -> Self {
        Self {
            response: response.into(),
            media_urls: Vec::new(),
            confidence,
            action: ResponseAction::Reply,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn escalate(response: impl Into<String>, confidence: u8) -> Self {
        Self {
            response: response.into(),
            media_urls: Vec::new(),
            confidence,
            action: ResponseAction::Escalate,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_media(mut self, media_urls: Vec<String>) -> Self {
        self.media_urls = media_urls;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_data_merge_is_monotone() {
        let mut data = FlowData {
            service_name: Some("Oil Change".to_string()),
            duration_minutes: Some(45),
            ..FlowData::default()
        };

        data.merge(FlowData {
            date: Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()),
            ..FlowData::default()
        });

        // Prior fields survive, new field lands
        assert_eq!(data.service_name.as_deref(), Some("Oil Change"));
        assert_eq!(data.duration_minutes, Some(45));
        assert!(data.date.is_some());
    }

    #[test]
    fn test_flow_data_merge_overwrites_only_set_fields() {
        let mut data = FlowData {
            location: Some("Lekki".to_string()),
            ..FlowData::default()
        };
        data.merge(FlowData {
            location: Some("Ikeja".to_string()),
            ..FlowData::default()
        });
        assert_eq!(data.location.as_deref(), Some("Ikeja"));
    }

    #[test]
    fn test_flow_state_starts_at_start() {
        let state = FlowState::new(FlowId::Booking, FlowData::default());
        assert_eq!(state.step, "start");
        assert_eq!(state.flow, FlowId::Booking);
    }

    #[test]
    fn test_status_terminality() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::PendingPayment.is_terminal());
        assert!(!AppointmentStatus::Scheduled.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            AppointmentStatus::parse("pending_payment"),
            AppointmentStatus::PendingPayment
        );
        assert_eq!(AppointmentStatus::PendingPayment.as_str(), "pending_payment");
        // Unknown strings default to scheduled
        assert_eq!(AppointmentStatus::parse("???"), AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_appointment_short_ref() {
        let apt = Appointment::new(
            "biz-1",
            "+2348012345678",
            "Oil Change",
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            AppointmentStatus::Confirmed,
        );
        let short = apt.short_ref();
        assert_eq!(short.len(), 4);
        assert_eq!(short, short.to_uppercase());
    }

    #[test]
    fn test_service_builder() {
        let svc = Service::new("biz-1", "Pre-purchase Inspection", 90, 0)
            .category("Inspection")
            .commitment_fee(50_000)
            .pricing_rule("Lekki", 150_000);

        assert!(svc.has_location_pricing());
        assert_eq!(svc.commitment_fee, Some(50_000));
        assert_eq!(svc.category, "Inspection");
    }
}
