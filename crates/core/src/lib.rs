//! Core types and traits for the chat automation engine
//!
//! This crate provides the foundational pieces used across all other crates:
//! - Domain types (conversations, flow state, services, FAQs, appointments)
//! - Error types
//! - Collaborator traits for pluggable storage and external services

pub mod error;
pub mod money;
pub mod traits;
pub mod types;

pub use error::{PaymentError, StoreError};
pub use money::format_money;
pub use types::{
    Appointment, AppointmentStatus, BusinessProfile, Conversation, Customer, DayHours, FaqEntry,
    FlowData, FlowId, FlowState, InboundMessage, PricingRule, ProcessedReply, ResponseAction,
    Service,
};

pub use traits::{
    AppointmentStore, BusinessDirectory, ConversationStore, CustomerStore, EscalationEvent,
    EscalationSink, FaqCatalog, PaymentLinkProvider, PaymentLinkRequest, ServiceCatalog,
};
