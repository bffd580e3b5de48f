//! Resumable multi-step conversation flows
//!
//! A flow is a named, persisted dialogue that accumulates structured data
//! across turns. The engine owns the flow lifecycle (start, resume,
//! interrupt, complete) and dispatches each inbound message to the flow
//! recorded on the conversation.
//!
//! The three flows are a closed set (`FlowId`); dispatch is an exhaustive
//! match, so adding a flow is a compile-time-checked change.

pub mod booking;
pub mod engine;
pub mod inspection;
pub mod resolve;
pub mod status;
pub mod when;

pub use booking::BookingFlow;
pub use engine::{FlowDeps, FlowEngine};
pub use inspection::InspectionFlow;
pub use status::StatusFlow;

use async_trait::async_trait;
use thiserror::Error;

use chatdesk_core::{FlowData, FlowId, ResponseAction, StoreError};

/// Errors raised while running a flow turn
///
/// Payment failures are not represented here: a failed link initialization
/// downgrades the booking outcome instead of failing the turn.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("flow {flow} has no step named '{step}'")]
    UnknownStep { flow: FlowId, step: String },

    #[error("business {0} has no service configured for category '{1}'")]
    MissingCategory(String, String),
}

/// Identity of the conversation a turn belongs to
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub business_id: String,
    pub customer_phone: String,
    /// Display name when the transport or conversation already knows it
    pub customer_name: Option<String>,
}

/// Result of one flow turn
///
/// `next_step: None` signals completion; the engine then clears the flow
/// state. Returned `data` is merged into the persisted state, never replacing
/// it wholesale, so later steps can rely on earlier contributions.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub response: String,
    pub next_step: Option<String>,
    pub data: FlowData,
    pub action: ResponseAction,
    pub media_urls: Vec<String>,
}

impl StepOutcome {
    /// Continue on `next_step` with this prompt
    pub fn ask(response: impl Into<String>, next_step: &str) -> Self {
        Self {
            response: response.into(),
            next_step: Some(next_step.to_string()),
            data: FlowData::default(),
            action: ResponseAction::Reply,
            media_urls: Vec::new(),
        }
    }

    /// Re-ask after invalid input; the step does not change
    pub fn retry(response: impl Into<String>, step: &str) -> Self {
        Self {
            action: ResponseAction::RequestInfo,
            ..Self::ask(response, step)
        }
    }

    /// Terminal outcome; the engine clears the flow state
    pub fn done(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            next_step: None,
            data: FlowData::default(),
            action: ResponseAction::Reply,
            media_urls: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: FlowData) -> Self {
        self.data = data;
        self
    }

    pub fn escalating(mut self) -> Self {
        self.action = ResponseAction::Escalate;
        self
    }
}

/// A single resumable dialogue implementation
#[async_trait]
pub trait Flow: Send + Sync {
    fn id(&self) -> FlowId;

    /// Run one turn at `step` with the accumulated `data`
    async fn handle(
        &self,
        step: &str,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError>;
}

/// Reply surfaced to the orchestrator after a flow turn
#[derive(Debug, Clone)]
pub struct FlowReply {
    pub response: String,
    pub action: ResponseAction,
    pub media_urls: Vec<String>,
    pub flow: FlowId,
    /// True when this turn completed the flow and the state was cleared
    pub completed: bool,
}
