//! Flow engine: lifecycle and dispatch for the registered flows
//!
//! The engine owns the conversation's flow-state field. Starting a flow is
//! two-phase: the fresh state is persisted first, then the entry step runs
//! synchronously with the triggering message, so the customer gets the first
//! prompt in the same turn without the orchestrator re-entering itself.

use std::sync::Arc;

use chatdesk_core::{
    AppointmentStore, ConversationStore, CustomerStore, EscalationSink, FlowData, FlowId,
    FlowState, PaymentLinkProvider, ServiceCatalog,
};

use crate::{
    BookingFlow, Flow, FlowError, FlowReply, InspectionFlow, StatusFlow, TurnContext,
};

/// Collaborators handed to every flow turn
#[derive(Clone)]
pub struct FlowDeps {
    pub customers: Arc<dyn CustomerStore>,
    pub services: Arc<dyn ServiceCatalog>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub payments: Arc<dyn PaymentLinkProvider>,
    pub escalations: Arc<dyn EscalationSink>,
}

pub struct FlowEngine {
    conversations: Arc<dyn ConversationStore>,
    deps: FlowDeps,
    booking: BookingFlow,
    status: StatusFlow,
    inspection: InspectionFlow,
}

impl FlowEngine {
    pub fn new(conversations: Arc<dyn ConversationStore>, deps: FlowDeps) -> Self {
        Self {
            conversations,
            deps,
            booking: BookingFlow,
            status: StatusFlow,
            inspection: InspectionFlow,
        }
    }

    /// Dispatch a message to the conversation's active flow, if any
    ///
    /// Returns `None` when no flow is active, letting the caller fall through
    /// to FAQ and intent handling.
    pub async fn handle_message(
        &self,
        ctx: &TurnContext,
        message: &str,
    ) -> Result<Option<FlowReply>, FlowError> {
        let conversation = self
            .conversations
            .get(&ctx.business_id, &ctx.customer_phone)
            .await?;
        let Some(state) = conversation.and_then(|c| c.flow_state) else {
            return Ok(None);
        };
        self.run_and_persist(ctx, state, message).await.map(Some)
    }

    /// Start a flow and immediately run its entry step
    ///
    /// The state is written before the step runs; if the step then fails, the
    /// flow is still active and the next message lands on a known step.
    pub async fn start_flow(
        &self,
        ctx: &TurnContext,
        flow: FlowId,
        seed: FlowData,
        message: &str,
    ) -> Result<FlowReply, FlowError> {
        self.conversations
            .ensure(
                &ctx.business_id,
                &ctx.customer_phone,
                ctx.customer_name.as_deref(),
            )
            .await?;

        let state = FlowState::new(flow, seed);
        self.conversations
            .set_flow_state(&ctx.business_id, &ctx.customer_phone, Some(state.clone()))
            .await?;
        tracing::info!(%flow, phone = %ctx.customer_phone, "flow started");

        self.run_and_persist(ctx, state, message).await
    }

    /// Unconditionally clear any active flow; returns whether one existed
    pub async fn interrupt_flow(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<bool, FlowError> {
        let conversation = self.conversations.get(business_id, phone).await?;
        let had_flow = conversation.is_some_and(|c| c.has_active_flow());
        if had_flow {
            self.conversations
                .set_flow_state(business_id, phone, None)
                .await?;
            tracing::info!(phone, "flow interrupted");
        }
        Ok(had_flow)
    }

    async fn run_and_persist(
        &self,
        ctx: &TurnContext,
        state: FlowState,
        message: &str,
    ) -> Result<FlowReply, FlowError> {
        let flow: &dyn Flow = match state.flow {
            FlowId::Booking => &self.booking,
            FlowId::Status => &self.status,
            FlowId::Inspection => &self.inspection,
        };

        let outcome = match flow
            .handle(&state.step, message, &state.data, ctx, &self.deps)
            .await
        {
            Ok(outcome) => outcome,
            Err(err @ FlowError::UnknownStep { .. }) => {
                // Corrupt state; clear it so the customer is not stuck
                self.conversations
                    .set_flow_state(&ctx.business_id, &ctx.customer_phone, None)
                    .await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let flow_id = state.flow;
        let completed = outcome.next_step.is_none();
        let next_state = match outcome.next_step {
            Some(next) => {
                let mut state = state;
                state.advance(next, outcome.data);
                Some(state)
            }
            None => None,
        };
        self.conversations
            .set_flow_state(&ctx.business_id, &ctx.customer_phone, next_state)
            .await?;

        Ok(FlowReply {
            response: outcome.response,
            action: outcome.action,
            media_urls: outcome.media_urls,
            flow: flow_id,
            completed,
        })
    }
}
