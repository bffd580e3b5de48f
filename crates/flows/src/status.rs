//! Status flow
//!
//! Single-turn lookup of the customer's most recent active job. Always
//! terminal; there is nothing to accumulate across turns.

use async_trait::async_trait;

use chatdesk_core::{format_money, AppointmentStatus, FlowData, FlowId};

use crate::engine::FlowDeps;
use crate::{Flow, FlowError, StepOutcome, TurnContext};

pub struct StatusFlow;

#[async_trait]
impl Flow for StatusFlow {
    fn id(&self) -> FlowId {
        FlowId::Status
    }

    async fn handle(
        &self,
        step: &str,
        _message: &str,
        _data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        if step != "start" {
            return Err(FlowError::UnknownStep {
                flow: FlowId::Status,
                step: step.to_string(),
            });
        }

        let recent = deps
            .appointments
            .most_recent_active(&ctx.business_id, &ctx.customer_phone)
            .await?;

        let Some(job) = recent else {
            return Ok(StepOutcome::done(
                "I couldn't find an active job for your number. If you recently booked, \
                 give us a moment to register it, or reply 'help' to reach our team.",
            ));
        };

        let mut lines = vec![
            format!("Here's the latest on your {}:", job.service_name),
            format!("Status: {}", describe_status(job.status)),
            format!(
                "Due: {}{}",
                job.date,
                job.time.as_deref().map(|t| format!(" at {t}")).unwrap_or_default()
            ),
        ];
        if job.status == AppointmentStatus::PendingPayment && job.fee > 0 {
            lines.push(format!("Outstanding payment: {}", format_money(job.fee)));
            if let Some(link) = &job.payment_link {
                lines.push(format!("Pay here: {link}"));
            }
        }
        Ok(StepOutcome::done(lines.join("\n")))
    }
}

fn describe_status(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::PendingPayment => "reserved, awaiting payment",
        AppointmentStatus::Confirmed => "confirmed",
        AppointmentStatus::Scheduled => "scheduled",
        AppointmentStatus::Completed => "completed",
        AppointmentStatus::Cancelled => "cancelled",
    }
}
