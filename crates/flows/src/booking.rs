//! Booking flow
//!
//! Guides a customer from "I want to book" to a created appointment:
//! service, optional location (for location-priced or inspection services),
//! date, time, and name if we do not already have one. Confirmation creates
//! the appointment and, when a fee is due, a payment link. A payment-link
//! failure never rolls the appointment back; the outcome downgrades to
//! reserved-plus-escalate instead.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use chatdesk_core::{
    format_money, Appointment, AppointmentStatus, EscalationEvent, FlowData, FlowId,
    PaymentLinkRequest, Service,
};

use crate::engine::FlowDeps;
use crate::when;
use crate::{resolve, Flow, FlowError, StepOutcome, TurnContext};

/// How many service names a failed match offers as examples
const SAMPLE_SERVICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BookingStep {
    Start,
    AskService,
    AskLocation,
    AskDate,
    AskTime,
    AskName,
}

impl BookingStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AskService => "ask_service",
            Self::AskLocation => "ask_location",
            Self::AskDate => "ask_date",
            Self::AskTime => "ask_time",
            Self::AskName => "ask_name",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "ask_service" => Some(Self::AskService),
            "ask_location" => Some(Self::AskLocation),
            "ask_date" => Some(Self::AskDate),
            "ask_time" => Some(Self::AskTime),
            "ask_name" => Some(Self::AskName),
            _ => None,
        }
    }
}

pub struct BookingFlow;

#[async_trait]
impl Flow for BookingFlow {
    fn id(&self) -> FlowId {
        FlowId::Booking
    }

    async fn handle(
        &self,
        step: &str,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let step = BookingStep::parse(step).ok_or_else(|| FlowError::UnknownStep {
            flow: FlowId::Booking,
            step: step.to_string(),
        })?;

        match step {
            BookingStep::Start => self.on_start(message, data, ctx, deps).await,
            BookingStep::AskService => self.on_ask_service(message, ctx, deps).await,
            BookingStep::AskLocation => self.on_ask_location(message, data, ctx, deps).await,
            BookingStep::AskDate => Ok(self.on_ask_date(message)),
            BookingStep::AskTime => self.on_ask_time(message, data, ctx, deps).await,
            BookingStep::AskName => self.on_ask_name(message, data, ctx, deps).await,
        }
    }
}

impl BookingFlow {
    /// Entry step: use seeded service data, recognize a service in the first
    /// message, or ask for one.
    async fn on_start(
        &self,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let services = deps.services.list_active(&ctx.business_id).await?;

        if data.service_name.is_some() {
            if let Some(service) = services.iter().find(|s| Some(s.id) == data.service_id) {
                return Ok(after_service_chosen(service));
            }
        }

        if let Some(service) = resolve::match_service(&services, message) {
            return Ok(after_service_chosen(service));
        }

        Ok(StepOutcome::ask(
            "What service would you like to book?",
            BookingStep::AskService.as_str(),
        ))
    }

    async fn on_ask_service(
        &self,
        message: &str,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let services = deps.services.list_active(&ctx.business_id).await?;

        match resolve::match_service(&services, message) {
            Some(service) => Ok(after_service_chosen(service)),
            None => {
                let samples: Vec<&str> = services
                    .iter()
                    .take(SAMPLE_SERVICES)
                    .map(|s| s.name.as_str())
                    .collect();
                let prompt = if samples.is_empty() {
                    "I couldn't find that service. What would you like to book?".to_string()
                } else {
                    format!(
                        "I couldn't find that service. We offer: {}. Which one would you like?",
                        samples.join(", ")
                    )
                };
                Ok(StepOutcome::retry(prompt, BookingStep::AskService.as_str()))
            }
        }
    }

    /// Location capture is advisory: a price is recorded when a pricing rule
    /// matches, but the flow moves on either way.
    async fn on_ask_location(
        &self,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let service = find_service(data, ctx, deps).await?;
        let price = service
            .as_ref()
            .and_then(|s| resolve::resolve_location_price(s, message));

        let contribution = FlowData {
            location: Some(message.trim().to_string()),
            price,
            ..FlowData::default()
        };

        let prompt = match price {
            Some(p) => format!(
                "Got it. The price for your area is {}. What date works for you? \
                 You can say 'today', 'tomorrow' or a date like 2026-09-15.",
                format_money(p)
            ),
            None => "Got it. What date works for you? You can say 'today', 'tomorrow' \
                     or a date like 2026-09-15."
                .to_string(),
        };
        Ok(StepOutcome::ask(prompt, BookingStep::AskDate.as_str()).with_data(contribution))
    }

    fn on_ask_date(&self, message: &str) -> StepOutcome {
        let today = Utc::now().date_naive();
        match when::parse_date(message, today) {
            Some(date) => StepOutcome::ask(
                "What time should we expect you? (e.g. 10am or 14:30)",
                BookingStep::AskTime.as_str(),
            )
            .with_data(FlowData {
                date: Some(date),
                ..FlowData::default()
            }),
            None => StepOutcome::retry(
                "Sorry, I didn't catch that date. You can say 'today', 'tomorrow' \
                 or a date like 2026-09-15.",
                BookingStep::AskDate.as_str(),
            ),
        }
    }

    async fn on_ask_time(
        &self,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let Some(minutes) = when::parse_time_minutes(message) else {
            return Ok(StepOutcome::retry(
                "Sorry, I didn't catch that time. Try something like 10am, 2:30pm or 14:30.",
                BookingStep::AskTime.as_str(),
            ));
        };

        let duration = data.duration_minutes.unwrap_or(60);
        if let Some(date) = data.date {
            let booked = deps.appointments.list_for_date(&ctx.business_id, date).await?;
            let conflict = booked.iter().any(|apt| {
                apt.time
                    .as_deref()
                    .and_then(when::parse_time_minutes)
                    .is_some_and(|start| {
                        when::windows_overlap(minutes, duration, start, apt.duration_minutes)
                    })
            });
            if conflict {
                return Ok(StepOutcome::retry(
                    format!(
                        "That time is already taken on {date}. Could you pick another time?"
                    ),
                    BookingStep::AskTime.as_str(),
                ));
            }
        }

        let contribution = FlowData {
            time: Some(message.trim().to_string()),
            ..FlowData::default()
        };

        let known_name = data
            .customer_name
            .clone()
            .or_else(|| ctx.customer_name.clone());
        match known_name {
            Some(name) => {
                let mut full = data.clone();
                full.merge(contribution.clone());
                full.customer_name = Some(name);
                let outcome = confirm_booking(&full, ctx, deps).await?;
                Ok(outcome.with_data(contribution))
            }
            None => Ok(StepOutcome::ask(
                "Great! What name should we put on the booking?",
                BookingStep::AskName.as_str(),
            )
            .with_data(contribution)),
        }
    }

    async fn on_ask_name(
        &self,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let contribution = FlowData {
            customer_name: Some(message.trim().to_string()),
            ..FlowData::default()
        };
        let mut full = data.clone();
        full.merge(contribution.clone());
        let outcome = confirm_booking(&full, ctx, deps).await?;
        Ok(outcome.with_data(contribution))
    }
}

/// Transition after a service is recognized: location-priced and inspection
/// services go through `ask_location`, everything else straight to the date.
fn after_service_chosen(service: &Service) -> StepOutcome {
    let contribution = FlowData {
        service_id: Some(service.id),
        service_name: Some(service.name.clone()),
        service_category: Some(service.category.clone()),
        duration_minutes: Some(service.duration_minutes),
        ..FlowData::default()
    };

    if service.has_location_pricing() || service.category.eq_ignore_ascii_case("inspection") {
        StepOutcome::ask(
            format!(
                "{} it is. Where are you located? This helps us confirm pricing.",
                service.name
            ),
            BookingStep::AskLocation.as_str(),
        )
        .with_data(contribution)
    } else {
        StepOutcome::ask(
            format!(
                "{} it is. What date works for you? You can say 'today', 'tomorrow' \
                 or a date like 2026-09-15.",
                service.name
            ),
            BookingStep::AskDate.as_str(),
        )
        .with_data(contribution)
    }
}

async fn find_service(
    data: &FlowData,
    ctx: &TurnContext,
    deps: &FlowDeps,
) -> Result<Option<Service>, FlowError> {
    if data.service_id.is_none() {
        return Ok(None);
    }
    let services = deps.services.list_active(&ctx.business_id).await?;
    Ok(services.into_iter().find(|s| Some(s.id) == data.service_id))
}

/// Terminal confirmation: upsert the customer, resolve the fee, create the
/// appointment, and attach a payment link when a fee is due.
async fn confirm_booking(
    data: &FlowData,
    ctx: &TurnContext,
    deps: &FlowDeps,
) -> Result<StepOutcome, FlowError> {
    let name = data.customer_name.as_deref();
    let customer = deps
        .customers
        .upsert(&ctx.business_id, &ctx.customer_phone, name)
        .await?;

    let service = find_service(data, ctx, deps).await?;
    let fee = match &service {
        Some(s) => resolve::resolve_fee(s, data.price),
        // Catalog entry gone mid-flow; fall back to any captured price
        None => data.price.filter(|p| *p > 0).unwrap_or(0),
    };

    let service_name = data.service_name.as_deref().unwrap_or("your service");
    let date = data.date.unwrap_or_else(|| Utc::now().date_naive());
    let time = data.time.as_deref().unwrap_or("anytime");

    let status = if fee > 0 {
        AppointmentStatus::PendingPayment
    } else {
        AppointmentStatus::Confirmed
    };
    let mut appointment = Appointment::new(
        &ctx.business_id,
        &ctx.customer_phone,
        service_name,
        date,
        status,
    );
    appointment.customer_name = data.customer_name.clone();
    appointment.time = data.time.clone();
    appointment.duration_minutes = data.duration_minutes.unwrap_or(60);
    appointment.fee = fee;
    if let Some(location) = &data.location {
        appointment.notes = Some(format!("Location: {location}"));
    }

    if fee == 0 {
        deps.appointments.create(&appointment).await?;
        tracing::info!(
            appointment_id = %appointment.id,
            service = service_name,
            %date,
            "booking confirmed"
        );
        return Ok(StepOutcome::done(format!(
            "Confirmed! Your {} is booked for {} at {}. See you then, {}!",
            service_name,
            date,
            time,
            customer.display_name()
        )));
    }

    let request = PaymentLinkRequest {
        amount: fee,
        email: customer.email.clone(),
        reference: appointment.id.simple().to_string(),
        metadata: json!({
            "appointment_id": appointment.id,
            "service": service_name,
            "business_id": ctx.business_id,
        }),
    };

    match deps.payments.initialize(request).await {
        Ok(url) => {
            appointment.payment_link = Some(url.clone());
            deps.appointments.create(&appointment).await?;
            tracing::info!(
                appointment_id = %appointment.id,
                service = service_name,
                fee,
                "booking reserved pending payment"
            );
            Ok(StepOutcome::done(format!(
                "Almost done, {}! Your {} on {} at {} is reserved. \
                 Pay the {} deposit to confirm: {}",
                customer.display_name(),
                service_name,
                date,
                time,
                format_money(fee),
                url
            )))
        }
        Err(err) => {
            // The appointment is kept as reserved; a human follows up for payment
            deps.appointments.create(&appointment).await?;
            tracing::warn!(
                appointment_id = %appointment.id,
                error = %err,
                "payment link initialization failed, escalating"
            );
            let event = EscalationEvent::new(
                &ctx.business_id,
                &ctx.customer_phone,
                "payment_link_failed",
                &format!("payment link failed for appointment {}: {err}", appointment.id),
            )
            .with_metadata(json!({ "appointment_id": appointment.id, "fee": fee }));
            deps.escalations.record(event).await?;

            Ok(StepOutcome::done(format!(
                "Your {} on {} at {} is reserved, {}. We couldn't generate a payment \
                 link right now; our team will reach out shortly to complete the {} deposit.",
                service_name,
                date,
                time,
                customer.display_name(),
                format_money(fee)
            ))
            .escalating())
        }
    }
}
