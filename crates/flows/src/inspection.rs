//! Inspection flow
//!
//! Linear request-capture dialogue: location, car details, requested date,
//! then a scheduled appointment with everything encoded in the notes. Unlike
//! booking, a location-matched price is only ever a quote; nothing is charged
//! until staff review the request.

use async_trait::async_trait;
use chrono::Utc;

use chatdesk_core::{
    format_money, Appointment, AppointmentStatus, FlowData, FlowId, Service,
};

use crate::engine::FlowDeps;
use crate::when;
use crate::{resolve, Flow, FlowError, StepOutcome, TurnContext};

const INSPECTION_CATEGORY: &str = "inspection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InspectionStep {
    Start,
    AskLocation,
    AskCarDetails,
    AskDate,
}

impl InspectionStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AskLocation => "ask_location",
            Self::AskCarDetails => "ask_car_details",
            Self::AskDate => "ask_date",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "ask_location" => Some(Self::AskLocation),
            "ask_car_details" => Some(Self::AskCarDetails),
            "ask_date" => Some(Self::AskDate),
            _ => None,
        }
    }
}

pub struct InspectionFlow;

#[async_trait]
impl Flow for InspectionFlow {
    fn id(&self) -> FlowId {
        FlowId::Inspection
    }

    async fn handle(
        &self,
        step: &str,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let step = InspectionStep::parse(step).ok_or_else(|| FlowError::UnknownStep {
            flow: FlowId::Inspection,
            step: step.to_string(),
        })?;

        match step {
            InspectionStep::Start => Ok(StepOutcome::ask(
                "Happy to help with an inspection. Where is the vehicle located?",
                InspectionStep::AskLocation.as_str(),
            )),
            InspectionStep::AskLocation => Ok(StepOutcome::ask(
                "Noted. What car is it? Make, model and year help us prepare.",
                InspectionStep::AskCarDetails.as_str(),
            )
            .with_data(FlowData {
                location: Some(message.trim().to_string()),
                ..FlowData::default()
            })),
            InspectionStep::AskCarDetails => Ok(StepOutcome::ask(
                "Thanks. When would you like the inspection? You can say 'today', \
                 'tomorrow' or a date like 2026-09-15.",
                InspectionStep::AskDate.as_str(),
            )
            .with_data(FlowData {
                car_details: Some(message.trim().to_string()),
                ..FlowData::default()
            })),
            InspectionStep::AskDate => self.finalize_request(message, data, ctx, deps).await,
        }
    }
}

impl InspectionFlow {
    /// Terminal step: create the customer and a scheduled appointment carrying
    /// the request details; the quote (when resolvable) is advisory only.
    async fn finalize_request(
        &self,
        message: &str,
        data: &FlowData,
        ctx: &TurnContext,
        deps: &FlowDeps,
    ) -> Result<StepOutcome, FlowError> {
        let name = data
            .customer_name
            .as_deref()
            .or(ctx.customer_name.as_deref());
        let customer = deps
            .customers
            .upsert(&ctx.business_id, &ctx.customer_phone, name)
            .await?;

        let services = deps.services.list_active(&ctx.business_id).await?;
        let service: &Service = services
            .iter()
            .find(|s| Some(s.id) == data.service_id)
            .or_else(|| {
                services
                    .iter()
                    .find(|s| s.category.eq_ignore_ascii_case(INSPECTION_CATEGORY))
            })
            .ok_or_else(|| {
                FlowError::MissingCategory(ctx.business_id.clone(), "Inspection".to_string())
            })?;

        let location = data.location.as_deref().unwrap_or("not provided");
        let car = data.car_details.as_deref().unwrap_or("not provided");
        let quote = data
            .location
            .as_deref()
            .and_then(|loc| resolve::resolve_location_price(service, loc));

        let today = Utc::now().date_naive();
        let requested = message.trim();
        let date = when::parse_date(requested, today).unwrap_or(today);

        let mut appointment = Appointment::new(
            &ctx.business_id,
            &ctx.customer_phone,
            &service.name,
            date,
            AppointmentStatus::Scheduled,
        );
        appointment.customer_name = customer.name.clone();
        appointment.duration_minutes = service.duration_minutes;
        appointment.fee = quote.unwrap_or(0);
        appointment.notes = Some(format!(
            "Car: {car} | Location: {location} | Requested date: {requested} | Quote: {}",
            quote.map_or_else(|| "pending review".to_string(), format_money)
        ));
        deps.appointments.create(&appointment).await?;
        tracing::info!(
            appointment_id = %appointment.id,
            service = %service.name,
            quoted = quote.is_some(),
            "inspection request recorded"
        );

        let response = match quote {
            Some(price) => format!(
                "Your inspection request is in, {}! {} for the {} at {}, estimated at {}. \
                 Our team will confirm the final price and time with you.",
                customer.display_name(),
                service.name,
                car,
                location,
                format_money(price)
            ),
            None => format!(
                "Your inspection request is in, {}! {} for the {} at {}. \
                 A quote for your area is pending review; our team will get back to you shortly.",
                customer.display_name(),
                service.name,
                car,
                location
            ),
        };
        Ok(StepOutcome::done(response))
    }
}
