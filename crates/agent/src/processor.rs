//! Message processor
//!
//! Single entry point for an inbound message. The per-message pipeline runs
//! in strict order: global interrupt check, active-flow dispatch, FAQ
//! short-circuit, service-name auto-booking, numeric rating capture, intent
//! fallback. Any error escaping the pipeline is caught at this boundary and
//! converted into a safe escalation reply; the customer always gets an
//! answer.
//!
//! Messages for the same conversation are serialized through a
//! per-(business, phone) mutex so near-simultaneous arrivals cannot race on
//! the flow-state read-modify-write.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tokio::sync::Mutex;

use chatdesk_core::{
    AppointmentStore, BusinessDirectory, ConversationStore, CustomerStore, EscalationEvent,
    EscalationSink, FaqCatalog, FlowData, FlowId, InboundMessage, PaymentLinkProvider,
    ProcessedReply, Service, ServiceCatalog,
};
use chatdesk_flows::{resolve, FlowDeps, FlowEngine, FlowReply, TurnContext};
use chatdesk_matching::{detect_intent, find_match, Intent};

use crate::templates;

/// Reset/greeting words that always clear an active flow when the message
/// starts with one of them
const INTERRUPT_PREFIXES: &[&str] = &[
    "hi", "hello", "hey", "good", "cancel", "stop", "reset", "menu", "start",
];

/// Confidence assigned to templated intent replies
const TEMPLATED_CONFIDENCE: u8 = 80;

/// Bare 1-5, optionally followed by "star"/"stars"
static RATING_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([1-5])\s*(?:stars?)?\s*$").expect("static rating regex"));

/// "replying to <something>" context marker
static REPLY_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)replying to\s+"?([^"\n]+)"?"#).expect("static context regex"));

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Minimum FAQ confidence for the short-circuit path
    pub faq_confidence_floor: u8,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            faq_confidence_floor: 60,
        }
    }
}

/// Every collaborator the processor (and the flows beneath it) consumes
#[derive(Clone)]
pub struct ProcessorDeps {
    pub conversations: Arc<dyn ConversationStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub services: Arc<dyn ServiceCatalog>,
    pub faqs: Arc<dyn FaqCatalog>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub directory: Arc<dyn BusinessDirectory>,
    pub payments: Arc<dyn PaymentLinkProvider>,
    pub escalations: Arc<dyn EscalationSink>,
}

pub struct MessageProcessor {
    config: ProcessorConfig,
    engine: FlowEngine,
    services: Arc<dyn ServiceCatalog>,
    faqs: Arc<dyn FaqCatalog>,
    appointments: Arc<dyn AppointmentStore>,
    directory: Arc<dyn BusinessDirectory>,
    escalations: Arc<dyn EscalationSink>,
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl MessageProcessor {
    pub fn new(config: ProcessorConfig, deps: ProcessorDeps) -> Self {
        let engine = FlowEngine::new(
            deps.conversations.clone(),
            FlowDeps {
                customers: deps.customers,
                services: deps.services.clone(),
                appointments: deps.appointments.clone(),
                payments: deps.payments,
                escalations: deps.escalations.clone(),
            },
        );
        Self {
            config,
            engine,
            services: deps.services,
            faqs: deps.faqs,
            appointments: deps.appointments,
            directory: deps.directory,
            escalations: deps.escalations,
            locks: DashMap::new(),
        }
    }

    /// Process one inbound message into one outbound decision
    ///
    /// Infallible by contract: internal errors are logged, escalated and
    /// replaced with a generic reply.
    pub async fn process(&self, message: &InboundMessage) -> ProcessedReply {
        let key = (
            message.business_id.clone(),
            message.customer_phone.clone(),
        );
        let guard = self.conversation_lock(&key);

        let reply = {
            let _serialized = guard.lock().await;
            match self.process_inner(message).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        phone = %message.customer_phone,
                        "message processing failed"
                    );
                    let event = EscalationEvent::new(
                        &message.business_id,
                        &message.customer_phone,
                        "processing_error",
                        &err.to_string(),
                    );
                    if let Err(record_err) = self.escalations.record(event).await {
                        tracing::error!(error = %record_err, "failed to record escalation");
                    }
                    ProcessedReply::escalate(templates::escalation_fallback(), 0)
                }
            }
        };

        // Evict the lock entry unless another task is still holding a handle,
        // otherwise the map grows by one entry per conversation ever seen
        drop(guard);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        reply
    }

    async fn process_inner(&self, message: &InboundMessage) -> anyhow::Result<ProcessedReply> {
        let ctx = TurnContext {
            business_id: message.business_id.clone(),
            customer_phone: message.customer_phone.clone(),
            customer_name: message.customer_name.clone(),
        };
        let text = message.text.trim();

        // 1. Interrupt: a reset word at message start always frees a stuck flow
        if is_interrupt(text) {
            let cleared = self
                .engine
                .interrupt_flow(&ctx.business_id, &ctx.customer_phone)
                .await?;
            if cleared {
                tracing::info!(phone = %ctx.customer_phone, "active flow interrupted");
            }
        }

        // 2. Active flow owns the message outright
        if let Some(reply) = self.engine.handle_message(&ctx, text).await? {
            return Ok(flow_reply_to_processed(reply, 100));
        }

        // 3. FAQ short-circuit; a weak partial match is kept for step 6
        let faqs = self.faqs.list_active(&ctx.business_id).await?;
        let faq_hit = find_match(text, &faqs);
        if let Some(hit) = &faq_hit {
            if hit.confidence >= self.config.faq_confidence_floor {
                return Ok(ProcessedReply::reply(hit.answer.clone(), hit.confidence));
            }
        }

        // 4. A recognized service name starts a booking immediately. A
        // message carrying a reply-context marker is referencing an earlier
        // message, not requesting a booking, so it skips this step.
        let services = self.services.list_active(&ctx.business_id).await?;
        let has_reply_context = extract_reply_context(text).is_some();
        if !has_reply_context {
            if let Some(service) = resolve::match_service(&services, text) {
                let seed = seed_from(service);
                let reply = self
                    .engine
                    .start_flow(&ctx, FlowId::Booking, seed, text)
                    .await?;
                return Ok(flow_reply_to_processed(reply, 100));
            }
        }

        // 5. Numeric rating, only when a feedback request is actually pending
        if let Some(reply) = self.try_capture_rating(&ctx, text).await? {
            return Ok(reply);
        }

        // 6. Intent fallback
        let profile = self.directory.get(&ctx.business_id).await?;
        let intent = detect_intent(text);
        tracing::debug!(intent = %intent, phone = %ctx.customer_phone, "intent fallback");

        let reply = match intent {
            Intent::Greeting => ProcessedReply::reply(
                templates::greeting(profile.as_ref(), &services, ctx.customer_name.as_deref()),
                TEMPLATED_CONFIDENCE,
            )
            .with_media(templates::catalog_media(&services)),
            Intent::Hours => ProcessedReply::reply(
                templates::hours_reply(profile.as_ref(), Utc::now()),
                TEMPLATED_CONFIDENCE,
            ),
            Intent::Pricing | Intent::Services => {
                self.catalog_reply(intent, text, &services)
            }
            Intent::Location => ProcessedReply::reply(
                templates::location_reply(profile.as_ref()),
                TEMPLATED_CONFIDENCE,
            ),
            Intent::Booking => {
                let reply = self
                    .engine
                    .start_flow(&ctx, FlowId::Booking, FlowData::default(), text)
                    .await?;
                flow_reply_to_processed(reply, TEMPLATED_CONFIDENCE)
            }
            Intent::Status => {
                let reply = self
                    .engine
                    .start_flow(&ctx, FlowId::Status, FlowData::default(), text)
                    .await?;
                flow_reply_to_processed(reply, TEMPLATED_CONFIDENCE)
            }
            Intent::Inspection => {
                let reply = self
                    .engine
                    .start_flow(&ctx, FlowId::Inspection, FlowData::default(), text)
                    .await?;
                flow_reply_to_processed(reply, TEMPLATED_CONFIDENCE)
            }
            Intent::Delivery => {
                ProcessedReply::reply(templates::delivery_reply(), TEMPLATED_CONFIDENCE)
            }
            Intent::Payment => {
                ProcessedReply::reply(templates::payment_reply(), TEMPLATED_CONFIDENCE)
            }
            Intent::Help => ProcessedReply::escalate(templates::help_reply(), 100),
            Intent::Unknown => match faq_hit {
                // Weak FAQ match beats a blind fallback
                Some(hit) => ProcessedReply::reply(hit.answer, hit.confidence),
                None => ProcessedReply::reply(templates::clarifying_fallback(), 0),
            },
        };

        // Surface the matched intent for the caller's inbox unless a flow
        // already claimed the metadata
        let reply = if reply.metadata.is_null() {
            reply.with_metadata(json!({ "intent": intent.as_str() }))
        } else {
            reply
        };
        Ok(reply)
    }

    /// Pricing/services reply, honoring a quoted-context service reference
    fn catalog_reply(&self, intent: Intent, text: &str, services: &[Service]) -> ProcessedReply {
        let quoted = extract_reply_context(text)
            .and_then(|q| resolve::match_service(services, &q).cloned());
        match quoted {
            Some(service) => {
                let media: Vec<String> = service.image_urls.iter().take(3).cloned().collect();
                ProcessedReply::reply(templates::pricing_for(&service), TEMPLATED_CONFIDENCE)
                    .with_media(media)
            }
            None => {
                let body = if intent == Intent::Pricing {
                    templates::pricing_reply(services)
                } else {
                    templates::services_reply(services)
                };
                ProcessedReply::reply(body, TEMPLATED_CONFIDENCE)
                    .with_media(templates::catalog_media(services))
            }
        }
    }

    async fn try_capture_rating(
        &self,
        ctx: &TurnContext,
        text: &str,
    ) -> anyhow::Result<Option<ProcessedReply>> {
        let Some(caps) = RATING_SHAPE.captures(text) else {
            return Ok(None);
        };
        let rating: u8 = caps[1].parse()?;

        let pending = self
            .appointments
            .most_recent_feedback_pending(&ctx.business_id, &ctx.customer_phone)
            .await?;
        // No feedback pending: a bare number is not a rating, fall through
        let Some(job) = pending else {
            return Ok(None);
        };

        self.appointments
            .set_feedback_rating(&ctx.business_id, job.id, rating)
            .await?;
        tracing::info!(appointment_id = %job.id, rating, "feedback rating captured");

        if rating >= 4 {
            let code = format!("SAVE5-{}", job.short_ref());
            let profile = self.directory.get(&ctx.business_id).await?;
            let review_link = profile.and_then(|p| p.review_link);
            return Ok(Some(ProcessedReply::reply(
                templates::thank_you_for_rating(&code, review_link.as_deref()),
                100,
            )));
        }

        let event = EscalationEvent::new(
            &ctx.business_id,
            &ctx.customer_phone,
            "low_rating",
            &format!("customer rated {rating}/5 for {}", job.service_name),
        )
        .with_metadata(json!({ "appointment_id": job.id, "rating": rating }));
        self.escalations.record(event).await?;

        Ok(Some(ProcessedReply::escalate(
            templates::apology_for_rating(),
            100,
        )))
    }

    fn conversation_lock(&self, key: &(String, String)) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn flow_reply_to_processed(reply: FlowReply, confidence: u8) -> ProcessedReply {
    let metadata = json!({
        "flow": reply.flow.as_str(),
        "completed": reply.completed,
    });
    ProcessedReply {
        response: reply.response,
        media_urls: reply.media_urls,
        confidence,
        action: reply.action,
        metadata,
    }
}

fn seed_from(service: &Service) -> FlowData {
    FlowData {
        service_id: Some(service.id),
        service_name: Some(service.name.clone()),
        service_category: Some(service.category.clone()),
        duration_minutes: Some(service.duration_minutes),
        ..FlowData::default()
    }
}

/// A reset word at the start of the message, on a word boundary
fn is_interrupt(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    INTERRUPT_PREFIXES.iter().any(|prefix| {
        lower
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().next().map_or(true, |c| !c.is_alphanumeric()))
    })
}

/// Pull a quoted service reference out of a "replying to" marker
///
/// Two shapes are recognized: a leading quoted line (`> Oil Change`) and the
/// inline phrase `replying to Oil Change`.
fn extract_reply_context(text: &str) -> Option<String> {
    if let Some(first) = text.lines().next() {
        if let Some(quoted) = first.strip_prefix("> ") {
            return Some(quoted.trim().to_string());
        }
    }
    REPLY_CONTEXT
        .captures(text)
        .map(|caps| caps[1].trim().trim_end_matches(['?', '!', '.', ',']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_word_boundary() {
        assert!(is_interrupt("hi"));
        assert!(is_interrupt("Hello there"));
        assert!(is_interrupt("CANCEL"));
        assert!(is_interrupt("stop."));
        assert!(is_interrupt("good morning"));
        // Embedded or prefixed forms do not count
        assert!(!is_interrupt("this is urgent"));
        assert!(!is_interrupt("history question"));
        assert!(!is_interrupt("status please"));
    }

    #[test]
    fn test_rating_shape() {
        for text in ["5", " 4 ", "3 stars", "1 star", "2stars"] {
            assert!(RATING_SHAPE.is_match(text), "{text} should be a rating");
        }
        for text in ["6", "0", "5 stars please", "rated 5", "5/5"] {
            assert!(!RATING_SHAPE.is_match(text), "{text} should not be a rating");
        }
    }

    #[tokio::test]
    async fn test_conversation_lock_evicted_after_turn() {
        use chatdesk_persistence::{
            MemoryAppointmentStore, MemoryBusinessDirectory, MemoryConversationStore,
            MemoryCustomerStore, MemoryEscalationSink, MemoryFaqCatalog, MemoryServiceCatalog,
            SimulatedPaymentProvider,
        };

        let deps = ProcessorDeps {
            conversations: Arc::new(MemoryConversationStore::new()),
            customers: Arc::new(MemoryCustomerStore::new()),
            services: Arc::new(MemoryServiceCatalog::new()),
            faqs: Arc::new(MemoryFaqCatalog::new()),
            appointments: Arc::new(MemoryAppointmentStore::new()),
            directory: Arc::new(MemoryBusinessDirectory::new()),
            payments: Arc::new(SimulatedPaymentProvider::new()),
            escalations: Arc::new(MemoryEscalationSink::new()),
        };
        let processor = MessageProcessor::new(ProcessorConfig::default(), deps);

        processor
            .process(&InboundMessage::new("biz-1", "+2348000000001", "hello"))
            .await;
        processor
            .process(&InboundMessage::new("biz-1", "+2348000000002", "hello"))
            .await;

        // Entries do not accumulate across conversations
        assert!(processor.locks.is_empty());
    }

    #[test]
    fn test_reply_context_extraction() {
        assert_eq!(
            extract_reply_context("> Oil Change\nhow much is this?").as_deref(),
            Some("Oil Change")
        );
        assert_eq!(
            extract_reply_context("replying to Oil Change, what's the price?").as_deref(),
            Some("Oil Change, what's the price")
        );
        assert_eq!(extract_reply_context("how much is an oil change"), None);
    }
}
