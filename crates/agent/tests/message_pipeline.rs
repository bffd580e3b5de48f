//! End-to-end pipeline tests: inbound message in, outbound decision out,
//! against the in-memory stores.

use std::sync::Arc;

use chatdesk_agent::{MessageProcessor, ProcessorConfig, ProcessorDeps};
use chatdesk_core::{
    Appointment, AppointmentStatus, BusinessProfile, ConversationStore, FaqCatalog, FaqEntry,
    InboundMessage, ProcessedReply, ResponseAction, Service, StoreError,
};
use chatdesk_persistence::{
    MemoryAppointmentStore, MemoryBusinessDirectory, MemoryConversationStore, MemoryCustomerStore,
    MemoryEscalationSink, MemoryFaqCatalog, MemoryServiceCatalog, SimulatedPaymentProvider,
};
use chrono::NaiveDate;

const BIZ: &str = "autofix";
const PHONE: &str = "+2348012345678";

struct Harness {
    processor: MessageProcessor,
    conversations: Arc<MemoryConversationStore>,
    appointments: Arc<MemoryAppointmentStore>,
    escalations: Arc<MemoryEscalationSink>,
    directory: Arc<MemoryBusinessDirectory>,
    faqs: Arc<MemoryFaqCatalog>,
}

fn harness(services: Vec<Service>) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let conversations = Arc::new(MemoryConversationStore::new());
    let appointments = Arc::new(MemoryAppointmentStore::new());
    let escalations = Arc::new(MemoryEscalationSink::new());
    let faqs = Arc::new(MemoryFaqCatalog::new());
    let directory = Arc::new(MemoryBusinessDirectory::new());
    directory.insert(BusinessProfile::new(BIZ, "AutoFix Garage"));

    let catalog = Arc::new(MemoryServiceCatalog::new());
    for service in services {
        catalog.add(service);
    }

    let deps = ProcessorDeps {
        conversations: conversations.clone(),
        customers: Arc::new(MemoryCustomerStore::new()),
        services: catalog,
        faqs: faqs.clone(),
        appointments: appointments.clone(),
        directory: directory.clone(),
        payments: Arc::new(SimulatedPaymentProvider::new()),
        escalations: escalations.clone(),
    };
    Harness {
        processor: MessageProcessor::new(ProcessorConfig::default(), deps),
        conversations,
        appointments,
        escalations,
        directory,
        faqs,
    }
}

async fn send(h: &Harness, text: &str) -> ProcessedReply {
    h.processor
        .process(&InboundMessage::new(BIZ, PHONE, text))
        .await
}

#[tokio::test]
async fn test_faq_short_circuit() {
    let h = harness(vec![]);
    h.faqs.add(FaqEntry::new(
        BIZ,
        "what time do you close",
        &["closing", "hours"],
        "We close at 6pm, Monday to Saturday.",
    ));

    let reply = send(&h, "what are your hours").await;
    assert_eq!(reply.response, "We close at 6pm, Monday to Saturday.");
    assert!(reply.confidence >= 60);
    assert_eq!(reply.action, ResponseAction::Reply);
}

#[tokio::test]
async fn test_booking_happy_path() {
    let h = harness(vec![Service::new(BIZ, "Oil Change", 45, 25_000)]);

    send(&h, "book").await;
    send(&h, "Oil Change").await;
    send(&h, "tomorrow").await;
    send(&h, "10am").await;
    let reply = send(&h, "Chidi").await;

    assert!(reply.response.contains("Confirmed"));
    assert!(reply.response.contains("Oil Change"));
    assert!(!reply.response.contains("http"));
    assert_eq!(reply.action, ResponseAction::Reply);

    let created = h.appointments.all();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].status, AppointmentStatus::Confirmed);
    assert_eq!(created[0].customer_name.as_deref(), Some("Chidi"));
    assert!(created[0].payment_link.is_none());
}

#[tokio::test]
async fn test_booking_with_fee_produces_payment_link() {
    let service = Service::new(BIZ, "Oil Change", 45, 25_000).commitment_fee(20_000);
    let h = harness(vec![service]);

    send(&h, "book").await;
    send(&h, "Oil Change").await;
    send(&h, "tomorrow").await;
    send(&h, "10am").await;
    let reply = send(&h, "Chidi").await;

    assert!(reply.response.contains("https://"));
    let created = h.appointments.all();
    assert_eq!(created[0].status, AppointmentStatus::PendingPayment);
    assert_eq!(created[0].fee, 20_000);
    assert!(created[0].payment_link.is_some());
}

#[tokio::test]
async fn test_fee_precedence_commitment_over_location() {
    let service = Service::new(BIZ, "Pre-purchase Inspection", 90, 0)
        .category("Inspection")
        .commitment_fee(50_000)
        .pricing_rule("Lekki", 150_000);
    let h = harness(vec![service]);

    // The service name auto-starts the booking flow
    let reply = send(&h, "Pre-purchase Inspection").await;
    assert!(reply.response.contains("located"));
    assert_eq!(reply.confidence, 100);

    send(&h, "Lekki").await;
    send(&h, "tomorrow").await;
    send(&h, "9am").await;
    send(&h, "Emeka").await;

    let created = h.appointments.all();
    assert_eq!(created.len(), 1);
    // Commitment fee wins over the larger matched location price
    assert_eq!(created[0].fee, 50_000);
}

#[tokio::test]
async fn test_service_name_auto_booking() {
    let h = harness(vec![Service::new(BIZ, "Oil Change", 45, 25_000)]);

    let reply = send(&h, "oil change please").await;
    assert_eq!(reply.confidence, 100);
    assert!(reply.response.contains("date"));
    assert_eq!(reply.metadata["flow"], "booking");

    let conv = h.conversations.get(BIZ, PHONE).await.unwrap().unwrap();
    let state = conv.flow_state.unwrap();
    assert_eq!(state.data.service_name.as_deref(), Some("Oil Change"));
}

#[tokio::test]
async fn test_high_rating_returns_discount_code() {
    let h = harness(vec![]);
    let mut profile = BusinessProfile::new(BIZ, "AutoFix Garage");
    profile.review_link = Some("https://reviews.example.com/autofix".to_string());
    h.directory.insert(profile);

    let mut job = Appointment::new(
        BIZ,
        PHONE,
        "Oil Change",
        NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
        AppointmentStatus::Completed,
    );
    job.feedback_request_sent = true;
    let expected_code = format!("SAVE5-{}", job.short_ref());
    h.appointments.seed(job);

    let reply = send(&h, "5").await;
    assert!(reply.response.contains(&expected_code));
    assert!(reply.response.contains("reviews.example.com"));
    assert_eq!(reply.confidence, 100);
    assert_eq!(reply.action, ResponseAction::Reply);
}

#[tokio::test]
async fn test_low_rating_escalates() {
    let h = harness(vec![]);
    let mut job = Appointment::new(
        BIZ,
        PHONE,
        "Oil Change",
        NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
        AppointmentStatus::Completed,
    );
    job.feedback_request_sent = true;
    let job_id = job.id;
    h.appointments.seed(job);

    let reply = send(&h, "2 stars").await;
    assert_eq!(reply.action, ResponseAction::Escalate);
    assert!(reply.response.to_lowercase().contains("sorry"));

    assert_eq!(h.appointments.find(job_id).unwrap().feedback_rating, Some(2));
    let events = h.escalations.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "low_rating");
}

#[tokio::test]
async fn test_bare_number_without_pending_feedback_falls_through() {
    let h = harness(vec![]);

    let reply = send(&h, "3").await;
    // Not swallowed as a rating; lands on the clarifying fallback
    assert_eq!(reply.confidence, 0);
    assert_eq!(reply.action, ResponseAction::Reply);
    assert!(reply.response.contains("not sure"));
}

#[tokio::test]
async fn test_unknown_intent_fallback() {
    let h = harness(vec![]);
    let reply = send(&h, "qwertyuiop").await;
    assert_eq!(reply.confidence, 0);
    assert_eq!(reply.action, ResponseAction::Reply);
    assert!(!reply.response.is_empty());
}

#[tokio::test]
async fn test_help_intent_escalates_with_full_confidence() {
    let h = harness(vec![]);
    let reply = send(&h, "I want to speak to someone").await;
    assert_eq!(reply.confidence, 100);
    assert_eq!(reply.action, ResponseAction::Escalate);
    assert!(reply.response.to_lowercase().contains("human"));
}

#[tokio::test]
async fn test_greeting_includes_catalog() {
    let h = harness(vec![Service::new(BIZ, "Oil Change", 45, 25_000)]);
    let reply = send(&h, "hi").await;
    assert!(reply.response.contains("AutoFix Garage"));
    assert!(reply.response.contains("Oil Change"));
    assert_eq!(reply.confidence, 80);
}

#[tokio::test]
async fn test_interrupt_clears_active_flow() {
    let h = harness(vec![Service::new(BIZ, "Oil Change", 45, 25_000)]);

    send(&h, "book an appointment").await;
    let conv = h.conversations.get(BIZ, PHONE).await.unwrap().unwrap();
    assert!(conv.has_active_flow());

    send(&h, "cancel").await;
    let conv = h.conversations.get(BIZ, PHONE).await.unwrap().unwrap();
    assert!(!conv.has_active_flow());

    // The next ordinary message routes through FAQ/intent, not the old flow
    let reply = send(&h, "what do you offer").await;
    assert!(reply.response.contains("Oil Change"));
    assert_eq!(reply.confidence, 80);
}

#[tokio::test]
async fn test_quoted_context_resolves_specific_service() {
    let service = Service::new(BIZ, "Oil Change", 45, 25_000);
    let h = harness(vec![service]);

    let reply = send(&h, "> Oil Change\nhow much is this?").await;
    assert!(reply.response.contains("Oil Change"));
    assert!(reply.response.contains("₦250"));
    assert_eq!(reply.confidence, 80);
}

#[tokio::test]
async fn test_unrecognized_service_reprompts_with_samples() {
    let h = harness(vec![
        Service::new(BIZ, "Oil Change", 45, 25_000),
        Service::new(BIZ, "Brake Pads", 60, 40_000),
        Service::new(BIZ, "Wheel Alignment", 30, 15_000),
    ]);

    send(&h, "book").await;
    let reply = send(&h, "gold plating").await;

    // The catalog names are offered as examples and the question is re-asked
    assert!(reply.response.contains("couldn't find that service"));
    assert!(reply.response.contains("Oil Change"));
    assert!(reply.response.contains("Wheel Alignment"));
    assert_eq!(reply.action, ResponseAction::RequestInfo);

    let conv = h.conversations.get(BIZ, PHONE).await.unwrap().unwrap();
    assert_eq!(conv.flow_state.unwrap().step, "ask_service");
}

#[tokio::test]
async fn test_weak_faq_match_beats_generic_fallback() {
    let h = harness(vec![]);
    h.faqs.add(FaqEntry::new(
        BIZ,
        "do you fix gearbox faults",
        &["transmission"],
        "Yes, we handle gearbox and transmission work.",
    ));

    let reply = send(&h, "gearbox wahala fix am").await;

    // Too weak for the short-circuit, still better than the generic fallback
    assert_eq!(reply.response, "Yes, we handle gearbox and transmission work.");
    assert!(reply.confidence >= 40 && reply.confidence < 60);
    assert_eq!(reply.action, ResponseAction::Reply);
}

#[tokio::test]
async fn test_catalog_reply_attaches_service_images() {
    let h = harness(vec![Service::new(BIZ, "Oil Change", 45, 25_000)
        .image_url("https://cdn.example.com/oil-change.jpg")]);

    let reply = send(&h, "hi").await;
    assert!(reply.response.contains("Oil Change"));
    assert_eq!(
        reply.media_urls,
        vec!["https://cdn.example.com/oil-change.jpg"]
    );
}

#[tokio::test]
async fn test_store_failure_becomes_safe_escalation() {
    struct FailingFaqs;

    #[async_trait::async_trait]
    impl FaqCatalog for FailingFaqs {
        async fn list_active(&self, _business_id: &str) -> Result<Vec<FaqEntry>, StoreError> {
            Err(StoreError::Backend("faq table offline".to_string()))
        }
    }

    let conversations = Arc::new(MemoryConversationStore::new());
    let escalations = Arc::new(MemoryEscalationSink::new());
    let deps = ProcessorDeps {
        conversations,
        customers: Arc::new(MemoryCustomerStore::new()),
        services: Arc::new(MemoryServiceCatalog::new()),
        faqs: Arc::new(FailingFaqs),
        appointments: Arc::new(MemoryAppointmentStore::new()),
        directory: Arc::new(MemoryBusinessDirectory::new()),
        payments: Arc::new(SimulatedPaymentProvider::new()),
        escalations: escalations.clone(),
    };
    let processor = MessageProcessor::new(ProcessorConfig::default(), deps);

    let reply = processor
        .process(&InboundMessage::new(BIZ, PHONE, "what are your hours"))
        .await;
    // The raw error never reaches the customer
    assert_eq!(reply.action, ResponseAction::Escalate);
    assert!(!reply.response.contains("offline"));
    assert_eq!(escalations.events()[0].kind, "processing_error");
}
