//! Thread-safe in-memory stores
//!
//! Keyed records live in `DashMap`s; list-shaped catalogs behind a
//! `parking_lot::RwLock`. All mutation goes through the trait methods, so the
//! concurrency discipline matches what a real backend would enforce.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use chatdesk_core::{
    Appointment, AppointmentStatus, AppointmentStore, BusinessDirectory, BusinessProfile,
    Conversation, ConversationStore, Customer, CustomerStore, EscalationEvent, EscalationSink,
    FaqCatalog, FaqEntry, FlowState, PaymentError, PaymentLinkProvider, PaymentLinkRequest,
    Service, ServiceCatalog, StoreError,
};

fn key(business_id: &str, phone: &str) -> (String, String) {
    (business_id.to_string(), phone.to_string())
}

// =============================================================================
// Conversations
// =============================================================================

#[derive(Default)]
pub struct MemoryConversationStore {
    records: DashMap<(String, String), Conversation>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .records
            .get(&key(business_id, phone))
            .map(|r| r.clone()))
    }

    async fn ensure(
        &self,
        business_id: &str,
        phone: &str,
        customer_name: Option<&str>,
    ) -> Result<Conversation, StoreError> {
        let mut entry = self
            .records
            .entry(key(business_id, phone))
            .or_insert_with(|| Conversation::new(business_id, phone, customer_name));
        if entry.customer_name.is_none() {
            if let Some(name) = customer_name {
                entry.customer_name = Some(name.to_string());
                entry.updated_at = Utc::now();
            }
        }
        Ok(entry.clone())
    }

    async fn set_flow_state(
        &self,
        business_id: &str,
        phone: &str,
        state: Option<FlowState>,
    ) -> Result<(), StoreError> {
        let mut entry = self.records.get_mut(&key(business_id, phone)).ok_or_else(|| {
            StoreError::NotFound(format!("conversation {business_id}/{phone}"))
        })?;
        // Targeted write: only the flow-state field and timestamp change
        entry.flow_state = state;
        entry.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Default)]
pub struct MemoryCustomerStore {
    records: DashMap<(String, String), Customer>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn find(&self, business_id: &str, phone: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .records
            .get(&key(business_id, phone))
            .map(|r| r.clone()))
    }

    async fn upsert(
        &self,
        business_id: &str,
        phone: &str,
        name: Option<&str>,
    ) -> Result<Customer, StoreError> {
        let mut entry = self
            .records
            .entry(key(business_id, phone))
            .or_insert_with(|| Customer::new(business_id, phone, name));
        if entry.name.is_none() {
            if let Some(name) = name {
                entry.name = Some(name.to_string());
                entry.updated_at = Utc::now();
            }
        }
        Ok(entry.clone())
    }
}

// =============================================================================
// Catalogs
// =============================================================================

#[derive(Default)]
pub struct MemoryServiceCatalog {
    services: RwLock<Vec<Service>>,
}

impl MemoryServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, service: Service) {
        self.services.write().push(service);
    }
}

#[async_trait]
impl ServiceCatalog for MemoryServiceCatalog {
    async fn list_active(&self, business_id: &str) -> Result<Vec<Service>, StoreError> {
        Ok(self
            .services
            .read()
            .iter()
            .filter(|s| s.business_id == business_id && s.active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryFaqCatalog {
    entries: RwLock<Vec<FaqEntry>>,
}

impl MemoryFaqCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: FaqEntry) {
        self.entries.write().push(entry);
    }
}

#[async_trait]
impl FaqCatalog for MemoryFaqCatalog {
    async fn list_active(&self, business_id: &str) -> Result<Vec<FaqEntry>, StoreError> {
        let mut entries: Vec<FaqEntry> = self
            .entries
            .read()
            .iter()
            .filter(|f| f.business_id == business_id && f.active)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(entries)
    }
}

// =============================================================================
// Appointments
// =============================================================================

#[derive(Default)]
pub struct MemoryAppointmentStore {
    records: RwLock<Vec<Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-built record, bypassing the trait (test setup)
    pub fn seed(&self, appointment: Appointment) {
        self.records.write().push(appointment);
    }

    pub fn all(&self) -> Vec<Appointment> {
        self.records.read().clone()
    }

    pub fn find(&self, id: Uuid) -> Option<Appointment> {
        self.records.read().iter().find(|a| a.id == id).cloned()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn create(&self, appointment: &Appointment) -> Result<(), StoreError> {
        tracing::info!(
            appointment_id = %appointment.id,
            status = %appointment.status,
            "appointment created"
        );
        self.records.write().push(appointment.clone());
        Ok(())
    }

    async fn most_recent_active(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|a| {
                a.business_id == business_id
                    && a.customer_phone == phone
                    && !a.status.is_terminal()
            })
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn most_recent_feedback_pending(
        &self,
        business_id: &str,
        phone: &str,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|a| {
                a.business_id == business_id
                    && a.customer_phone == phone
                    && a.status == AppointmentStatus::Completed
                    && a.feedback_request_sent
                    && a.feedback_rating.is_none()
            })
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn set_feedback_rating(
        &self,
        business_id: &str,
        appointment_id: Uuid,
        rating: u8,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|a| a.business_id == business_id && a.id == appointment_id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {appointment_id}")))?;
        record.feedback_rating = Some(rating);
        record.updated_at = Utc::now();
        tracing::info!(%appointment_id, rating, "feedback rating recorded");
        Ok(())
    }

    async fn list_for_date(
        &self,
        business_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|a| {
                a.business_id == business_id
                    && a.date == date
                    && a.status != AppointmentStatus::Cancelled
            })
            .cloned()
            .collect())
    }
}

// =============================================================================
// Business directory
// =============================================================================

#[derive(Default)]
pub struct MemoryBusinessDirectory {
    profiles: DashMap<String, BusinessProfile>,
}

impl MemoryBusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: BusinessProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl BusinessDirectory for MemoryBusinessDirectory {
    async fn get(&self, business_id: &str) -> Result<Option<BusinessProfile>, StoreError> {
        Ok(self.profiles.get(business_id).map(|p| p.clone()))
    }
}

// =============================================================================
// Payment provider and escalation sink
// =============================================================================

/// Payment-link provider double: hands out deterministic checkout URLs, or
/// fails every request when built with `failing()`
pub struct SimulatedPaymentProvider {
    fail: bool,
    requests: Mutex<Vec<PaymentLinkRequest>>,
}

impl SimulatedPaymentProvider {
    pub fn new() -> Self {
        Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PaymentLinkRequest> {
        self.requests.lock().clone()
    }
}

impl Default for SimulatedPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentLinkProvider for SimulatedPaymentProvider {
    async fn initialize(&self, request: PaymentLinkRequest) -> Result<String, PaymentError> {
        let reference = request.reference.clone();
        self.requests.lock().push(request);
        if self.fail {
            return Err(PaymentError::Unavailable("simulated outage".to_string()));
        }
        Ok(format!("https://pay.example.com/checkout/{reference}"))
    }
}

/// Escalation sink that records events for inspection
#[derive(Default)]
pub struct MemoryEscalationSink {
    events: Mutex<Vec<EscalationEvent>>,
}

impl MemoryEscalationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EscalationEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EscalationSink for MemoryEscalationSink {
    async fn record(&self, event: EscalationEvent) -> Result<(), StoreError> {
        tracing::warn!(
            kind = %event.kind,
            phone = %event.customer_phone,
            "escalation recorded"
        );
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::{FlowData, FlowId};

    const BIZ: &str = "biz-1";
    const PHONE: &str = "+2348012345678";

    #[tokio::test]
    async fn test_ensure_creates_then_reuses() {
        let store = MemoryConversationStore::new();
        let first = store.ensure(BIZ, PHONE, None).await.unwrap();
        assert!(first.customer_name.is_none());

        // Later turn supplies the missing name
        let second = store.ensure(BIZ, PHONE, Some("Ada")).await.unwrap();
        assert_eq!(second.customer_name.as_deref(), Some("Ada"));
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_set_flow_state_preserves_metadata() {
        let store = MemoryConversationStore::new();
        store.ensure(BIZ, PHONE, Some("Ada")).await.unwrap();

        let state = FlowState::new(FlowId::Booking, FlowData::default());
        store.set_flow_state(BIZ, PHONE, Some(state)).await.unwrap();
        let conv = store.get(BIZ, PHONE).await.unwrap().unwrap();
        assert!(conv.has_active_flow());
        assert_eq!(conv.customer_name.as_deref(), Some("Ada"));

        store.set_flow_state(BIZ, PHONE, None).await.unwrap();
        let conv = store.get(BIZ, PHONE).await.unwrap().unwrap();
        assert!(!conv.has_active_flow());
        // Clearing the flow never touches other fields
        assert_eq!(conv.customer_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_set_flow_state_requires_conversation() {
        let store = MemoryConversationStore::new();
        let err = store.set_flow_state(BIZ, PHONE, None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_customer_upsert_fills_missing_name_only() {
        let store = MemoryCustomerStore::new();
        store.upsert(BIZ, PHONE, None).await.unwrap();
        let customer = store.upsert(BIZ, PHONE, Some("Ada")).await.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Ada"));

        // An already-set name is not overwritten
        let customer = store.upsert(BIZ, PHONE, Some("Somebody Else")).await.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_catalog_filters_inactive_and_foreign() {
        let catalog = MemoryServiceCatalog::new();
        catalog.add(Service::new(BIZ, "Oil Change", 45, 25_000));
        let mut inactive = Service::new(BIZ, "Old Service", 30, 10_000);
        inactive.active = false;
        catalog.add(inactive);
        catalog.add(Service::new("biz-2", "Other Biz", 30, 10_000));

        let listed = catalog.list_active(BIZ).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Oil Change");
    }

    #[tokio::test]
    async fn test_faq_catalog_orders_by_priority() {
        let catalog = MemoryFaqCatalog::new();
        let mut low = FaqEntry::new(BIZ, "low", &[], "low answer");
        low.priority = 1;
        let mut high = FaqEntry::new(BIZ, "high", &[], "high answer");
        high.priority = 10;
        catalog.add(low);
        catalog.add(high);

        let listed = catalog.list_active(BIZ).await.unwrap();
        assert_eq!(listed[0].question, "high");
    }

    #[tokio::test]
    async fn test_most_recent_active_skips_terminal() {
        let store = MemoryAppointmentStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let done = Appointment::new(BIZ, PHONE, "Oil Change", date, AppointmentStatus::Completed);
        store.seed(done);
        assert!(store.most_recent_active(BIZ, PHONE).await.unwrap().is_none());

        let open = Appointment::new(BIZ, PHONE, "Detailing", date, AppointmentStatus::Scheduled);
        let open_id = open.id;
        store.seed(open);
        let found = store.most_recent_active(BIZ, PHONE).await.unwrap().unwrap();
        assert_eq!(found.id, open_id);
    }

    #[tokio::test]
    async fn test_feedback_pending_lookup_and_rating() {
        let store = MemoryAppointmentStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let mut job = Appointment::new(BIZ, PHONE, "Oil Change", date, AppointmentStatus::Completed);
        job.feedback_request_sent = true;
        let job_id = job.id;
        store.seed(job);

        let pending = store
            .most_recent_feedback_pending(BIZ, PHONE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.id, job_id);

        store.set_feedback_rating(BIZ, job_id, 5).await.unwrap();
        assert_eq!(store.find(job_id).unwrap().feedback_rating, Some(5));

        // Rated jobs no longer show up as pending
        assert!(store
            .most_recent_feedback_pending(BIZ, PHONE)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_for_date_excludes_cancelled() {
        let store = MemoryAppointmentStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        store.seed(Appointment::new(BIZ, PHONE, "A", date, AppointmentStatus::Confirmed));
        store.seed(Appointment::new(BIZ, PHONE, "B", date, AppointmentStatus::Cancelled));
        store.seed(Appointment::new(
            BIZ,
            PHONE,
            "C",
            NaiveDate::from_ymd_opt(2026, 9, 2).unwrap(),
            AppointmentStatus::Confirmed,
        ));

        let listed = store.list_for_date(BIZ, date).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].service_name, "A");
    }

    #[tokio::test]
    async fn test_simulated_payment_provider() {
        let provider = SimulatedPaymentProvider::new();
        let url = provider
            .initialize(PaymentLinkRequest {
                amount: 20_000,
                email: None,
                reference: "ref-1".to_string(),
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap();
        assert!(url.contains("ref-1"));
        assert_eq!(provider.requests().len(), 1);

        let failing = SimulatedPaymentProvider::failing();
        let err = failing
            .initialize(PaymentLinkRequest {
                amount: 20_000,
                email: None,
                reference: "ref-2".to_string(),
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Unavailable(_)));
    }
}
