//! In-memory implementations of the engine's storage and collaborator traits
//!
//! These back the test suites and make the engine runnable without external
//! infrastructure. Production deployments implement the `chatdesk-core`
//! traits against their own database and payment provider instead.

pub mod memory;

pub use memory::{
    MemoryAppointmentStore, MemoryBusinessDirectory, MemoryConversationStore,
    MemoryCustomerStore, MemoryEscalationSink, MemoryFaqCatalog, MemoryServiceCatalog,
    SimulatedPaymentProvider,
};
