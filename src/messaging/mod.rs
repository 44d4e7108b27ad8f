//! # Messaging
//!
//! Event bus seam for saga step events. Production deployments back this with
//! a durable, at-least-once broker; the in-memory bus covers tests and
//! single-process embedding with the same ordered-per-topic semantics.

pub mod bus;
pub mod consumer;
pub mod message;

pub use bus::{EventBus, EventStream, InMemoryEventBus};
pub use consumer::EventConsumer;
pub use message::SagaEvent;
