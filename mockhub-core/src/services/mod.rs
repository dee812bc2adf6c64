pub mod validation;
pub mod subscription_service;
pub mod verification;
pub mod delivery;
pub mod event_service;

pub use subscription_service::SubscriptionService;
pub use verification::{PassReport, VerificationOutcome, VerificationService};
pub use delivery::{DeliveryService, RetryPolicy};
pub use event_service::{DeliveryReport, EventService};
