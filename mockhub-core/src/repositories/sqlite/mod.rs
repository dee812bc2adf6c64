pub mod subscriptions;

pub use subscriptions::SqliteSubscriptionRepository;
