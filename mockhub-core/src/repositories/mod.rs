// src/repositories/mod.rs

pub mod sqlite;

pub use mockhub_common::traits::repository_traits::SubscriptionRepository;
pub use sqlite::SqliteSubscriptionRepository;
