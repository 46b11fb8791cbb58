// lib.rs - Address risk screening for the wallet

pub mod api;
pub mod app_state;
pub mod cache;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod policy;
pub mod provider;
pub mod report;
pub mod risk;
pub mod scorer;
pub mod service;
pub mod store;
pub mod validation;

// Re-export common types
pub use app_state::{ScreeningContext, SharedScreeningContext};
pub use cache::{CacheStorage, KeyValueStorage, MemoryStorage, ScreeningCache, SCREENING_CACHE_TTL};
pub use classifier::AddressClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheBackend, Environment, ProviderKind, ScreeningConfig, ScreeningSettings};
pub use errors::{AmlError, AmlResult};
pub use metrics::{MetricsSnapshot, ScreeningMetrics};
pub use policy::{
    categorize_flags, decide, should_block, should_flag, Action, AmlStatus, Decision,
    FlagCategories, FlagCategory,
};
pub use provider::{HttpRiskProvider, MockRiskProvider, ProviderSettings, RiskProvider};
pub use report::generate_report;
pub use risk::{RiskLevel, RiskRating, ScreeningResult, WalletType};
pub use scorer::{RandomSource, RiskScorer, ScriptedRandom, SeededRandom, ThreadRandom};
pub use service::ScreeningService;
pub use store::{KeyValueStore, MemoryStore, NamespacedStore, StoreStats};
pub use validation::AddressValidator;
