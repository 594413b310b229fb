pub mod classifier;
pub mod contact;
pub mod engine;
pub mod limiter;
pub mod platform;
pub mod quota;
pub mod retry;
mod stream;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use classifier::{ClassifyError, Classifier, RuleClassifier};
pub use engine::DiscoveryEngine;
pub use limiter::RateLimiter;
pub use platform::{ExpansionFacts, FetchError, PlatformClient, SearchSort};
pub use quota::RunQuota;
pub use retry::RetryPolicy;
