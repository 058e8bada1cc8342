mod cooldown;
mod quota;
mod selector;
mod store;
mod types;

pub use cooldown::{CooldownReason, CooldownRecord, CooldownRegistry};
pub use quota::{quota_key, QuotaCacheEntry, QuotaMonitor};
pub use selector::CredentialSelector;
pub use store::CredentialStore;
pub use types::{Credential, PersistedCredential};
