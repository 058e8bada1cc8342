mod estimator;
mod ledger;

pub use estimator::{estimate, estimate_request_input_tokens};
pub use ledger::UsageLedger;
