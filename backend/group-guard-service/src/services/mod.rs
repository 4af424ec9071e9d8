pub mod classifier;
pub mod notices;
pub mod remediation;
pub mod warning_ledger;

pub use classifier::{ClassifyContext, Classifier};
pub use remediation::{
    RemediationExecutor, RemediationReport, RemediationStep, StepKind, StepOutcome,
};
pub use warning_ledger::{LedgerDecision, WarningLedger};
