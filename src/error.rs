use thiserror::Error;

/// Run-fatal failures. Per-invoice problems are not errors; they surface as
/// `UnmatchedReason` on the invoice's MatchResult.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("empty input: no invoices to reconcile")]
    EmptyInput,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
