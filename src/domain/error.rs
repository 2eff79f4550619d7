use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("missing webhook headers: {0}")]
    MissingHeaders(String),

    #[error("provider: {0}")]
    Provider(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Backing-store failure that is not a sqlx error (e.g. the in-memory store).
    #[error("store: {0}")]
    Store(String),
}

/// Why a claim was refused. Each variant maps to its own remediation in the wallet UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimRejection {
    #[error("order not found")]
    OrderNotFound,

    #[error("order is not fulfilled")]
    NotFulfilled,

    #[error("you are not authorized to claim this order")]
    NotPurchaser,

    #[error("order has already been claimed")]
    AlreadyClaimed,

    #[error("invalid wallet address: {0}")]
    InvalidWallet(String),
}

impl ClaimRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::OrderNotFound => "order_not_found",
            Self::NotFulfilled => "not_fulfilled",
            Self::NotPurchaser => "not_your_order",
            Self::AlreadyClaimed => "already_claimed",
            Self::InvalidWallet(_) => "invalid_wallet",
        }
    }
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("claim rejected: {0}")]
    Rejected(#[from] ClaimRejection),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
