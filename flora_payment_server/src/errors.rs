use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use flora_settlement_engine::traits::{OrderApiError, SettlementError, WalletApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    SettlementError(#[from] SettlementError),
    #[error("{0}")]
    WalletError(#[from] WalletApiError),
    #[error("{0}")]
    OrderError(#[from] OrderApiError),
    #[error("Unspecified error. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::SettlementError(e) => match e {
                SettlementError::OrderNotFound(_) | SettlementError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                SettlementError::InvalidTransition { .. } => StatusCode::CONFLICT,
                SettlementError::DuplicateReview(_) => StatusCode::CONFLICT,
                SettlementError::ReviewNotAllowed(_) => StatusCode::CONFLICT,
                SettlementError::PaymentNotCompleted(_) => StatusCode::CONFLICT,
                SettlementError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
                SettlementError::InvalidRating(_) => StatusCode::BAD_REQUEST,
                SettlementError::EmptyOrder(_) => StatusCode::BAD_REQUEST,
                SettlementError::WalletError(e) => wallet_status_code(e),
                SettlementError::OrderError(OrderApiError::OrderNotFound(_)) => StatusCode::NOT_FOUND,
                SettlementError::OrderError(OrderApiError::QueryError(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::WalletError(e) => wallet_status_code(e),
            Self::OrderError(e) => match e {
                OrderApiError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderApiError::QueryError(_) => StatusCode::BAD_REQUEST,
                OrderApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) | Self::BackendError(_) | Self::IOError(_) | Self::Unspecified(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn wallet_status_code(e: &WalletApiError) -> StatusCode {
    match e {
        WalletApiError::InsufficientBalance { .. } => StatusCode::CONFLICT,
        WalletApiError::WalletNotFound(_) => StatusCode::NOT_FOUND,
        WalletApiError::NonPositiveAmount(_) => StatusCode::BAD_REQUEST,
        WalletApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
