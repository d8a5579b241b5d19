use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use elurc_payment_engine::{OrderFlowError, RefundError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    RefundFailed(String),
    #[error("{0}")]
    RefundUnconfirmed(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::FORBIDDEN,
                AuthError::AdminDisabled => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RefundFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RefundUnconfirmed(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No admin token was provided.")]
    MissingToken,
    #[error("The admin token is invalid.")]
    InvalidToken,
    #[error("Admin access has not been configured on this server.")]
    AdminDisabled,
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(_) | StoreError::RefundNotFound(_) => Self::NoRecordFound(e.to_string()),
            StoreError::StatusConflict { .. } | StoreError::RefundInProgress(_) | StoreError::DuplicateOrder(_) => {
                Self::Conflict(e.to_string())
            },
            StoreError::IllegalRefundTransition { .. } => Self::Conflict(e.to_string()),
            StoreError::RefundExceedsOrder { .. } => Self::ValidationError(e.to_string()),
            StoreError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::InvalidOrder(_) | OrderFlowError::Transition(_) | OrderFlowError::NoDiscrepancy(_) => {
                Self::ValidationError(e.to_string())
            },
            OrderFlowError::Store(e) => e.into(),
        }
    }
}

impl From<RefundError> for ServerError {
    fn from(e: RefundError) -> Self {
        match e {
            RefundError::NotConfigured => Self::ConfigurationError(e.to_string()),
            RefundError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            RefundError::OrderNotRefundable(..) | RefundError::InvalidWallet(_) | RefundError::InvalidAmount(_) => {
                Self::ValidationError(e.to_string())
            },
            RefundError::RefundInProgress(_) => Self::Conflict(e.to_string()),
            RefundError::ExecutionFailed { .. } => Self::RefundFailed(e.to_string()),
            RefundError::Unconfirmed { .. } => Self::RefundUnconfirmed(e.to_string()),
            RefundError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use elurc_payment_engine::{
        db_types::{OrderId, OrderStatusType},
        payments::OrderStatusTransitionError,
    };

    use super::*;

    #[test]
    fn status_codes() {
        let id = OrderId::new("order-1");
        let e: ServerError = RefundError::RefundInProgress(id.clone()).into();
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        let e: ServerError = RefundError::InvalidAmount("too small".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        let e: ServerError = RefundError::ExecutionFailed { refund_number: "REF-1".into(), reason: "boom".into() }.into();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let e: ServerError = RefundError::Unconfirmed { refund_number: "REF-2".into(), signature: "5ig".into() }.into();
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
        let e: ServerError = RefundError::Store(StoreError::OrderNotFound(id.clone())).into();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        let forbidden = OrderStatusTransitionError::Forbidden {
            from: OrderStatusType::Fulfilled,
            to: OrderStatusType::Cancelled,
        };
        let e: ServerError = OrderFlowError::Transition(forbidden).into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        let e: ServerError = StoreError::DatabaseError("disk full".into()).into();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
