use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use storefront_payment_engine::{AuthApiError, PaymentFlowError};
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
    #[error("Could not serialize session token. {0}")]
    CouldNotSerializeSessionToken(String),
    #[error("{0}")]
    PaymentFlow(#[from] PaymentFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::WrongPassword => StatusCode::FORBIDDEN,
            },
            Self::PaymentFlow(e) => match e {
                PaymentFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::OrderAlreadyExists(_) => StatusCode::CONFLICT,
                PaymentFlowError::InvalidOrder(_, _) => StatusCode::BAD_REQUEST,
                PaymentFlowError::OrderNotRefundable { .. } => StatusCode::CONFLICT,
                PaymentFlowError::RefundWindowExpired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PaymentFlowError::InvalidRefundAmount(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::InvalidStatusChange { .. } => StatusCode::CONFLICT,
                PaymentFlowError::GatewayError(_) => StatusCode::BAD_GATEWAY,
                PaymentFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CouldNotSerializeSessionToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
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
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Session token is invalid. {0}")]
    ValidationError(String),
    #[error("Session token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Admin user not found.")]
    UserNotFound,
    #[error("Incorrect admin password.")]
    WrongPassword,
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::UserNotFound => Self::AuthenticationError(AuthError::UserNotFound),
            AuthApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
