use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("iPay credentials are not configured")]
    MissingCredentials,
    #[error("Token request failed. Error {status}. {message}")]
    TokenError { status: u16, message: String },
    #[error("Token response did not contain an access token")]
    TokenMissing,
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("All candidate {label} endpoints were exhausted. Last response: {last}")]
    EndpointsExhausted { label: &'static str, last: String },
    #[error("No known refund endpoint was accepted by the gateway. Last response: {last}")]
    RefundEndpointNotFound { last: String },
}
