//! CLI error types.

use std::fmt;

use error_stack::Report;
use rtb_exchange_common::error::ExchangeError;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file error
    Config(String),
    /// IO error
    Io(std::io::Error),
    /// JSON parsing error
    Json(String),
    /// The auction request failed validation
    Validation(String),
    /// Adapter or exchange failure
    Exchange(String),
    /// Logger could not be installed
    Logger(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(msg) => write!(f, "JSON error: {}", msg),
            CliError::Validation(msg) => write!(f, "Invalid request: {}", msg),
            CliError::Exchange(msg) => write!(f, "Exchange error: {}", msg),
            CliError::Logger(msg) => write!(f, "Logger error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err.to_string())
    }
}

impl From<Report<ExchangeError>> for CliError {
    fn from(report: Report<ExchangeError>) -> Self {
        log::debug!("{report:?}");
        match report.current_context() {
            ExchangeError::Configuration { message } => CliError::Config(message.clone()),
            ExchangeError::InvalidRequest { message } => CliError::Validation(message.clone()),
            other => CliError::Exchange(other.to_string()),
        }
    }
}
