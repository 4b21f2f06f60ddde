use arp_model::error::STATUS_BAD_GATEWAY;
use arp_model::{ErrorDetails, ServiceError};
use std::fmt;

/// Failure reported by a raw downstream client, before normalization.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("{code}: {message}")]
    Api {
        code: String,
        message: String,
        status_code: Option<u16>,
        details: Option<ErrorDetails>,
    },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl DownstreamError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            status_code: None,
            details: None,
        }
    }
}

/// Identity of one downstream dependency: its code prefix, human name and
/// base address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTarget {
    name: &'static str,
    display_name: &'static str,
    base_url: String,
}

impl ServiceTarget {
    pub fn new(
        name: &'static str,
        display_name: &'static str,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name,
            display_name,
            base_url: base_url.into(),
        }
    }

    pub fn atomic_executor(base_url: impl Into<String>) -> Self {
        Self::new("atomic_executor", "Atomic Executor", base_url)
    }

    pub fn composite_executor(base_url: impl Into<String>) -> Self {
        Self::new("composite_executor", "Composite Executor", base_url)
    }

    pub fn selection_service(base_url: impl Into<String>) -> Self {
        Self::new("selection_service", "Selection Service", base_url)
    }

    pub fn pdp(base_url: impl Into<String>) -> Self {
        Self::new("pdp", "PDP", base_url)
    }

    pub fn node_registry(base_url: impl Into<String>) -> Self {
        Self::new("node_registry", "Node Registry", base_url)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn display_name(&self) -> &'static str {
        self.display_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn unavailable_code(&self) -> String {
        format!("{}_unavailable", self.name)
    }

    /// Error for any failure that did not come back as a structured API error.
    pub fn unavailable(&self, failure: impl fmt::Display) -> ServiceError {
        ServiceError::bad_gateway(
            self.unavailable_code(),
            format!("{} request failed", self.display_name),
        )
        .with_detail(format!("{}_url", self.name), self.base_url.clone())
        .with_detail("error", failure.to_string())
    }

    pub fn normalize(&self, error: DownstreamError) -> ServiceError {
        match error {
            DownstreamError::Api {
                code,
                message,
                status_code,
                details,
            } => ServiceError {
                code,
                message,
                status_code: status_code.unwrap_or(STATUS_BAD_GATEWAY),
                details,
            },
            other => self.unavailable(other),
        }
    }
}
