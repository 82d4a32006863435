//! Custom scan error types
//!
//! Error codes:
//! - AERO_DUPLICATE_OBJECT (ERROR)
//! - AERO_UNDEFINED_OBJECT (ERROR)
//! - AERO_SCAN_LIFECYCLE (ERROR)
//! - AERO_SCAN_UNSUPPORTED (ERROR)
//! - AERO_PARALLEL_PROTOCOL (ERROR)
//! - AERO_PLAN_INVALID (ERROR)
//! - AERO_PLAN_CORRUPTION (ERROR)
//! - AERO_SCAN_FAILED (ERROR)
//! - AERO_INTERNAL (FATAL)

use std::fmt;

/// Severity levels for custom scan errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the process is healthy
    Error,
    /// Process state can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Custom scan error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomScanErrorCode {
    /// A provider with the same name is already registered
    AeroDuplicateObject,
    /// No provider is registered under the requested name
    AeroUndefinedObject,
    /// Illegal execution-state transition
    AeroScanLifecycle,
    /// Optional capability requested from a provider that lacks it
    AeroScanUnsupported,
    /// Parallel sub-protocol called out of order
    AeroParallelProtocol,
    /// Structurally invalid plan node
    AeroPlanInvalid,
    /// Plan handoff envelope failed verification
    AeroPlanCorruption,
    /// Provider-internal failure
    AeroScanFailed,
    /// Registry state is unusable
    AeroInternal,
}

impl CustomScanErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            CustomScanErrorCode::AeroDuplicateObject => "AERO_DUPLICATE_OBJECT",
            CustomScanErrorCode::AeroUndefinedObject => "AERO_UNDEFINED_OBJECT",
            CustomScanErrorCode::AeroScanLifecycle => "AERO_SCAN_LIFECYCLE",
            CustomScanErrorCode::AeroScanUnsupported => "AERO_SCAN_UNSUPPORTED",
            CustomScanErrorCode::AeroParallelProtocol => "AERO_PARALLEL_PROTOCOL",
            CustomScanErrorCode::AeroPlanInvalid => "AERO_PLAN_INVALID",
            CustomScanErrorCode::AeroPlanCorruption => "AERO_PLAN_CORRUPTION",
            CustomScanErrorCode::AeroScanFailed => "AERO_SCAN_FAILED",
            CustomScanErrorCode::AeroInternal => "AERO_INTERNAL",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            CustomScanErrorCode::AeroInternal => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for CustomScanErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Custom scan error with full context
#[derive(Debug, Clone)]
pub struct CustomScanError {
    code: CustomScanErrorCode,
    message: String,
    /// Provider name if applicable
    provider: Option<String>,
}

impl CustomScanError {
    fn new(code: CustomScanErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
        }
    }

    fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }

    /// Registration under a name that is already taken
    pub fn duplicate_object(provider: &str) -> Self {
        Self::new(
            CustomScanErrorCode::AeroDuplicateObject,
            format!("custom scan provider \"{}\" already exists", provider),
        )
        .with_provider(provider)
    }

    /// Lookup of a name that was never registered
    pub fn undefined_object(provider: &str) -> Self {
        Self::new(
            CustomScanErrorCode::AeroUndefinedObject,
            format!("custom scan provider \"{}\" was not registered", provider),
        )
        .with_provider(provider)
    }

    /// Illegal transition `from` state via `operation`
    pub fn forbidden_transition(provider: &str, from: &str, operation: &str) -> Self {
        Self::new(
            CustomScanErrorCode::AeroScanLifecycle,
            format!("{} is not allowed in state {}", operation, from),
        )
        .with_provider(provider)
    }

    /// Optional capability not exposed by the provider
    pub fn unsupported(provider: &str, capability: &str) -> Self {
        Self::new(
            CustomScanErrorCode::AeroScanUnsupported,
            format!(
                "custom scan provider \"{}\" does not support {}",
                provider, capability
            ),
        )
        .with_provider(provider)
    }

    /// Parallel sub-protocol violation
    pub fn parallel_protocol(reason: impl Into<String>) -> Self {
        Self::new(CustomScanErrorCode::AeroParallelProtocol, reason)
    }

    /// Structurally invalid plan node
    pub fn plan_invalid(reason: impl Into<String>) -> Self {
        Self::new(CustomScanErrorCode::AeroPlanInvalid, reason)
    }

    /// Handoff envelope could not be verified
    pub fn plan_corruption(reason: impl Into<String>) -> Self {
        Self::new(CustomScanErrorCode::AeroPlanCorruption, reason)
    }

    /// Provider-internal failure
    pub fn scan_failed(provider: &str, reason: impl Into<String>) -> Self {
        Self::new(CustomScanErrorCode::AeroScanFailed, reason).with_provider(provider)
    }

    /// Registry lock poisoned
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(CustomScanErrorCode::AeroInternal, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> CustomScanErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name if applicable
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for CustomScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for CustomScanError {}

/// Result type for custom scan operations
pub type CustomScanResult<T> = Result<T, CustomScanError>;
