//! JS exception reporting
//!
//! Exceptions raised in the JS layer are forwarded to an exception reporter as
//! soft exceptions (they do not take the app down) and logged.

use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Js,
    Native,
    Undefined,
}

impl ErrorType {
    /// Maps the host's error kind name; anything unrecognised is undefined.
    pub fn from_host(kind: &str) -> Self {
        match kind.to_ascii_uppercase().as_str() {
            "JS" => ErrorType::Js,
            "NATIVE" => ErrorType::Native,
            _ => ErrorType::Undefined,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Js => write!(f, "JS"),
            ErrorType::Native => write!(f, "NATIVE"),
            ErrorType::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// One frame of a JS stack trace as the JS layer sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackFrame {
    pub file: Option<String>,
    pub method_name: Option<String>,
    pub line_number: Option<i64>,
    pub column: Option<i64>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{}:{})",
            self.method_name.as_deref().unwrap_or("<anonymous>"),
            self.file.as_deref().unwrap_or("<unknown>"),
            self.line_number.unwrap_or(-1),
            self.column.unwrap_or(-1)
        )
    }
}

/// Sink for soft exceptions.
pub trait ExceptionReporter: Send + Sync {
    fn report_soft_exception(&self, message: &str, stack: &[StackFrame], exception_id: u64);
}

/// Writes soft exceptions to the log, one frame per line.
pub struct LogExceptionReporter;

impl ExceptionReporter for LogExceptionReporter {
    fn report_soft_exception(&self, message: &str, stack: &[StackFrame], exception_id: u64) {
        warn!("Soft exception #{}: {}", exception_id, message);
        for frame in stack {
            warn!("    at {}", frame);
        }
    }
}

/// Receiver of red-box style error reports.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, title: Option<&str>, stack: &[StackFrame], error_type: ErrorType);
}

/// Adapts an [`ErrorHandler`] to red-box reports coming from the host, which
/// name their error type as a string. Uploading reports is not supported.
pub struct RedBoxMapper {
    handler: Arc<dyn ErrorHandler>,
}

impl RedBoxMapper {
    pub fn new(handler: Arc<dyn ErrorHandler>) -> Self {
        Self { handler }
    }

    pub fn handle_redbox(&self, title: Option<&str>, stack: &[StackFrame], kind: &str) {
        self.handler
            .handle_error(title, stack, ErrorType::from_host(kind));
    }
}

pub struct NativeErrorHandler {
    reporter: Arc<dyn ExceptionReporter>,
}

impl NativeErrorHandler {
    pub fn new(reporter: Arc<dyn ExceptionReporter>) -> Self {
        Self { reporter }
    }

    pub fn handle(&self, message: Option<&str>, stack: &[StackFrame]) {
        let message = message.unwrap_or("");
        self.reporter.report_soft_exception(message, stack, 0);
        error!("Received JS exception: {}", message);
    }
}

impl ErrorHandler for NativeErrorHandler {
    fn handle_error(&self, title: Option<&str>, stack: &[StackFrame], error_type: ErrorType) {
        if error_type != ErrorType::Js {
            warn!("Reporting {} error through the JS exception path", error_type);
        }
        self.handle(title, stack);
    }
}
