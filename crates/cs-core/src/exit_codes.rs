//! Exit codes for the cs-core CLI.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use cs_common::{Error, ErrorCategory};

/// Exit codes for cs-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run finished and no claim was flagged.
    Clean = 0,

    /// Run finished and at least one claim was flagged.
    AnomaliesFound = 1,

    /// Invalid arguments.
    ArgsError = 10,

    /// Configuration file, preset, or threshold error.
    ConfigError = 11,

    /// Malformed or incomplete claim input.
    InputError = 12,

    /// Internal error (bug - please report).
    InternalError = 20,

    /// I/O error.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-1.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Codes 20-29.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Outcome code of a finished run.
    pub fn for_flags(flagged: usize) -> Self {
        if flagged == 0 {
            ExitCode::Clean
        } else {
            ExitCode::AnomaliesFound
        }
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::AnomaliesFound => "OK_ANOMALIES",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Input => ExitCode::InputError,
            ErrorCategory::Io => match err {
                Error::Json(_) => ExitCode::InputError,
                _ => ExitCode::IoError,
            },
            ErrorCategory::Detection => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
