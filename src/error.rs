use thiserror::Error;

/// Errors raised by the middle-end. These are compiler bugs, not user
/// errors: all user-visible diagnostics belong to the front-end and stop
/// the pipeline before MTAC is produced. Compilation aborts on the first
/// error, nothing is partially emitted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MiddleEndError {
    #[error("invariant violation in {function}: {message} (at `{statement}`)")]
    InvariantViolation {
        function: String,
        statement: String,
        message: String,
    },
    #[error("dangling label {label} in {function}")]
    DanglingLabel { function: String, label: String },
    #[error("unsupported construct in {function}: {message}")]
    UnsupportedConstruct { function: String, message: String },
    #[error("pseudo-register {register} escaped register allocation in {function}")]
    PseudoRegisterEscaped { function: String, register: String },
}

impl MiddleEndError {
    pub fn invariant(
        function: impl Into<String>,
        statement: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        MiddleEndError::InvariantViolation {
            function: function.into(),
            statement: statement.to_string(),
            message: message.into(),
        }
    }
}
