use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid pattern '{pattern}' in {context}: {source}")]
    InvalidPatternError {
        context: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{context} references unknown domain '{domain}'")]
    UnknownDomainError { context: String, domain: String },

    #[error("No input documents found in {path}")]
    NoInputDocumentsError { path: String },

    #[error("Invalid source document '{document}': {message}")]
    InvalidDocumentError { document: String, message: String },

    #[error(
        "Component '{section}/{name}' differs between '{first}' and '{second}'"
    )]
    SchemaConflictError {
        section: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("Publishing output failed: {message}")]
    PublishError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Consistency,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    High,
    Critical,
}

impl BundleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BundleError::ConfigError { .. }
            | BundleError::ConfigValidationError { .. }
            | BundleError::InvalidConfigValueError { .. }
            | BundleError::MissingConfigError { .. }
            | BundleError::InvalidPatternError { .. }
            | BundleError::UnknownDomainError { .. } => ErrorCategory::Configuration,
            BundleError::NoInputDocumentsError { .. }
            | BundleError::InvalidDocumentError { .. }
            | BundleError::SerializationError(_) => ErrorCategory::Input,
            BundleError::SchemaConflictError { .. } => ErrorCategory::Consistency,
            BundleError::IoError(_) | BundleError::PublishError { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Consistency => ErrorSeverity::Critical,
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for a run that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BundleError::UnknownDomainError { domain, .. } => format!(
                "Declare '{}' under [[domains]] or map it to a successor under [[aliases]]",
                domain
            ),
            BundleError::InvalidPatternError { .. } => {
                "Fix the regular expression syntax in the rule table".to_string()
            }
            BundleError::NoInputDocumentsError { .. } => {
                "Run the download step first or point --input-dir at the specification directory"
                    .to_string()
            }
            BundleError::InvalidDocumentError { .. } => {
                "Re-download the document or set processing.continue_on_error = true".to_string()
            }
            BundleError::SchemaConflictError { .. } => {
                "Two sources define the same component differently; check upstream normalization or rename one of them"
                    .to_string()
            }
            BundleError::PublishError { .. } | BundleError::IoError(_) => {
                "Check permissions and free space on the output filesystem; previous output was left untouched"
                    .to_string()
            }
            BundleError::SerializationError(_) => {
                "Validate that every input document is well-formed JSON".to_string()
            }
            _ => "Review the configuration file against the documented sections".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Input problem: {}", self),
            ErrorCategory::Consistency => format!("Inconsistent bundle output: {}", self),
            ErrorCategory::Output => format!("Could not publish output: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BundleError>;
