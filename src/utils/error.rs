use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoadmapError {
    #[error("Completion request failed: {message}")]
    CompletionError { message: String },

    #[error("Completion transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Provider output is not valid JSON: {message}")]
    ParseError { message: String, raw: String },

    #[error("Invalid roadmap module{}: field '{field}' {reason}", .index.map(|i| format!(" #{}", i)).unwrap_or_default())]
    ModuleValidationError {
        index: Option<usize>,
        field: String,
        reason: String,
    },

    #[error("Invalid topic content: field '{field}' {reason}")]
    TopicValidationError { field: String, reason: String },

    #[error("Failed to persist roadmap: {message}")]
    IngestError { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid request: field '{field}' {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),
}

/// 錯誤分類，讓呼叫端能分辨「供應商掛了」與「供應商回傳了錯誤的結構」
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Completion,
    Parse,
    Validation,
    Ingest,
    Request,
    Configuration,
    System,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Completion => "completion_failure",
            ErrorCategory::Parse => "parse_failure",
            ErrorCategory::Validation => "module_validation_failure",
            ErrorCategory::Ingest => "ingest_failure",
            ErrorCategory::Request => "invalid_request",
            ErrorCategory::Configuration => "configuration_error",
            ErrorCategory::System => "system_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 結束碼；每個等級都代表失敗，不會回傳 0
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl RoadmapError {
    pub fn completion(message: impl Into<String>) -> Self {
        RoadmapError::CompletionError {
            message: message.into(),
        }
    }

    pub fn invalid_request(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RoadmapError::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn module_validation(
        index: Option<usize>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RoadmapError::ModuleValidationError {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn topic_validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RoadmapError::TopicValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RoadmapError::CompletionError { .. } | RoadmapError::HttpError(_) => {
                ErrorCategory::Completion
            }
            RoadmapError::ParseError { .. } => ErrorCategory::Parse,
            RoadmapError::ModuleValidationError { .. }
            | RoadmapError::TopicValidationError { .. } => ErrorCategory::Validation,
            RoadmapError::IngestError { .. } | RoadmapError::DatabaseError(_) => {
                ErrorCategory::Ingest
            }
            RoadmapError::InvalidRequest { .. } => ErrorCategory::Request,
            RoadmapError::ConfigError { .. }
            | RoadmapError::InvalidConfigValueError { .. }
            | RoadmapError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RoadmapError::IoError(_)
            | RoadmapError::SerializationError(_)
            | RoadmapError::CsvError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 供應商錯誤視為暫時性，呼叫端可自行重試
            ErrorCategory::Completion => ErrorSeverity::Medium,
            ErrorCategory::Parse | ErrorCategory::Validation => ErrorSeverity::Medium,
            ErrorCategory::Request => ErrorSeverity::High,
            ErrorCategory::Ingest | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Completion => {
                "Check the provider base URL and API key, then retry the request"
            }
            ErrorCategory::Parse | ErrorCategory::Validation => {
                "The model returned unusable output; retrying usually produces a valid result"
            }
            ErrorCategory::Ingest => "Check that the database is reachable and writable",
            ErrorCategory::Request => "Fix the request fields named in the error and resend",
            ErrorCategory::Configuration => {
                "Review the configuration file and OPENAI_* / DATABASE_URL environment variables"
            }
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Completion => {
                "The roadmap service is temporarily unavailable".to_string()
            }
            ErrorCategory::Parse => "The generated content could not be read".to_string(),
            ErrorCategory::Validation => format!("The generated content was invalid: {}", self),
            ErrorCategory::Ingest => "The roadmap could not be saved".to_string(),
            ErrorCategory::Request | ErrorCategory::Configuration => self.to_string(),
            ErrorCategory::System => format!("An internal error occurred: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, RoadmapError>;
