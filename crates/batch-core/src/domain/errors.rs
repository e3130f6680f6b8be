pub type BatchResult<T> = Result<T, BatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchErrorCategory {
    Schema,
    Validation,
    Shape,
    DuplicateKey,
    State,
    Filesystem,
    Internal,
}

impl BatchErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Schema | Self::Validation | Self::Shape | Self::DuplicateKey => 2,
            Self::Filesystem => 3,
            Self::State => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "SchemaError",
            Self::Validation => "ValidationError",
            Self::Shape => "ShapeError",
            Self::DuplicateKey => "DuplicateKeyError",
            Self::State => "StateError",
            Self::Filesystem => "FilesystemError",
            Self::Internal => "InternalError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} [{placeholder}] {message}", .category.as_str())]
pub struct BatchError {
    category: BatchErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl BatchError {
    pub fn new(
        category: BatchErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn schema(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::Schema, placeholder, message)
    }

    pub fn validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::Validation, placeholder, message)
    }

    pub fn shape(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::Shape, placeholder, message)
    }

    pub fn duplicate_key(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::DuplicateKey, placeholder, message)
    }

    pub fn state(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::State, placeholder, message)
    }

    pub fn filesystem(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::Filesystem, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BatchErrorCategory::Internal, placeholder, message)
    }

    /// Prefixes the message, keeping category and placeholder.
    pub fn context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    pub const fn category(&self) -> BatchErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}
