//! Validation framework for configuration documents.
//!
//! Everything read from `config.yaml` or `autoupdate.yaml` is validated
//! before any network call is made. Validators collect every failure they
//! find into [`ValidationErrors`] instead of stopping at the first one.

use std::fmt;

/// A single configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field or path that failed validation.
    pub field: String,
    /// A human-readable description of the validation failure.
    pub message: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a new validation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_mirror_core::ValidationError;
    /// use artifact_mirror_core::validation::ValidationErrorKind;
    ///
    /// let error = ValidationError::new(
    ///     "VersionConstraint",
    ///     "must not specify VersionConstraint when LatestOnly=true",
    ///     ValidationErrorKind::Conflict,
    /// );
    /// assert_eq!(error.field, "VersionConstraint");
    /// ```
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        kind: ValidationErrorKind,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }

    /// Creates a validation error for a required field that is missing.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' is required but was not provided"),
            field,
            kind: ValidationErrorKind::Required,
        }
    }

    /// Creates a validation error for an invalid format.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Format)
    }

    /// Creates a validation error for an empty collection.
    pub fn empty(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' must not be empty"),
            field,
            kind: ValidationErrorKind::Empty,
        }
    }

    /// Creates a validation error for options that cannot be combined.
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Conflict)
    }

    /// Creates a validation error for a value that must be unique.
    pub fn duplicate(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Duplicate)
    }

    /// Replaces the message, keeping field and kind.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Prefixes the field path with a parent path, e.g. `GithubRelease.Owner`.
    #[must_use]
    pub fn within(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The category of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was not provided.
    Required,
    /// The value format is invalid (bad regex, bad constraint, bad reference).
    Format,
    /// A collection is empty when it shouldn't be.
    Empty,
    /// Two options were set that are mutually exclusive.
    Conflict,
    /// A value that must be unique appears more than once.
    Duplicate,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Format => write!(f, "format"),
            Self::Empty => write!(f, "empty"),
            Self::Conflict => write!(f, "conflict"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// A collection of validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty validation errors collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation error to the collection.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of validation errors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the validation errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Converts into a `Result`, returning `Ok(())` when empty.
    ///
    /// # Errors
    ///
    /// Returns `self` if any errors were collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Merges another `ValidationErrors` into this one.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Merges another `ValidationErrors`, prefixing each field with `parent`.
    pub fn merge_within(&mut self, parent: &str, other: Self) {
        self.errors
            .extend(other.errors.into_iter().map(|e| e.within(parent)));
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "no validation errors")
        } else if self.errors.len() == 1 {
            write!(f, "{}", self.errors[0])
        } else {
            writeln!(f, "{} validation errors:", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Trait for configuration types that can be validated.
///
/// # Examples
///
/// ```
/// use artifact_mirror_core::validation::{Validate, ValidationError, ValidationErrors};
///
/// struct Owner(String);
///
/// impl Validate for Owner {
///     fn validate(&self) -> Result<(), ValidationErrors> {
///         let mut errors = ValidationErrors::new();
///         if self.0.is_empty() {
///             errors.add(ValidationError::required("Owner"));
///         }
///         errors.into_result()
///     }
/// }
///
/// assert!(!Owner(String::new()).is_valid());
/// ```
pub trait Validate {
    /// Validates this instance and returns every error found.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` containing all validation failures found.
    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Returns true if this instance is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
