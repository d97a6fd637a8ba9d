//! Identifier validation for rename targets.

use symtool_core::error::SymtoolError;
use thiserror::Error;

/// Error for validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for SymtoolError {
    fn from(err: ValidationError) -> Self {
        SymtoolError::invalid_input(err.to_string())
    }
}

/// Reserved words that cannot be used as identifiers.
pub const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Validate that a string is a usable identifier.
///
/// Checks:
/// - Non-empty
/// - Starts with letter or underscore
/// - Contains only letters, digits, and underscores
/// - Not a keyword
/// - Not the blank identifier `_`
///
/// # Examples
///
/// ```
/// use symtool::validation::validate_identifier;
///
/// assert!(validate_identifier("newName").is_ok());
/// assert!(validate_identifier("_private").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("9lives").is_err());
/// assert!(validate_identifier("func").is_err());
/// ```
pub fn validate_identifier(name: &str) -> ValidationResult<()> {
    let invalid = |reason: String| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("name cannot be empty".to_string()));
    };
    if !first.is_alphabetic() && first != '_' {
        return Err(invalid("must start with letter or underscore".to_string()));
    }
    if let Some(ch) = name.chars().find(|ch| !ch.is_alphanumeric() && *ch != '_') {
        return Err(invalid(format!("invalid character: '{}'", ch)));
    }
    if is_keyword(name) {
        return Err(invalid("cannot use keyword as identifier".to_string()));
    }
    if name == "_" {
        return Err(invalid("cannot rename to the blank identifier".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod valid_identifiers {
        use super::*;

        #[test]
        fn simple_and_mixed_case() {
            for name in ["foo", "x", "MyFoo", "snake_case", "SCREAMING", "v2", "_tmp", "naïve"] {
                assert!(validate_identifier(name).is_ok(), "{name}");
            }
        }

        #[test]
        fn predeclared_names_are_not_keywords() {
            assert!(validate_identifier("len").is_ok());
            assert!(validate_identifier("string").is_ok());
        }
    }

    mod invalid_identifiers {
        use super::*;

        #[test]
        fn rejects_bad_shapes() {
            for name in ["", "1st", "has-dash", "dot.ted", "white space"] {
                assert!(validate_identifier(name).is_err(), "{name:?}");
            }
        }

        #[test]
        fn rejects_keywords_and_blank() {
            let err = validate_identifier("range").unwrap_err();
            assert!(err.to_string().contains("keyword"));
            assert!(validate_identifier("_").is_err());
        }

        #[test]
        fn maps_to_invalid_input() {
            let err: SymtoolError = validate_identifier("").unwrap_err().into();
            assert!(matches!(err, SymtoolError::InvalidInput { .. }));
        }
    }
}
