// src/core/catalogue.rs
//! Known exception signatures, loaded as the `[exceptions]` section of
//! [`crate::config::Config`].

use serde::{Deserialize, Serialize};

use super::findings::IssueCategory;

/// Vocabulary whose removal is suspicious for one exception type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardVocabulary {
    /// Category emitted when a removed line matches
    pub category: IssueCategory,

    pub description: String,

    /// Regular expressions matched against removed lines
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionSignature {
    /// Short exception type, e.g. `NullPointerException`
    pub name: String,

    pub common_causes: Vec<String>,

    pub fix_patterns: Vec<String>,

    pub code_example: Option<String>,

    pub guard: Option<GuardVocabulary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionCatalogue {
    pub signatures: Vec<ExceptionSignature>,
}

impl ExceptionCatalogue {
    pub fn empty() -> Self {
        Self { signatures: Vec::new() }
    }

    /// Look up a signature by short or fully qualified exception type
    pub fn lookup(&self, exception_type: &str) -> Option<&ExceptionSignature> {
        let short = short_type(exception_type);
        self.signatures.iter().find(|s| s.name == short)
    }

    pub fn is_known(&self, exception_type: &str) -> bool {
        self.lookup(exception_type).is_some()
    }
}

/// `java.lang.NullPointerException` -> `NullPointerException`
pub fn short_type(exception_type: &str) -> &str {
    exception_type.rsplit('.').next().unwrap_or(exception_type)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExceptionCatalogue {
    fn default() -> Self {
        let signatures = vec![
            ExceptionSignature {
                name: "NullPointerException".to_string(),
                common_causes: strings(&[
                    "Accessing a method or property on a null reference",
                    "Missing null check before dereferencing",
                    "Unexpected null return from method call",
                    "Uninitialized object field",
                ]),
                fix_patterns: strings(&[
                    "Add null check before accessing the object",
                    "Use Kotlin safe call operator (?.) or Elvis operator (?:)",
                    "Use Optional/nullable type properly",
                    "Add @NotNull or requireNotNull() assertion",
                ]),
                code_example: Some(
                    "val customer = repository.findById(id)\n\
                     customer?.name ?: throw CustomerNotFoundException(id)"
                        .to_string(),
                ),
                guard: Some(GuardVocabulary {
                    category: IssueCategory::NullCheckRemoved,
                    description: "Null check or safe navigation was removed".to_string(),
                    patterns: strings(&[
                        r"if\s*\([^)]*==\s*null",
                        r"if\s*\([^)]*!=\s*null",
                        r"\?\.",
                        r"\?:",
                        r"\.orElse\(",
                        r"\.orElseGet\(",
                        r"requireNotNull",
                        r"checkNotNull",
                    ]),
                }),
            },
            ExceptionSignature {
                name: "IllegalStateException".to_string(),
                common_causes: strings(&[
                    "Object in invalid state for the operation",
                    "Method called at inappropriate time in lifecycle",
                    "State machine transition violation",
                    "Missing initialization before method call",
                ]),
                fix_patterns: strings(&[
                    "Add state validation before operation",
                    "Ensure proper initialization sequence",
                    "Add state machine guards",
                    "Document and validate preconditions",
                ]),
                code_example: Some(
                    "if (state != State.READY) {\n    \
                     logger.warn(\"Attempted process in state: $state\")\n    \
                     return\n}"
                        .to_string(),
                ),
                guard: Some(GuardVocabulary {
                    category: IssueCategory::StateCheckRemoved,
                    description: "State validation was removed".to_string(),
                    patterns: strings(&[
                        r"check\s*\(",
                        r"require\s*\(",
                        r"state\s*==",
                        r"\.isReady",
                        r"\.isValid",
                    ]),
                }),
            },
            ExceptionSignature {
                name: "IllegalArgumentException".to_string(),
                common_causes: strings(&[
                    "Invalid input parameter passed to method",
                    "Parameter fails validation check",
                    "Null passed where non-null expected",
                    "Out of range value for parameter",
                ]),
                fix_patterns: strings(&[
                    "Validate arguments at method entry",
                    "Use require() with descriptive message",
                    "Add input sanitization before calling",
                    "Document parameter constraints",
                ]),
                code_example: Some(
                    "fun setAge(age: Int) {\n    \
                     require(age >= 0) { \"Age must be non-negative, was $age\" }\n    \
                     this.age = age\n}"
                        .to_string(),
                ),
                guard: Some(GuardVocabulary {
                    category: IssueCategory::ValidationRemoved,
                    description: "Input validation was removed".to_string(),
                    patterns: strings(&[
                        r"require\s*\(",
                        r"check\s*\(",
                        r"if\s*\([^)]*\.isEmpty",
                        r"if\s*\([^)]*\.isBlank",
                        r"\.validate\(",
                    ]),
                }),
            },
            ExceptionSignature {
                name: "RuntimeException".to_string(),
                common_causes: strings(&[
                    "Unchecked exception from business logic",
                    "Wrapper for checked exceptions",
                    "Generic error condition",
                ]),
                fix_patterns: strings(&[
                    "Add appropriate exception handling",
                    "Use more specific exception type",
                    "Add error recovery logic",
                ]),
                code_example: Some(
                    "try {\n    performOperation()\n} catch (e: SpecificException) {\n    \
                     logger.error(\"Operation failed: ${e.message}\", e)\n}"
                        .to_string(),
                ),
                guard: None,
            },
            ExceptionSignature {
                name: "NoSuchElementException".to_string(),
                common_causes: strings(&[
                    "Calling next() on empty iterator",
                    "Using first()/single() on empty collection",
                    "Optional.get() on empty Optional",
                ]),
                fix_patterns: strings(&[
                    "Use firstOrNull() instead of first()",
                    "Check hasNext() before next()",
                    "Use orElse()/orElseGet() for Optional",
                ]),
                code_example: Some("val item = list.firstOrNull() ?: defaultItem".to_string()),
                guard: None,
            },
        ];

        Self { signatures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_short_and_qualified_names() {
        let catalogue = ExceptionCatalogue::default();

        assert!(catalogue.is_known("NullPointerException"));
        assert!(catalogue.is_known("java.lang.NullPointerException"));
        assert!(!catalogue.is_known("java.io.IOException"));
        assert!(!ExceptionCatalogue::empty().is_known("NullPointerException"));
    }

    #[test]
    fn test_default_guards_cover_refinement_types() {
        let catalogue = ExceptionCatalogue::default();
        let guard_of = |name: &str| catalogue.lookup(name).and_then(|s| s.guard.as_ref()).map(|g| g.category);

        assert_eq!(guard_of("NullPointerException"), Some(IssueCategory::NullCheckRemoved));
        assert_eq!(guard_of("IllegalStateException"), Some(IssueCategory::StateCheckRemoved));
        assert_eq!(guard_of("IllegalArgumentException"), Some(IssueCategory::ValidationRemoved));
        assert_eq!(guard_of("RuntimeException"), None);
    }

    #[test]
    fn test_short_type() {
        assert_eq!(short_type("java.lang.IllegalStateException"), "IllegalStateException");
        assert_eq!(short_type("IllegalStateException"), "IllegalStateException");
    }
}
