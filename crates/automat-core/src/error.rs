//! Bridge error taxonomy
//!
//! Two layers: [`ForeignFailure`] is the 1:1 mapping of non-success
//! result codes coming back from the component model, and [`BridgeError`]
//! is what the bridge itself raises toward the host. Resource exhaustion
//! and conversion failures abort the current operation immediately;
//! member-not-found is ordinary control flow everywhere except at the top
//! of the dispatcher, where it becomes [`BridgeError::UnknownMember`]
//! after every fallback has been tried.

use thiserror::Error;

/// A non-success result code from a foreign invocation.
///
/// `Display` and `Error` are implemented by hand because the `Exception`
/// variant's `source` field is a plain `String`, which the thiserror
/// derive would otherwise try to expose as the error source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignFailure {
    /// The call supplied the wrong number of arguments.
    BadParamCount,

    /// An argument carried a value type the member cannot accept.
    BadVarType,

    /// The target raised an exception; the payload is already formatted.
    Exception {
        /// Name of the raising component.
        source: String,
        /// Human-readable description supplied by the target.
        description: String,
        /// Raw exception code.
        code: u32,
    },

    /// The member ID is not known to the target.
    MemberNotFound,

    /// A numeric argument overflowed the declared width.
    Overflow,

    /// One specific argument could not be coerced by the target.
    ///
    /// Targets report the index into the wire argument array (0-based,
    /// rightmost first); the dispatcher translates it to the 1-based
    /// source position before surfacing the failure.
    TypeMismatch {
        /// Index of the offending argument.
        argument: usize,
    },

    /// A required argument was omitted.
    ParamNotOptional,

    /// The connection to the foreign object was lost.
    Disconnected,

    /// Any other failure, carrying the raw result code.
    Unknown(u32),
}

impl std::fmt::Display for ForeignFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadParamCount => write!(f, "wrong number of arguments"),
            Self::BadVarType => write!(f, "argument has an invalid value type"),
            Self::Exception {
                source,
                description,
                code,
            } => write!(f, "{source}: {description} (code {code:#010x})"),
            Self::MemberNotFound => write!(f, "member not found"),
            Self::Overflow => write!(f, "numeric overflow"),
            Self::TypeMismatch { argument } => {
                write!(f, "type mismatch in argument {argument}")
            }
            Self::ParamNotOptional => write!(f, "a required argument was omitted"),
            Self::Disconnected => {
                write!(f, "connection to the foreign object was lost")
            }
            Self::Unknown(code) => {
                write!(f, "foreign call failed with code {code:#010x}")
            }
        }
    }
}

impl std::error::Error for ForeignFailure {}

/// Error raised by the bridge toward the host runtime.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Allocation failure in the cache or codec. Fatal to the current
    /// operation, never retried.
    #[error("out of resources: {0}")]
    Exhausted(String),

    /// A wire value has no defined mapping to a host object.
    #[error("no conversion for wire type {tag}")]
    Conversion {
        /// Wire name of the offending tag.
        tag: &'static str,
    },

    /// A host argument has no defined mapping to the requested wire type.
    #[error("argument {argument} cannot be converted to wire type {tag}")]
    ConversionAt {
        /// Wire name of the requested target tag.
        tag: &'static str,
        /// 1-based position of the offending argument.
        argument: usize,
    },

    /// No member of the given name exists, after all resolution fallbacks.
    #[error("unknown member \"{name}\"")]
    UnknownMember {
        /// The name the caller asked for.
        name: String,
    },

    /// A foreign invocation returned a non-success result code.
    #[error("foreign invocation failed: {0}")]
    Foreign(#[from] ForeignFailure),

    /// An external policy hook rejected object creation.
    #[error("object creation denied by security policy: {class}")]
    SecurityDenied {
        /// Class the host asked to instantiate.
        class: String,
    },
}

/// Result alias used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_failure_display() {
        let e = ForeignFailure::Exception {
            source: "Widget".to_string(),
            description: "bad state".to_string(),
            code: 0x8002_0009,
        };
        assert_eq!(e.to_string(), "Widget: bad state (code 0x80020009)");
        assert_eq!(
            ForeignFailure::TypeMismatch { argument: 2 }.to_string(),
            "type mismatch in argument 2"
        );
    }

    #[test]
    fn test_bridge_error_display() {
        let e = BridgeError::Conversion { tag: "BLOB" };
        assert_eq!(e.to_string(), "no conversion for wire type BLOB");

        let e = BridgeError::UnknownMember {
            name: "Frobnicate".to_string(),
        };
        assert_eq!(e.to_string(), "unknown member \"Frobnicate\"");
    }

    #[test]
    fn test_foreign_failure_wraps() {
        let e: BridgeError = ForeignFailure::Overflow.into();
        assert!(matches!(
            e,
            BridgeError::Foreign(ForeignFailure::Overflow)
        ));
    }
}
