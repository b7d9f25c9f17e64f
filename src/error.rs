//! Error types for the ews-sync crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by the layer that produced them - see [`Error::category`] - and
//! by their retryability - see [`Error::is_retryable`].

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during EWS operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A URL could not be parsed.
    #[error("invalid URL '{url}'")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Transport errors (RETRYABLE unless the server refused the credentials)
    // ─────────────────────────────────────────────────────────────────────────
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The final URL that produced the status.
        url: String,
    },

    /// The HTTP exchange itself failed (connect, TLS, timeout, body read).
    #[error("HTTP request to {url} failed")]
    Request {
        /// The URL being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The task driving an in-flight request panicked or was cancelled.
    #[error("request task for {operation} did not complete")]
    TaskAborted {
        /// The operation whose task was lost.
        operation: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Protocol / parse errors (NOT retryable - the same bytes parse the same way)
    // ─────────────────────────────────────────────────────────────────────────
    /// Low-level XML syntax error.
    #[error("XML error")]
    Xml {
        /// The underlying XML error.
        #[source]
        source: quick_xml::Error,
    },

    /// Well-formed XML with an unexpected shape.
    #[error("malformed response: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },

    /// An element was found where a different one was required.
    #[error("unexpected element '{found}', expected {expected}")]
    UnexpectedElement {
        /// What the parser was looking for.
        expected: String,
        /// The element that was actually present.
        found: String,
    },

    /// The server answered with a SOAP fault instead of a response body.
    #[error("SOAP fault {code}: {string}")]
    SoapFault {
        /// The `faultcode` text.
        code: String,
        /// The `faultstring` text.
        string: String,
    },

    /// The number of response messages does not match the number of requests.
    #[error("{operation}: expected {expected} response messages, got {actual}")]
    ResponseCountMismatch {
        /// The operation name.
        operation: String,
        /// Number of requested sub-operations.
        expected: usize,
        /// Number of response messages received.
        actual: usize,
    },

    /// An entity in the response failed to decode.
    #[error("invalid {entity} in {operation} response")]
    InvalidEntity {
        /// The operation name.
        operation: String,
        /// The kind of entity (folder, item).
        entity: String,
    },

    /// Failed to deserialize an autodiscovery response.
    #[error("failed to parse autodiscover response")]
    PoxParse {
        /// The underlying deserialization error.
        #[source]
        source: quick_xml::DeError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Application errors (retryability depends on the response code)
    // ─────────────────────────────────────────────────────────────────────────
    /// A response message carried `ResponseClass="Error"`.
    #[error("{operation} failed with {code}: {message}")]
    Response {
        /// The operation name.
        operation: String,
        /// The EWS `ResponseCode`.
        code: String,
        /// The `MessageText`, if any.
        message: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Reconciliation errors (NOT retryable incrementally - resync instead)
    // ─────────────────────────────────────────────────────────────────────────
    /// Folders whose ancestry could not be resolved after the reparent pass.
    #[error("unresolved folders after reconciliation: {}", ids.join(", "))]
    OrphanedFolders {
        /// Remote ids of the unresolved folders.
        ids: Vec<String>,
    },

    /// A folder was moved into a parent that was created in the same round.
    #[error("folder {folder} moved into newly created folder {parent}")]
    MoveIntoNewFolder {
        /// Remote id of the moved folder.
        folder: String,
        /// Remote id of the new parent.
        parent: String,
    },

    /// The local collection store reported a failure.
    #[error("collection store error: {message}")]
    Store {
        /// Description supplied by the store.
        message: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Autodiscovery errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Every candidate URL was tried without obtaining settings.
    #[error("autodiscovery for {email} failed: no candidates remained")]
    AutodiscoverExhausted {
        /// The address being resolved.
        email: String,
        /// The last failure observed, if any.
        #[source]
        last: Option<Box<Error>>,
    },

    /// Too many address or URL redirects.
    #[error("autodiscovery for {email} exceeded {limit} redirects")]
    AutodiscoverRedirectLimit {
        /// The address being resolved when the limit hit.
        email: String,
        /// The configured limit.
        limit: u32,
    },

    /// The autodiscovery service answered with an error block.
    #[error("autodiscover error {code}: {message}")]
    AutodiscoverResponse {
        /// The `ErrorCode` text.
        code: String,
        /// The `Message` text.
        message: String,
    },
}

/// EWS response codes that signal a transient server condition.
const TRANSIENT_RESPONSE_CODES: &[&str] = &[
    "ErrorServerBusy",
    "ErrorTimeoutExpired",
    "ErrorInternalServerTransientError",
    "ErrorMailboxStoreUnavailable",
    "ErrorConnectionFailed",
    "ErrorBatchProcessingStopped",
];

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// Use this to implement retry logic:
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and retry
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http { status, .. } => *status != 401 && *status != 403 && *status != 404,
            Error::Request { .. } | Error::TaskAborted { .. } => true,
            Error::Response { code, .. } => TRANSIENT_RESPONSE_CODES.contains(&code.as_str()),

            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidUrl { .. }
            | Error::Xml { .. }
            | Error::Malformed { .. }
            | Error::UnexpectedElement { .. }
            | Error::SoapFault { .. }
            | Error::ResponseCountMismatch { .. }
            | Error::InvalidEntity { .. }
            | Error::PoxParse { .. }
            | Error::OrphanedFolders { .. }
            | Error::MoveIntoNewFolder { .. }
            | Error::Store { .. }
            | Error::AutodiscoverExhausted { .. }
            | Error::AutodiscoverRedirectLimit { .. }
            | Error::AutodiscoverResponse { .. } => false,
        }
    }

    /// Returns `true` if the server rejected (or demanded) credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status: 401, .. })
    }

    /// Returns `true` if the caller should abandon incremental sync and run a full resync.
    #[must_use]
    pub fn requires_full_resync(&self) -> bool {
        match self {
            Error::MoveIntoNewFolder { .. } | Error::OrphanedFolders { .. } => true,
            Error::Response { code, .. } => code == "ErrorInvalidSyncStateData",
            _ => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidUrl { .. } => ErrorCategory::Configuration,

            Error::Http { .. } | Error::Request { .. } | Error::TaskAborted { .. } => {
                ErrorCategory::Transport
            }

            Error::Xml { .. }
            | Error::Malformed { .. }
            | Error::UnexpectedElement { .. }
            | Error::SoapFault { .. }
            | Error::ResponseCountMismatch { .. }
            | Error::InvalidEntity { .. }
            | Error::PoxParse { .. } => ErrorCategory::Protocol,

            Error::Response { .. } => ErrorCategory::Application,

            Error::OrphanedFolders { .. }
            | Error::MoveIntoNewFolder { .. }
            | Error::Store { .. } => ErrorCategory::Reconciliation,

            Error::AutodiscoverExhausted { .. }
            | Error::AutodiscoverRedirectLimit { .. }
            | Error::AutodiscoverResponse { .. } => ErrorCategory::Discovery,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::Malformed {
            message: message.into(),
        }
    }

    /// A failure of a [`CollectionStore`](crate::sync::CollectionStore) implementation.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(source: quick_xml::Error) -> Self {
        Error::Xml { source }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Xml {
            source: quick_xml::Error::Io(std::sync::Arc::new(source)),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(source: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml {
            source: quick_xml::Error::InvalidAttr(source),
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Connection and HTTP-level errors.
    Transport,
    /// Malformed or unexpected XML, SOAP faults.
    Protocol,
    /// Well-formed error responses from the server.
    Application,
    /// Unresolvable folder graph or local store failures.
    Reconciliation,
    /// Autodiscovery failures.
    Discovery,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Application => write!(f, "application"),
            ErrorCategory::Reconciliation => write!(f, "reconciliation"),
            ErrorCategory::Discovery => write!(f, "discovery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        // Configuration errors are not retryable
        let err = Error::InvalidEmailFormat {
            email: "bad".into(),
        };
        assert!(!err.is_retryable());

        // Server errors are retryable, credential rejections are not
        let err = Error::Http {
            status: 503,
            url: "https://mail.example.com/EWS/Exchange.asmx".into(),
        };
        assert!(err.is_retryable());
        let err = Error::Http {
            status: 401,
            url: "https://mail.example.com/EWS/Exchange.asmx".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.is_unauthorized());

        // SOAP faults are terminal
        let err = Error::SoapFault {
            code: "a:ErrorSchemaValidation".into(),
            string: "The request failed schema validation".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_response_code_retryability() {
        let busy = Error::Response {
            operation: "GetFolder".into(),
            code: "ErrorServerBusy".into(),
            message: String::new(),
        };
        assert!(busy.is_retryable());

        let missing = Error::Response {
            operation: "GetFolder".into(),
            code: "ErrorItemNotFound".into(),
            message: String::new(),
        };
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_full_resync_markers() {
        let err = Error::MoveIntoNewFolder {
            folder: "F3".into(),
            parent: "F9".into(),
        };
        assert!(err.requires_full_resync());

        let err = Error::Response {
            operation: "SyncFolderHierarchy".into(),
            code: "ErrorInvalidSyncStateData".into(),
            message: String::new(),
        };
        assert!(err.requires_full_resync());

        let err = Error::store("disk full");
        assert!(!err.requires_full_resync());
    }

    #[test]
    fn test_error_categories() {
        let err = Error::InvalidEmailFormat {
            email: "bad".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = Error::OrphanedFolders {
            ids: vec!["AAMk1".into()],
        };
        assert_eq!(err.category(), ErrorCategory::Reconciliation);
        assert!(err.to_string().contains("AAMk1"));

        let err = Error::AutodiscoverExhausted {
            email: "user@example.com".into(),
            last: None,
        };
        assert_eq!(err.category(), ErrorCategory::Discovery);
        assert!(err.to_string().contains("no candidates remained"));
    }
}
