use thiserror::Error;

/// Primary error type for cubejoin operations.
///
/// Variants fall into two classes: resource failures (a page, lock or
/// segment could not be obtained) that abort the current join, and
/// configuration or usage errors reported before any page is touched.
#[derive(Error, Debug)]
pub enum JoinError {
    // === Catalog Errors ===
    /// No index is registered under the requested name.
    #[error("no such index: {name}")]
    NoSuchIndex { name: String },

    /// Both join inputs name the same index.
    #[error("cannot join index {name} with itself")]
    SelfJoin { name: String },

    // === Page Access Errors ===
    /// A locator did not resolve to a page of the index.
    #[error("page {page} not found in index {index}")]
    PageNotFound { index: String, page: u32 },

    /// A page lock could not be acquired.
    #[error("failed to lock page {page} of index {index}: {detail}")]
    LockFailed {
        index: String,
        page: u32,
        detail: String,
    },

    /// Page contents contradict the page's own header.
    #[error("index {index} is corrupt: {detail}")]
    IndexCorrupt { index: String, detail: String },

    /// Following right links did not terminate within the configured bound.
    #[error("right-link chain in index {index} starting at page {start} exceeds {max} pages")]
    RightLinkChainTooLong { index: String, start: u32, max: usize },

    // === Value Errors ===
    /// A cube could not be constructed from the given coordinates.
    #[error("invalid cube: {detail}")]
    InvalidCube { detail: String },

    /// A configuration value is out of its accepted range.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === Resource Errors ===
    /// A container segment could not be allocated.
    #[error("out of memory")]
    OutOfMemory,

    // === Lifecycle Errors ===
    /// An earlier call failed; the join context must be torn down.
    #[error("join context is poisoned by an earlier failure")]
    Poisoned,
}

impl JoinError {
    /// Whether this error belongs to the fatal resource class: the join that
    /// observed it cannot continue and its context has to be discarded.
    pub const fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::PageNotFound { .. }
                | Self::LockFailed { .. }
                | Self::IndexCorrupt { .. }
                | Self::RightLinkChainTooLong { .. }
                | Self::OutOfMemory
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoSuchIndex { .. } => Some("Check the index name or register the index first"),
            Self::SelfJoin { .. } => Some("Join two distinct indexes"),
            Self::IndexCorrupt { .. } | Self::RightLinkChainTooLong { .. } => {
                Some("Rebuild the index; its page links are inconsistent")
            }
            Self::Poisoned => Some("Tear down this join and set up a new one"),
            Self::InvalidConfig { .. } => Some("Use a positive segment capacity and chain bound"),
            _ => None,
        }
    }

    /// Create an index corruption error.
    pub fn corrupt(index: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            index: index.into(),
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `JoinError`.
pub type Result<T> = std::result::Result<T, JoinError>;
