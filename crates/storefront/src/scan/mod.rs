//! Tag and code scanning.
//!
//! Proximity-tag readers and camera code readers are both modelled as a
//! [`ScanCapability`] that produces one payload per read. The [`ScanAdapter`]
//! runs at most one read at a time, races it against a timeout, and turns the
//! result into a product identifier the session can navigate to.

mod adapter;
mod capability;

pub use adapter::{DEFAULT_FALLBACK_PRODUCT, DEFAULT_SCAN_TIMEOUT, ScanAdapter, ScanSnapshot};
pub use capability::{ChannelScanner, ScanFeed, UnsupportedScanner};

use async_trait::async_trait;
use suq_core::{ProductId, ScanSource, ScanStatus};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::navigation::{Page, parse_route};

/// URI scheme accepted for product tags (`product:prod4`).
const PRODUCT_URI_PREFIX: &str = "product:";

/// Errors produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The device has no such capability (e.g., no Web NFC).
    #[error("{0} scanning is not supported on this device")]
    Unsupported(ScanSource),

    /// The capability reported a hardware or permission failure.
    #[error("scanner failure: {0}")]
    Hardware(String),

    /// The payload does not identify a product.
    #[error("unrecognized scan payload: {0}")]
    UnrecognizedPayload(String),

    /// The event source went away.
    #[error("scanner closed")]
    Closed,

    /// The read was cancelled before producing a result.
    #[error("scan aborted")]
    Aborted,
}

/// Raw data read from a tag or code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for ScanPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// A physical scanning capability.
#[async_trait]
pub trait ScanCapability: Send + Sync {
    /// Which kind of scanner this is.
    fn source(&self) -> ScanSource;

    /// Read a single payload. Implementations must stop listening and return
    /// promptly once `cancel` fires.
    async fn read(&self, cancel: CancellationToken) -> Result<ScanPayload, ScanError>;

    /// Called when a new session starts on this capability, before its first
    /// read. Anything still buffered from an earlier session must be dropped.
    fn reset(&self) {}
}

/// Where a scan currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning { source: ScanSource },
    Detected(ProductId),
    Failed(ScanError),
    TimedOut,
}

impl ScanState {
    /// Coarse status for the scan button.
    #[must_use]
    pub const fn status(&self) -> ScanStatus {
        match self {
            Self::Idle => ScanStatus::Idle,
            Self::Scanning { .. } => ScanStatus::Scanning,
            Self::Detected(_) => ScanStatus::Detected,
            Self::Failed(_) => ScanStatus::Error,
            Self::TimedOut => ScanStatus::TimedOut,
        }
    }

    #[must_use]
    pub const fn is_scanning(&self) -> bool {
        matches!(self, Self::Scanning { .. })
    }
}

/// Map a scanned payload to a product identifier.
///
/// Accepted forms: a storefront URL or path (`https://suq.et/product/prod4`,
/// `/product/prod4`), a `product:` URI, or a bare identifier.
///
/// # Errors
///
/// Returns [`ScanError::UnrecognizedPayload`] if no product can be derived.
pub fn resolve_payload(payload: &ScanPayload) -> Result<ProductId, ScanError> {
    let text = match payload {
        ScanPayload::Text(text) => text.trim().to_owned(),
        ScanPayload::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map_err(|_| ScanError::UnrecognizedPayload(format!("{} binary bytes", bytes.len())))?
            .trim()
            .to_owned(),
    };

    if text.is_empty() {
        return Err(ScanError::UnrecognizedPayload("empty payload".to_string()));
    }

    if let Some(id) = text.strip_prefix(PRODUCT_URI_PREFIX) {
        return bare_identifier(id);
    }

    if text.starts_with('/') || text.contains("://") {
        return match parse_route(&text) {
            Ok(entry) if entry.page == Page::ProductDetail => entry
                .params
                .product_id
                .ok_or(ScanError::UnrecognizedPayload(text)),
            _ => Err(ScanError::UnrecognizedPayload(text)),
        };
    }

    bare_identifier(&text)
}

fn bare_identifier(text: &str) -> Result<ProductId, ScanError> {
    let valid = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(ProductId::new(text))
    } else {
        Err(ScanError::UnrecognizedPayload(text.to_owned()))
    }
}
