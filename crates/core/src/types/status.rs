//! Status enums exposed to the presentation layer.

use serde::{Deserialize, Serialize};

/// Checkout/payment progress driving the blocking confirmation overlay.
///
/// Valid transitions:
/// - `Idle -> Pending` when a checkout is initiated
/// - `Pending -> Success` when the gateway confirms
/// - `Pending -> Failed` when the gateway rejects
/// - `Pending | Success | Failed -> Idle` when the user dismisses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Whether the confirmation overlay should block the page.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Coarse scan status for the scan button affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Detected,
    Error,
    TimedOut,
}

/// Which physical capability produced a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    /// Proximity tag reader (NFC).
    Tag,
    /// Camera-based QR/barcode reader.
    Camera,
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag => write!(f, "tag"),
            Self::Camera => write!(f, "camera"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_serde() {
        let json = serde_json::to_string(&PaymentStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }

    #[test]
    fn test_only_idle_is_non_blocking() {
        assert!(!PaymentStatus::Idle.is_blocking());
        assert!(PaymentStatus::Pending.is_blocking());
        assert!(PaymentStatus::Success.is_blocking());
        assert!(PaymentStatus::Failed.is_blocking());
    }
}
