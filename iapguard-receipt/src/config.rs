//! Validation configuration.

use std::borrow::Cow;

/// Code requirement checked against the running executable by default.
pub const DEFAULT_CODE_REQUIREMENT: &str = "anchor apple generic";

/// The bundle identity this binary was built as.
///
/// Normally a compile-time constant; tools that check someone else's
/// receipt build one at runtime with [`ExpectedIdentity::owned`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedIdentity {
    pub bundle_id: Cow<'static, str>,
    pub bundle_version: Cow<'static, str>,
}

impl ExpectedIdentity {
    #[must_use]
    pub const fn new(bundle_id: &'static str, bundle_version: &'static str) -> Self {
        Self {
            bundle_id: Cow::Borrowed(bundle_id),
            bundle_version: Cow::Borrowed(bundle_version),
        }
    }

    pub fn owned(bundle_id: impl Into<String>, bundle_version: impl Into<String>) -> Self {
        Self {
            bundle_id: Cow::Owned(bundle_id.into()),
            bundle_version: Cow::Owned(bundle_version.into()),
        }
    }

    /// Identity baked in at compile time through `IAPGUARD_BUNDLE_ID` and
    /// `IAPGUARD_BUNDLE_VERSION`. `None` if either was unset at build time.
    #[must_use]
    pub const fn from_build_env() -> Option<Self> {
        match (
            option_env!("IAPGUARD_BUNDLE_ID"),
            option_env!("IAPGUARD_BUNDLE_VERSION"),
        ) {
            (Some(bundle_id), Some(bundle_version)) => Some(Self::new(bundle_id, bundle_version)),
            _ => None,
        }
    }
}

/// Which checks are enforced.
///
/// Release builds enforce everything. Debug builds tolerate a missing
/// receipt file and a bundle version mismatch so pre-release binaries can
/// run before the store has issued a receipt for the new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Reject a receipt whose bundle version differs from the expected one.
    pub enforce_bundle_version: bool,
    /// Reject startup when no receipt file exists.
    pub require_receipt: bool,
    /// Requirement passed to the code identity verifier.
    pub code_requirement: String,
}

impl ValidationPolicy {
    /// Every check enforced.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            enforce_bundle_version: true,
            require_receipt: true,
            code_requirement: DEFAULT_CODE_REQUIREMENT.to_string(),
        }
    }

    /// Version mismatch and missing receipt tolerated.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            enforce_bundle_version: false,
            require_receipt: false,
            ..Self::strict()
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::lenient()
        } else {
            Self::strict()
        }
    }
}
