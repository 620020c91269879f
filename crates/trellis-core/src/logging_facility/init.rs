//! Process-wide subscriber installation

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output profile of the logging facility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, `trellis=debug`
    Development,
    /// One JSON object per event, `trellis=info`
    Production,
    /// No sink; tests install `init_test_capture()` instead
    Test,
}

impl Profile {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "trellis=debug",
            Profile::Production => "trellis=info",
            Profile::Test => "off",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Call once per process. Later calls are ignored, whatever the profile.
/// `RUST_LOG` overrides the profile's default filter.
///
/// # Example
///
/// ```
/// use trellis_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .with_target(true)
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .with_current_span(false)
                .init();
        }
        Profile::Test => {
            tracing_subscriber::registry().init();
        }
    });
}
