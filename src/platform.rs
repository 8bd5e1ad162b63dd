use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// key: platform-detection -> which billing integration backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported platform '{0}'; expected 'ios', 'android' or 'web'")]
pub struct UnsupportedPlatform(pub String);

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }

    /// StoreKit / Play Billing are only reachable from the native shells.
    pub fn is_native(&self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }

    /// Subscription management page of the platform store, if it has one.
    pub fn management_url(&self) -> Option<&'static str> {
        match self {
            Platform::Ios => Some("https://apps.apple.com/account/subscriptions"),
            Platform::Android => Some("https://play.google.com/store/account/subscriptions"),
            Platform::Web => None,
        }
    }

    /// Log label used by the store adapter.
    pub fn store_label(&self) -> &'static str {
        match self {
            Platform::Ios => "storekit",
            Platform::Android => "play_billing",
            Platform::Web => "simulated",
        }
    }
}

impl FromStr for Platform {
    type Err = UnsupportedPlatform;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "web" => Ok(Platform::Web),
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
