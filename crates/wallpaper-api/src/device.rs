//! Device classification from the User-Agent header

use serde::Serialize;
use std::fmt;

/// User-agent tokens that mark a phone or tablet browser
const MOBILE_TOKENS: &[&str] = &[
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "iemobile",
    "opera mini",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Mobile => "mobile",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request by its user agent. Missing or unknown agents are Desktop.
pub fn classify(user_agent: &str) -> DeviceClass {
    let user_agent = user_agent.to_lowercase();
    if MOBILE_TOKENS.iter().any(|token| user_agent.contains(token)) {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    }
}
