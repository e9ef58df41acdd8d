use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Recording session identifier
/// Format: "{YYYYMMDD}_{HHMMSS}" in local time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Derive a session id from a unix timestamp in milliseconds.
    /// 根据毫秒时间戳生成会话 ID。
    ///
    /// Out-of-range timestamps fall back to the raw millisecond value.
    pub fn from_timestamp_ms(now_ms: i64) -> Self {
        match Local.timestamp_millis_opt(now_ms).single() {
            Some(at) => Self(at.format("%Y%m%d_%H%M%S").to_string()),
            None => Self(now_ms.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
