use std::{fmt, str::FromStr};

use chrono::{DateTime, Local};

use crate::{Error, Result};

/// The single recipient every photo and fallback text goes to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Numeric chat id (private chats, groups, `-100...` supergroups).
    Chat(i64),
    /// Public channel username, including the leading `@`.
    Channel(String),
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Ok(Self::Chat(id));
        }
        if raw.len() > 1 && raw.starts_with('@') && !raw.contains(char::is_whitespace) {
            return Ok(Self::Channel(raw.to_string()));
        }
        Err(Error::Config(format!(
            "invalid chat destination {raw:?}: expected a numeric chat id or @channel"
        )))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "{id}"),
            Self::Channel(name) => f.write_str(name),
        }
    }
}

/// One still frame, already encoded for storage and delivery.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Local>,
}
