use crate::error::{ErrorKind, QueueError, Result};
use crate::platform::NAME_MAX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '/';

/// A validated queue name such as `/orders`
///
/// The name starts with a single `/`, contains no other `/`, and the part
/// after the slash is between 1 and [`NAME_MAX`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let Some(rest) = name.strip_prefix(SEPARATOR) else {
            return Err(QueueError::invalid(format!(
                "queue name '{}' must start with '{}'",
                name, SEPARATOR
            )));
        };
        if rest.is_empty() {
            return Err(QueueError::invalid("queue name must not be empty"));
        }
        if rest.contains(SEPARATOR) {
            return Err(QueueError::invalid(format!(
                "queue name '{}' must not contain '{}' after the first character",
                name, SEPARATOR
            )));
        }
        if rest.contains('\0') {
            return Err(QueueError::invalid("queue name must not contain NUL bytes"));
        }
        if rest.len() > NAME_MAX {
            return Err(QueueError::new(
                ErrorKind::NameTooLong,
                format!("queue name is {} bytes, limit is {}", rest.len(), NAME_MAX),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for QueueName {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for QueueName {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for QueueName {
    type Error = QueueError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}
