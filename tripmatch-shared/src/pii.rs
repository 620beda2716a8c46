use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps host PII (emails, phone numbers) so it never reaches log output.
///
/// `Debug` and `Display` print a fixed mask; `Serialize` emits the real value
/// because admin listings need it on the wire.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

const MASK: &str = "********";

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_value_but_json_keeps_it() {
        let email = Masked("host@example.com".to_string());
        assert_eq!(format!("{:?}", email), MASK);
        assert_eq!(email.to_string(), MASK);
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"host@example.com\"");
        assert_eq!(email.expose(), "host@example.com");
    }
}
