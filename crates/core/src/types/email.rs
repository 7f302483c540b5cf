//! Email address type.
//!
//! Emails are the login identifier, so they are normalized (trimmed and
//! lowercased) on parse. Two spellings of the same address can never create
//! two accounts.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input is empty after trimming.
    #[error("email cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    InvalidAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain has no dot or an empty label.
    #[error("email domain is invalid")]
    InvalidDomain,
    /// The input contains whitespace.
    #[error("email cannot contain whitespace")]
    Whitespace,
}

/// A normalized email address.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Exactly one @ symbol, non-empty local part
/// - Domain contains a dot and no empty labels
/// - No interior whitespace
///
/// ## Examples
///
/// ```
/// use amyfairy_core::Email;
///
/// let email = Email::parse("  Shopper@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "shopper@example.com");
///
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an `Email`.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first violated constraint.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = trimmed.split_once('@').ok_or(EmailError::InvalidAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::InvalidAtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let email = Email::parse(" Amy.Fairy@Example.com\n").unwrap();
        assert_eq!(email.as_str(), "amy.fairy@example.com");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("plainaddress"), Err(EmailError::InvalidAtSymbol));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::InvalidAtSymbol));
        assert_eq!(Email::parse("@example.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("user@example"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("user@example..com"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("us er@example.com"), Err(EmailError::Whitespace));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"USER@shop.in\"");
        assert_eq!(ok.unwrap().as_str(), "user@shop.in");

        let bad: Result<Email, _> = serde_json::from_str("\"not-an-email\"");
        assert!(bad.is_err());
    }
}
