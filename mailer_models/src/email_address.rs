use std::{fmt, str::FromStr};

use lettre::{address::AddressError, message::Mailbox};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress(pub lettre::Address);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddressWithName(pub Mailbox);

#[derive(Debug, Error)]
pub enum EmailAddressError {
    #[error("The email address is empty.")]
    Empty,
    #[error("The email address is invalid: {0}")]
    Address(#[from] AddressError),
    #[error("The display name contains control characters.")]
    Name,
}

impl EmailAddress {
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    pub fn domain(&self) -> &str {
        self.0.domain()
    }

    pub fn with_name(self, name: String) -> EmailAddressWithName {
        EmailAddressWithName(Mailbox {
            name: Some(name),
            email: self.0,
        })
    }
}

impl EmailAddressWithName {
    /// Combines a bare address and an optional display name.
    ///
    /// Blank names are dropped, names containing control characters are
    /// rejected since they would end up in a header line.
    pub fn from_parts(address: &str, name: Option<&str>) -> Result<Self, EmailAddressError> {
        if address.is_empty() {
            return Err(EmailAddressError::Empty);
        }

        let email = address.parse::<lettre::Address>()?;
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        if name.is_some_and(|name| name.chars().any(char::is_control)) {
            return Err(EmailAddressError::Name);
        }

        Ok(Self(Mailbox::new(name.map(Into::into), email)))
    }

    pub fn email(&self) -> &str {
        self.0.email.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn into_email_address(self) -> EmailAddress {
        EmailAddress(self.0.email)
    }
}

impl From<EmailAddress> for EmailAddressWithName {
    fn from(value: EmailAddress) -> Self {
        Self(Mailbox::new(None, value.0))
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for EmailAddressWithName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl FromStr for EmailAddressWithName {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl TryFrom<&str> for EmailAddress {
    type Error = <Self as FromStr>::Err;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
