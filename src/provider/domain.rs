//! Core provider domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A validated, non-empty provider code, e.g. `"PJP01"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct ProviderCode(String);

impl ProviderCode {
    /// Create a provider code.
    ///
    /// Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyProviderCode] if `code` is empty.
    pub fn new(code: &str) -> Result<Self, Error> {
        let code = code.trim();

        if code.is_empty() {
            Err(Error::EmptyProviderCode)
        } else {
            Ok(Self(code.to_owned()))
        }
    }

    /// Create a provider code without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl AsRef<str> for ProviderCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProviderCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderCode::new(s)
    }
}

impl Display for ProviderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entry of the provider reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Provider {
    /// The code used in transaction exports.
    pub code: ProviderCode,
    /// The display name.
    pub name: String,
    /// An alternative name, e.g. the brand name of a bank.
    pub second_name: Option<String>,
    /// The registered legal entity (PT) name.
    pub pt_name: Option<String>,
}

impl Provider {
    /// Create a provider with no alternative or legal names.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmptyProviderName] if `name` is empty or whitespace.
    pub fn new(code: ProviderCode, name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::EmptyProviderName);
        }

        Ok(Self {
            code,
            name: name.to_owned(),
            second_name: None,
            pt_name: None,
        })
    }

    /// Set the alternative name. Blank names are stored as `None`.
    pub fn second_name(mut self, second_name: &str) -> Self {
        self.second_name = non_blank(second_name);
        self
    }

    /// Set the legal entity name. Blank names are stored as `None`.
    pub fn pt_name(mut self, pt_name: &str) -> Self {
        self.pt_name = non_blank(pt_name);
        self
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        provider::{Provider, ProviderCode},
    };

    #[test]
    fn code_fails_on_empty_string() {
        assert_eq!(ProviderCode::new(""), Err(Error::EmptyProviderCode));
        assert_eq!(ProviderCode::new("\n\t "), Err(Error::EmptyProviderCode));
    }

    #[test]
    fn code_is_trimmed() {
        let code: ProviderCode = " PJP01 ".parse().unwrap();

        assert_eq!(code.as_ref(), "PJP01");
    }

    #[test]
    fn provider_name_cannot_be_blank() {
        let result = Provider::new(ProviderCode::new_unchecked("A"), "  ");

        assert_eq!(result, Err(Error::EmptyProviderName));
    }

    #[test]
    fn blank_optional_names_are_none() {
        let provider = Provider::new(ProviderCode::new_unchecked("A"), "Bank A")
            .unwrap()
            .second_name(" ")
            .pt_name("PT Bank A Tbk");

        assert_eq!(provider.second_name, None);
        assert_eq!(provider.pt_name.as_deref(), Some("PT Bank A Tbk"));
    }
}
