//! NewType wrappers and core records for the mining domain.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a variable name where a source URL is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MiningError;

/// Suffix appended to every resolver query so lookups stay reproducible.
pub const SEARCH_QUERY_SUFFIX: &str = "technical specs tractordata";

/// Value the extraction backend returns when a variable does not apply.
pub const NOT_APPLICABLE: &str = "N/A";

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Manufacturer name, e.g. "John Deere".
    Company
);

newtype_string!(
    /// Model designation within a company, possibly multi-word
    /// (e.g. "5075E PowrReverse").
    TractorModel
);

newtype_string!(
    /// Identifier of one technical variable to mine (e.g. "rated_power_net").
    ///
    /// Opaque to the orchestrator; the extraction backend maps it to a column.
    VariableName
);

newtype_string!(
    /// Reference page a variable is extracted from.
    SourceUrl
);

/// Identity of a tractor to research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TractorRef {
    pub company: Company,
    pub model: TractorModel,
    /// Predefined reference. `None` means it must be resolved at run time.
    #[serde(default, rename = "url")]
    pub source_url: Option<SourceUrl>,
}

impl TractorRef {
    /// Build a tractor identity, rejecting blank company or model.
    pub fn new(company: impl Into<String>, model: impl Into<String>) -> Result<Self, MiningError> {
        let company = company.into().trim().to_string();
        let model = model.into().trim().to_string();

        if company.is_empty() || model.is_empty() {
            return Err(MiningError::InvalidCommand(
                "se requieren marca y modelo".to_string(),
            ));
        }

        Ok(Self {
            company: Company(company),
            model: TractorModel(model),
            source_url: None,
        })
    }

    /// Attach a predefined reference.
    pub fn with_source(mut self, url: impl Into<SourceUrl>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// "Company Model", the identity the extraction backend stores rows under.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.company, self.model)
    }

    /// Resolver query for this tractor.
    pub fn search_query(&self) -> String {
        format!("{} {} {}", self.company, self.model, SEARCH_QUERY_SUFFIX)
    }
}

impl fmt::Display for TractorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.company, self.model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    NotFound,
    Error,
}

/// Result of one (tractor, variable) extraction attempt as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub status: ExtractionStatus,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionOutcome {
    pub fn success(value: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Success,
            value: Some(value.into()),
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: ExtractionStatus::NotFound,
            value: None,
            error: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Error,
            value: None,
            error: Some(reason.into()),
        }
    }

    /// The value that counts toward the success tally, if any.
    ///
    /// Only a `success` status with a present, non-blank value other than the
    /// `N/A` sentinel counts.
    pub fn counted_value(&self) -> Option<&str> {
        match (self.status, self.value.as_deref()) {
            (ExtractionStatus::Success, Some(v)) if !v.trim().is_empty() && v != NOT_APPLICABLE => {
                Some(v)
            }
            _ => None,
        }
    }

    /// Collapse the outcome into the value or the reason it does not count.
    pub fn into_value(self) -> Result<String, MiningError> {
        if self.counted_value().is_some() {
            return Ok(self.value.unwrap_or_default());
        }

        let reason = match self.status {
            ExtractionStatus::Success => "valor no aplicable".to_string(),
            ExtractionStatus::NotFound => "no encontrado en la fuente".to_string(),
            ExtractionStatus::Error => self
                .error
                .unwrap_or_else(|| "error de extracción".to_string()),
        };

        Err(MiningError::ExtractionFailure(reason))
    }
}
