// SPDX-License-Identifier: MIT

//! Identifier newtypes for jobs and GPUs.
//!
//! Both are site-assigned opaque strings (e.g. `"job-42"`, `"pc1-rtx3090"`);
//! the wrappers exist so the two cannot be swapped in signatures.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Identifier of a tenant job running at the site.
    JobId
}

string_id! {
    /// Identifier of a GPU worker (host + card) at the site.
    GpuId
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
