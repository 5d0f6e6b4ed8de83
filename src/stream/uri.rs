// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stream source URIs.
//!
//! `scheme://host/path?key=value&...` - the scheme selects the adapter, the
//! query carries its settings. Parsed once and never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::common::constants::uri as keys;
use crate::common::errors::SourceError;

/// Query keys whose values are masked in every rendering of the URI.
const SECRET_KEYS: [&str; 2] = ["username", "password"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUri {
    url: Url,
    query: BTreeMap<String, String>,
}

impl StreamUri {
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        let url = Url::parse(raw.trim()).map_err(|e| SourceError::InvalidUri {
            uri: redact_raw(raw),
            reason: e.to_string(),
        })?;
        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self { url, query })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Value for `key`, treating an empty value like a missing one.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_non_empty(key).unwrap_or(default)
    }

    /// Display name of the source; every source needs one.
    pub fn name(&self) -> Result<&str, SourceError> {
        self.get_non_empty(keys::NAME).ok_or_else(|| {
            SourceError::invalid_configuration("missing parameter \"name\"")
        })
    }

    /// Parse an optional value, failing when it is present but malformed.
    pub fn parse_param<T: FromStr>(&self, key: &str) -> Result<Option<T>, SourceError> {
        match self.get_non_empty(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                SourceError::invalid_configuration(format!(
                    "parameter \"{}\" has invalid value \"{}\"",
                    key,
                    self.display_value(key, raw)
                ))
            }),
        }
    }

    /// Boolean switch: `true`/`1` and `false`/`0`, absent means `false`.
    pub fn flag(&self, key: &str) -> Result<bool, SourceError> {
        match self.get_non_empty(key) {
            None => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(v) => Err(SourceError::invalid_configuration(format!(
                "parameter \"{}\" must be true or false, got \"{}\"",
                key, v
            ))),
        }
    }

    /// The URI with credentials masked, safe for logs and status output.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        if self.query.keys().any(|k| SECRET_KEYS.contains(&k.as_str())) {
            let pairs: Vec<(String, String)> = self
                .url
                .query_pairs()
                .map(|(k, v)| {
                    let v = self.display_value(&k, &v).to_string();
                    (k.into_owned(), v)
                })
                .collect();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.to_string()
    }

    fn display_value<'a>(&self, key: &str, value: &'a str) -> &'a str {
        if SECRET_KEYS.contains(&key) {
            "xxx"
        } else {
            value
        }
    }
}

impl fmt::Display for StreamUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl FromStr for StreamUri {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Best-effort masking for text that did not parse as a URI.
fn redact_raw(raw: &str) -> String {
    match raw.split_once('?') {
        Some((base, query)) if SECRET_KEYS.iter().any(|k| query.contains(k)) => {
            format!("{}?<redacted>", base)
        }
        _ => raw.to_string(),
    }
}
