//! Built-in check variants.

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::args::parse_duration;
use crate::error::CheckError;
use crate::http::Response;

use super::Check;
use super::registry::CheckFactory;

pub(super) fn builtin_checks() -> Vec<(&'static str, CheckFactory)> {
    vec![
        ("StatusCode", from_spec::<StatusCode>),
        ("Body", from_spec::<Body>),
        ("Header", from_spec::<Header>),
        ("SetCookie", from_spec::<SetCookie>),
        ("Latency", from_spec::<Latency>),
        ("JSON", from_spec::<Json>),
    ]
}

fn from_spec<C>(spec: &Value) -> Result<Box<dyn Check>, CheckError>
where
    C: Check + serde::de::DeserializeOwned + 'static,
{
    let check: C = serde_json::from_value(spec.clone())
        .map_err(|err| CheckError::Malformed(err.to_string()))?;
    Ok(Box::new(check))
}

/// Expects the numeric HTTP status to equal `Expect` (default 200).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCode {
    #[serde(default = "default_expect")]
    pub expect: u16,
}

fn default_expect() -> u16 {
    200
}

impl Check for StatusCode {
    fn name(&self) -> &'static str {
        "StatusCode"
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        if response.status == self.expect {
            Ok(())
        } else {
            Err(CheckError::Failed(format!(
                "got {}, want {}",
                response.status, self.expect
            )))
        }
    }

    fn gate_status(&self) -> Option<u16> {
        Some(self.expect)
    }
}

/// Assertions on the response body: substring, prefix, regular
/// expression, and size bounds in bytes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Body {
    pub contains: Option<String>,
    pub prefix: Option<String>,
    pub regexp: Option<String>,
    pub min: Option<usize>,
    pub max: Option<usize>,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl Check for Body {
    fn name(&self) -> &'static str {
        "Body"
    }

    fn prepare(&mut self) -> Result<(), CheckError> {
        if let Some(pattern) = self.regexp.as_ref() {
            let regex = Regex::new(pattern)
                .map_err(|err| CheckError::Malformed(format!("invalid regexp: {err}")))?;
            self.compiled = Some(regex);
        }
        Ok(())
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        let text = response.body_text();
        if let Some(needle) = self.contains.as_ref()
            && !text.contains(needle.as_str())
        {
            return Err(CheckError::Failed(format!(
                "body does not contain {needle:?}"
            )));
        }
        if let Some(prefix) = self.prefix.as_ref()
            && !text.starts_with(prefix.as_str())
        {
            return Err(CheckError::Failed(format!(
                "body does not start with {prefix:?}"
            )));
        }
        if self.regexp.is_some() {
            let regex = self
                .compiled
                .as_ref()
                .ok_or_else(|| CheckError::Malformed("regexp was not compiled".to_owned()))?;
            if !regex.is_match(&text) {
                return Err(CheckError::Failed(format!(
                    "body does not match /{}/",
                    regex.as_str()
                )));
            }
        }
        if let Some(min) = self.min
            && response.body.len() < min
        {
            return Err(CheckError::Failed(format!(
                "body is {} bytes, want at least {min}",
                response.body.len()
            )));
        }
        if let Some(max) = self.max
            && response.body.len() > max
        {
            return Err(CheckError::Failed(format!(
                "body is {} bytes, want at most {max}",
                response.body.len()
            )));
        }
        Ok(())
    }
}

/// Asserts on one response header: presence, absence, exact value, or
/// substring.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Header {
    pub header: String,
    pub equals: Option<String>,
    pub contains: Option<String>,
    pub absent: bool,
}

impl Check for Header {
    fn name(&self) -> &'static str {
        "Header"
    }

    fn prepare(&mut self) -> Result<(), CheckError> {
        if self.header.is_empty() {
            return Err(CheckError::Malformed("missing header name".to_owned()));
        }
        Ok(())
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        let value = response.header(&self.header);
        if self.absent {
            return if value.is_none() {
                Ok(())
            } else {
                Err(CheckError::Failed(format!(
                    "header {} present, want absent",
                    self.header
                )))
            };
        }
        let Some(value) = value else {
            return Err(CheckError::Failed(format!(
                "header {} missing",
                self.header
            )));
        };
        if let Some(expected) = self.equals.as_ref()
            && value != expected.as_str()
        {
            return Err(CheckError::Failed(format!(
                "header {} is {value:?}, want {expected:?}",
                self.header
            )));
        }
        if let Some(needle) = self.contains.as_ref()
            && !value.contains(needle.as_str())
        {
            return Err(CheckError::Failed(format!(
                "header {} is {value:?}, want substring {needle:?}",
                self.header
            )));
        }
        Ok(())
    }
}

/// Requires the response to set a cookie, optionally with a given value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SetCookie {
    pub name: String,
    pub value: Option<String>,
}

impl Check for SetCookie {
    fn name(&self) -> &'static str {
        "SetCookie"
    }

    fn prepare(&mut self) -> Result<(), CheckError> {
        if self.name.is_empty() {
            return Err(CheckError::Malformed("missing cookie name".to_owned()));
        }
        Ok(())
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        let cookies = response.set_cookies();
        let Some((_, actual)) = cookies.iter().find(|(name, _)| name == &self.name) else {
            return Err(CheckError::Failed(format!(
                "cookie {} not set",
                self.name
            )));
        };
        if let Some(expected) = self.value.as_ref()
            && actual != expected
        {
            return Err(CheckError::Failed(format!(
                "cookie {} is {actual:?}, want {expected:?}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Bounds the round-trip time of the final request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Latency {
    /// Duration string, e.g. `250ms` or `2s`.
    pub max: String,
    #[serde(skip)]
    limit: Option<Duration>,
}

impl Check for Latency {
    fn name(&self) -> &'static str {
        "Latency"
    }

    fn prepare(&mut self) -> Result<(), CheckError> {
        let limit = parse_duration(&self.max)
            .map_err(|err| CheckError::Malformed(err.to_string()))?;
        self.limit = Some(limit);
        Ok(())
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        let limit = self
            .limit
            .ok_or_else(|| CheckError::Malformed("latency limit was not compiled".to_owned()))?;
        if response.duration <= limit {
            Ok(())
        } else {
            Err(CheckError::Failed(format!(
                "took {}ms, want at most {}ms",
                response.duration.as_millis(),
                limit.as_millis()
            )))
        }
    }
}

/// Parses the body as JSON and compares the element at a dotted path.
/// Without `Equals` the element only has to exist.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Json {
    /// Dotted path like `data.items.0.id`; empty selects the root.
    pub element: String,
    pub equals: Option<Value>,
}

impl Check for Json {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn execute(&self, response: &Response) -> Result<(), CheckError> {
        let root: Value = serde_json::from_slice(&response.body)
            .map_err(|err| CheckError::Failed(format!("body is not valid JSON: {err}")))?;
        let mut element = &root;
        for segment in self.element.split('.').filter(|s| !s.is_empty()) {
            element = match element {
                Value::Object(fields) => fields.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
            }
            .ok_or_else(|| {
                CheckError::Failed(format!("element {} not found", self.element))
            })?;
        }
        if let Some(expected) = self.equals.as_ref()
            && element != expected
        {
            return Err(CheckError::Failed(format!(
                "element {} is {element}, want {expected}",
                self.element
            )));
        }
        Ok(())
    }
}
