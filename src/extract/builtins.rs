//! Built-in extractor variants.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractError;
use crate::http::Response;

use super::{Extractor, ExtractorFactory};

pub(super) fn builtin_extractors() -> Vec<(&'static str, ExtractorFactory)> {
    vec![
        ("Body", from_spec::<BodyExtractor>),
        ("Header", from_spec::<HeaderExtractor>),
        ("Cookie", from_spec::<CookieExtractor>),
    ]
}

fn from_spec<E>(spec: &Value) -> Result<Box<dyn Extractor>, ExtractError>
where
    E: Extractor + serde::de::DeserializeOwned + 'static,
{
    let extractor: E = serde_json::from_value(spec.clone())
        .map_err(|err| ExtractError::Malformed(err.to_string()))?;
    Ok(Box::new(extractor))
}

/// Captures a value from the body with a regular expression. Uses the
/// first capture group when one exists, the whole match otherwise.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BodyExtractor {
    pub regexp: String,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl Extractor for BodyExtractor {
    fn prepare(&mut self) -> Result<(), ExtractError> {
        if self.regexp.is_empty() {
            return Err(ExtractError::Malformed("missing regexp".to_owned()));
        }
        let regex = Regex::new(&self.regexp)
            .map_err(|err| ExtractError::Malformed(format!("invalid regexp: {err}")))?;
        self.compiled = Some(regex);
        Ok(())
    }

    fn extract(&self, response: &Response) -> Result<String, ExtractError> {
        let regex = self
            .compiled
            .as_ref()
            .ok_or_else(|| ExtractError::Malformed("regexp was not compiled".to_owned()))?;
        let text = response.body_text();
        let captures = regex.captures(&text).ok_or_else(|| {
            ExtractError::NotFound(format!("body does not match /{}/", self.regexp))
        })?;
        let value = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|found| found.as_str().to_owned())
            .ok_or_else(|| ExtractError::NotFound("empty match".to_owned()))?;
        Ok(value)
    }
}

/// Reads a response header verbatim.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HeaderExtractor {
    pub header: String,
}

impl Extractor for HeaderExtractor {
    fn prepare(&mut self) -> Result<(), ExtractError> {
        if self.header.is_empty() {
            return Err(ExtractError::Malformed("missing header name".to_owned()));
        }
        Ok(())
    }

    fn extract(&self, response: &Response) -> Result<String, ExtractError> {
        response
            .header(&self.header)
            .map(str::to_owned)
            .ok_or_else(|| ExtractError::NotFound(format!("header {} missing", self.header)))
    }
}

/// Reads the value of a cookie set by the response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CookieExtractor {
    pub name: String,
}

impl Extractor for CookieExtractor {
    fn prepare(&mut self) -> Result<(), ExtractError> {
        if self.name.is_empty() {
            return Err(ExtractError::Malformed("missing cookie name".to_owned()));
        }
        Ok(())
    }

    fn extract(&self, response: &Response) -> Result<String, ExtractError> {
        response
            .set_cookies()
            .into_iter()
            .find(|(name, _)| name == &self.name)
            .map(|(_, value)| value)
            .ok_or_else(|| ExtractError::NotFound(format!("cookie {} not set", self.name)))
    }
}
