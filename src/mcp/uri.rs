//! Resource URI templates.
//!
//! Templates look like `maas://machine/{system_id}/power`. Each `{name}`
//! placeholder matches one non-empty path segment.

use std::collections::HashMap;

use regex::Regex;

/// Parameters extracted from a concrete URI.
pub type UriParams = HashMap<String, String>;

/// Error building a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriTemplateError {
    #[error("unbalanced braces in URI template '{0}'")]
    Unbalanced(String),

    #[error("invalid placeholder '{name}' in URI template '{template}'")]
    InvalidPlaceholder { template: String, name: String },

    #[error("URI template '{0}' has no scheme")]
    MissingScheme(String),
}

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    regex: Regex,
    params: Vec<String>,
}

impl UriTemplate {
    /// Compile a template.
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        if uri_scheme(template).is_none() {
            return Err(UriTemplateError::MissingScheme(template.to_string()));
        }

        let mut pattern = String::from("^");
        let mut params = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(UriTemplateError::Unbalanced(template.to_string()));
            }
            pattern.push_str(&regex::escape(literal));

            let close = tail.find('}').ok_or_else(|| UriTemplateError::Unbalanced(template.to_string()))?;
            let name = &tail[1..close];
            if !is_identifier(name) || params.iter().any(|p| p == name) {
                return Err(UriTemplateError::InvalidPlaceholder {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }
            pattern.push_str(&format!("(?P<{name}>[^/]+)"));
            params.push(name.to_string());
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(UriTemplateError::Unbalanced(template.to_string()));
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|_| UriTemplateError::Unbalanced(template.to_string()))?;
        Ok(Self { template: template.to_string(), regex, params })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Scheme of the template (e.g. `maas`).
    pub fn scheme(&self) -> &str {
        uri_scheme(&self.template).unwrap_or_default()
    }

    /// Match a concrete URI, returning the percent-decoded placeholder values.
    pub fn matches(&self, uri: &str) -> Option<UriParams> {
        let captures = self.regex.captures(uri)?;
        self.params
            .iter()
            .map(|name| {
                let raw = captures.name(name)?.as_str();
                let value = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |v| v.into_owned());
                Some((name.clone(), value))
            })
            .collect()
    }
}

impl std::fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

/// Scheme of a URI, if it has the `scheme://` form.
pub fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
