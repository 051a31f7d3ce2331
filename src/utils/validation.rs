use crate::utils::error::{BundleError, Result};
use regex::Regex;
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BundleError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Domain names become file names, so they are restricted to `[a-z][a-z0-9_]*`.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    let valid = value
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Must start with a lowercase letter and contain only [a-z0-9_]".to_string(),
        });
    }
    Ok(())
}

pub fn validate_unique<'a, I>(field_name: &str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(BundleError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Duplicate entry".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_regex(context: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| BundleError::InvalidPatternError {
        context: context.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BundleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("output.contact.url", "https://example.com").is_ok());
        assert!(validate_url("output.contact.url", "http://example.com").is_ok());
        assert!(validate_url("output.contact.url", "").is_err());
        assert!(validate_url("output.contact.url", "invalid-url").is_err());
        assert!(validate_url("output.contact.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("domains[0].name", "load_balancer").is_ok());
        assert!(validate_identifier("domains[0].name", "dns2").is_ok());
        assert!(validate_identifier("domains[0].name", "Load").is_err());
        assert!(validate_identifier("domains[0].name", "http-lb").is_err());
        assert!(validate_identifier("domains[0].name", "").is_err());
        assert!(validate_identifier("domains[0].name", "9lives").is_err());
    }

    #[test]
    fn test_validate_unique() {
        assert!(validate_unique("domains", ["a", "b"]).is_ok());
        assert!(validate_unique("domains", ["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_validate_regex_reports_pattern() {
        let err = validate_regex("rules.path[2]", "(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
        assert!(validate_regex("rules.path[2]", r"/dns_zones").is_ok());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("output.json_indent", 2usize, 0, 8).is_ok());
        assert!(validate_range("output.json_indent", 12usize, 0, 8).is_err());
    }
}
