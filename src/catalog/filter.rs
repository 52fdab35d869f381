use indexmap::IndexMap;
use thiserror::Error;

/// Index field used to exclude harvested records by default.
const HARVESTED_FIELD: &str = "_isHarvested";

/// Friendly names accepted in filter expressions, mapped to index fields.
/// Anything not listed here is passed through to the catalog verbatim.
fn map_field(name: &str) -> &str {
    match name {
        "group" => "_groupOwner",
        "harvested" => HARVESTED_FIELD,
        "source" => "_source",
        "template" => "_isTemplate",
        "uuid" => "_uuid",
        other => other,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("filter term '{0}' is not of the form field=value")]
    MalformedTerm(String),
    #[error("filter term has an empty field name")]
    EmptyField,
}

/// A conjunction of `field=value` search terms, order-preserving.
///
/// Terms are not validated against the catalog schema; unsupported fields are
/// forwarded as-is and left for the catalog to interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    terms: IndexMap<String, String>,
}

impl FilterExpression {
    /// Parse a comma-separated `field=value` list. Whitespace around fields
    /// and values is trimmed; a later duplicate field overrides an earlier one.
    pub fn parse(expression: &str) -> Result<Self, FilterParseError> {
        let mut terms = IndexMap::new();
        for term in expression.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let (field, value) = term
                .split_once('=')
                .ok_or_else(|| FilterParseError::MalformedTerm(term.to_string()))?;
            let field = field.trim();
            if field.is_empty() {
                return Err(FilterParseError::EmptyField);
            }
            terms.insert(field.to_string(), value.trim().to_string());
        }
        Ok(FilterExpression { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.terms.insert(field.into(), value.into());
    }

    /// Resolve to the query parameters sent to the catalog search endpoint.
    ///
    /// Harvested records are excluded unless the expression names the
    /// harvested field itself (under either its friendly or index name).
    pub fn to_search_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::with_capacity(self.terms.len() + 1);
        let overrides_harvested = self
            .terms
            .keys()
            .any(|k| map_field(k) == HARVESTED_FIELD);
        if !overrides_harvested {
            params.push((HARVESTED_FIELD.to_string(), "n".to_string()));
        }
        for (field, value) in &self.terms {
            let mapped = map_field(field);
            let value = if mapped == HARVESTED_FIELD {
                normalize_flag(value)
            } else {
                value.clone()
            };
            params.push((mapped.to_string(), value));
        }
        params
    }
}

impl std::fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, value) in &self.terms {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{field}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// The harvested flag accepts boolean-ish spellings; the index wants y/n.
fn normalize_flag(value: &str) -> String {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => "y".to_string(),
        "false" | "no" | "n" => "n".to_string(),
        other => other.to_string(),
    }
}
