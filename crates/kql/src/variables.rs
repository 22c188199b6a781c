//! Template variable support
//!
//! Variable queries either list resources of a subscription or run a KQL
//! query whose first column provides the values. Selected values are
//! interpolated back into KQL text.

use crate::KqlError;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

/// Parsed variable query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableQuery {
    /// `resources()` or `resources(<subscription>)`
    Resources { subscription: Option<String> },
    /// Any other text is run as KQL
    Kql(String),
}

fn resources_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)^resources\(["']?([^)]+?)["']?\)"#).expect("valid regex"))
}

impl VariableQuery {
    pub fn parse(query: &str) -> Self {
        const BARE: &str = "resources()";
        if query
            .get(..BARE.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BARE))
        {
            return VariableQuery::Resources { subscription: None };
        }

        if let Some(captures) = resources_regex().captures(query) {
            let subscription = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            return VariableQuery::Resources { subscription };
        }

        VariableQuery::Kql(query.to_string())
    }
}

/// Current value of a template variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

/// Format a variable value for KQL.
///
/// Single text values are quoted only for multi-value or include-all
/// variables; lists are quoted and comma-joined.
pub fn interpolate_variable(value: &VariableValue, multi: bool, include_all: bool) -> String {
    match value {
        VariableValue::Text(text) if multi || include_all => format!("'{}'", text),
        VariableValue::Text(text) => text.clone(),
        VariableValue::Number(n) => n.to_string(),
        VariableValue::List(values) => values
            .iter()
            .map(|v| format!("'{}'", v))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// A dashboard variable and its current value
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateVariable {
    pub name: String,
    pub value: VariableValue,
    pub multi: bool,
    pub include_all: bool,
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>, value: VariableValue) -> Self {
        Self {
            name: name.into(),
            value,
            multi: false,
            include_all: false,
        }
    }

    /// Text substituted for the variable in KQL
    pub fn interpolated(&self) -> String {
        interpolate_variable(&self.value, self.multi, self.include_all)
    }
}

/// Parses `name=value`; a comma separated value becomes a multi-value list.
impl FromStr for TemplateVariable {
    type Err = KqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| KqlError::InvalidVariable(s.to_string()))?;

        let name = name.trim().trim_start_matches('$');
        if value.contains(',') {
            let values = value.split(',').map(|v| v.trim().to_string()).collect();
            Ok(TemplateVariable {
                multi: true,
                ..TemplateVariable::new(name, VariableValue::List(values))
            })
        } else {
            Ok(TemplateVariable::new(name, VariableValue::Text(value.to_string())))
        }
    }
}

/// Replace `$name` and `${name}` references with interpolated values.
///
/// References to unknown variables are left in place, as are `$name` prefixes
/// of longer identifiers.
pub fn apply_template_variables(query: &str, variables: &[TemplateVariable]) -> String {
    let mut result = query.to_string();
    for variable in variables {
        let name = regex::escape(&variable.name);
        let pattern = match Regex::new(&format!(r"\$\{{{name}\}}|\${name}\b")) {
            Ok(pattern) => pattern,
            Err(_) => continue,
        };
        let replacement = variable.interpolated();
        result = pattern
            .replace_all(&result, regex::NoExpand(&replacement))
            .into_owned();
    }
    result
}
