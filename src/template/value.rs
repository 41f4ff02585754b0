//! Field value resolution.
//!
//! Every field resolves through the same fallback chain, in order:
//!
//! 1. submitted form data for the field name (empty counts as absent)
//! 2. the field's `default_value`
//! 3. the field's `label`
//! 4. empty string
//!
//! Resolved values then get `{{variable}}` interpolation against builtin
//! datetime variables merged with caller-provided ones (caller wins).

use std::collections::{BTreeMap, HashMap};

use crate::template::{Field, FormData};

/// Replace `{{key}}` placeholders with values from the variables map.
pub fn interpolate_string(s: &mut String, vars: &HashMap<String, String>) {
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        if s.contains(&placeholder) {
            *s = s.replace(&placeholder, value);
        }
    }
}

/// Builtin variables available to every render.
fn builtin_variables() -> HashMap<String, String> {
    use chrono::Local;

    let now = Local::now();
    let mut vars = HashMap::new();

    vars.insert("date".into(), now.format("%B %-d, %Y").to_string()); // January 27, 2026
    vars.insert("date_short".into(), now.format("%b %-d").to_string()); // Jan 27
    vars.insert("day".into(), now.format("%A").to_string()); // Monday
    vars.insert("time".into(), now.format("%H:%M").to_string()); // 09:30
    vars.insert("year".into(), now.format("%Y").to_string()); // 2026
    vars.insert("iso_date".into(), now.format("%Y-%m-%d").to_string()); // 2026-01-27

    vars
}

/// The fallback chain alone, with no interpolation. First non-empty wins.
pub fn resolve_raw(field: &Field, data: &FormData) -> String {
    if let Some(value) = data.get(&field.name) {
        return value.to_string();
    }
    if let Some(default) = field.default_value.as_deref().filter(|v| !v.is_empty()) {
        return default.to_string();
    }
    if let Some(label) = field.label.as_deref().filter(|v| !v.is_empty()) {
        return label.to_string();
    }
    String::new()
}

/// Form data plus the merged variable map for one render.
#[derive(Debug, Clone)]
pub struct ValueContext<'a> {
    data: &'a FormData,
    vars: HashMap<String, String>,
}

impl<'a> ValueContext<'a> {
    pub fn new(data: &'a FormData, user_vars: &BTreeMap<String, String>) -> Self {
        let mut vars = builtin_variables();
        // User variables override builtins
        vars.extend(user_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { data, vars }
    }

    /// Chain plus interpolation. Produces the final paintable value.
    pub fn resolve(&self, field: &Field) -> String {
        let mut value = resolve_raw(field, self.data);
        interpolate_string(&mut value, &self.vars);
        value
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.vars
    }
}
