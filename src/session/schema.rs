//! # Request Schema Tables
//!
//! Required fields and allowed values of the start-session body, described as
//! data instead of a chain of hand-written checks.
//!
//! ## Check order:
//! 1. Missing top-level fields
//! 2. `agora_settings` must be an object
//! 3. Missing `agora_settings` fields
//! 4. Enumerated values (`quality`, then `video_encoding`)
//!
//! Within one step every offending field is listed; across steps the first
//! failing step wins.

use serde_json::{Map, Value};

/// Rule for one JSON field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    /// When set, the field must be a string equal to one of these values
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldRule {
    const fn required(name: &'static str) -> Self {
        Self { name, required: true, allowed: None }
    }

    const fn one_of(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self { name, required: true, allowed: Some(allowed) }
    }
}

/// A named group of field rules; `scope` is used in messages for nested objects.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub scope: Option<&'static str>,
    pub fields: &'static [FieldRule],
}

pub const QUALITIES: &[&str] = &["low", "medium", "high"];
pub const VIDEO_ENCODINGS: &[&str] = &["H264", "VP8", "AV1"];

pub const START_SESSION: Schema = Schema {
    scope: None,
    fields: &[
        FieldRule::required("avatar_id"),
        FieldRule::one_of("quality", QUALITIES),
        FieldRule::required("version"),
        FieldRule::one_of("video_encoding", VIDEO_ENCODINGS),
        FieldRule::required("agora_settings"),
    ],
};

pub const AGORA_SETTINGS: Schema = Schema {
    scope: Some("agora_settings"),
    fields: &[
        FieldRule::required("app_id"),
        FieldRule::required("token"),
        FieldRule::required("channel"),
        FieldRule::required("uid"),
        FieldRule::required("enable_string_uid"),
    ],
};

impl Schema {
    /// Names of required fields absent from `body`, in table order.
    pub fn missing_fields(&self, body: &Map<String, Value>) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|rule| rule.required && !body.contains_key(rule.name))
            .map(|rule| rule.name)
            .collect()
    }

    pub fn check_required(&self, body: &Map<String, Value>) -> Result<(), String> {
        let missing = self.missing_fields(body);
        if missing.is_empty() {
            return Ok(());
        }

        let scope = self.scope.map(|s| format!("{} ", s)).unwrap_or_default();
        Err(format!("Missing required {}field(s): {}", scope, missing.join(", ")))
    }

    /// First field whose value falls outside its allowed set.
    pub fn check_allowed(&self, body: &Map<String, Value>) -> Result<(), String> {
        for rule in self.fields {
            let (Some(allowed), Some(value)) = (rule.allowed, body.get(rule.name)) else {
                continue;
            };

            let accepted = value.as_str().is_some_and(|v| allowed.contains(&v));
            if !accepted {
                return Err(format!(
                    "Invalid {} value. Must be one of: {}",
                    rule.name,
                    allowed.join(", ")
                ));
            }
        }

        Ok(())
    }
}

/// Run every start-session check against a parsed JSON object.
pub fn validate_start(body: &Map<String, Value>) -> Result<(), String> {
    START_SESSION.check_required(body)?;

    let agora = body
        .get("agora_settings")
        .and_then(Value::as_object)
        .ok_or_else(|| "agora_settings must be a JSON object".to_string())?;

    AGORA_SETTINGS.check_required(agora)?;
    START_SESSION.check_allowed(body)?;
    AGORA_SETTINGS.check_allowed(agora)?;

    Ok(())
}
