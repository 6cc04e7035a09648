//! Team member model and the validated field set used to write it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_LINK_LEN: usize = 255;
pub const MAX_PHONE_LEN: usize = 20;

/// A team member profile as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    /// Blob store path, or an absolute URL once prepared for the public API.
    pub profile_image: Option<String>,
    pub telegram_link: Option<String>,
    pub facebook_link: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    /// Rewrite `profile_image` into an absolute URL under `{base_url}/storage/`.
    pub fn with_public_image_url(mut self, base_url: &str) -> Self {
        if let Some(path) = self.profile_image.take() {
            self.profile_image = Some(format!(
                "{}/storage/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ));
        }
        self
    }
}

/// Raw submitted values, before validation.
///
/// Every field is optional here; [`MemberForm::validate`] decides which are
/// required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MemberForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub telegram_link: Option<String>,
    #[serde(default)]
    pub facebook_link: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl MemberForm {
    /// Assign a submitted text field by its form name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "name" => &mut self.name,
            "title" => &mut self.title,
            "description" => &mut self.description,
            "telegram_link" => &mut self.telegram_link,
            "facebook_link" => &mut self.facebook_link,
            "phone_number" => &mut self.phone_number,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Check every rule and produce the typed field set.
    pub fn validate(&self) -> Result<MemberFields, FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = required(&mut errors, "name", &self.name, Some(MAX_NAME_LEN));
        let title = required(&mut errors, "title", &self.title, Some(MAX_TITLE_LEN));
        let description = required(&mut errors, "description", &self.description, None);

        let telegram_link = optional_url(&mut errors, "telegram_link", &self.telegram_link);
        let facebook_link = optional_url(&mut errors, "facebook_link", &self.facebook_link);

        let phone_number = normalize(&self.phone_number);
        if let Some(phone) = &phone_number {
            if phone.chars().count() > MAX_PHONE_LEN {
                errors.add(
                    "phone_number",
                    format!("The phone number field must not be greater than {MAX_PHONE_LEN} characters."),
                );
            }
        }

        match (name, title, description) {
            (Some(name), Some(title), Some(description)) if errors.is_empty() => Ok(MemberFields {
                name,
                title,
                description,
                telegram_link,
                facebook_link,
                phone_number,
            }),
            _ => Err(errors),
        }
    }
}

/// A validated set of editable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberFields {
    pub name: String,
    pub title: String,
    pub description: String,
    pub telegram_link: Option<String>,
    pub facebook_link: Option<String>,
    pub phone_number: Option<String>,
}

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// The first message, used as the summary line of an error response.
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .flat_map(|messages| messages.first())
            .map(String::as_str)
            .next()
    }
}

fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn required(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    max_len: Option<usize>,
) -> Option<String> {
    let Some(value) = normalize(value) else {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    };

    if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(
                field,
                format!("The {} field must not be greater than {max} characters.", label(field)),
            );
            return None;
        }
    }

    Some(value)
}

fn optional_url(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<String> {
    let value = normalize(value)?;

    if value.chars().count() > MAX_LINK_LEN {
        errors.add(
            field,
            format!("The {} field must not be greater than {MAX_LINK_LEN} characters.", label(field)),
        );
    }
    if !is_well_formed_url(&value) {
        errors.add(field, format!("The {} field must be a valid URL.", label(field)));
    }

    Some(value)
}

/// A URL is well formed when it parses and names a host.
fn is_well_formed_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|parsed| parsed.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}
