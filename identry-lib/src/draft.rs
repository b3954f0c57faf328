//! Typed view over a stored draft snapshot

use crate::draft_store::DraftSnapshot;
use crate::error::SyncError;
use crate::models::{ChildCollections, ProfileFields};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Profile edit captured before the user authenticated
///
/// Every field may be missing. Text fields accept numbers too, since the
/// form stores birth date parts either way.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileDraft {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub bio: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "address")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "birthYear")]
    pub birth_year: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "birthMonth")]
    pub birth_month: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "birthDay")]
    pub birth_day: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "birthDate")]
    pub birth_date: Option<String>,
    pub skills: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_text")]
    pub photo: Option<String>,
    #[serde(deserialize_with = "lenient_text", alias = "bannerImage")]
    pub banner_image: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub twitter: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub instagram: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub linkedin: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub github: Option<String>,
    pub show_education: Option<bool>,
    #[serde(alias = "show_career")]
    pub show_employment: Option<bool>,
    pub show_portfolio: Option<bool>,
    pub show_skills: Option<bool>,
    #[serde(alias = "show_sns")]
    pub show_social: Option<bool>,
    pub is_public: Option<bool>,
    #[serde(deserialize_with = "lenient_text", alias = "customId")]
    pub custom_id: Option<String>,
    #[serde(flatten)]
    pub children: ChildCollections,
}

impl ProfileDraft {
    /// Read a stored snapshot. Unknown keys are ignored.
    pub fn from_snapshot(snapshot: &DraftSnapshot) -> Result<Self, SyncError> {
        serde_json::from_value(Value::Object(snapshot.clone()))
            .map_err(|e| SyncError::MalformedDraft(e.to_string()))
    }

    /// Overlay the draft onto `fields`, taking each draft value only when it
    /// is non-empty. The draft never blanks out an existing value.
    pub fn fill(&self, fields: &mut ProfileFields) {
        fill_text(&mut fields.name, &self.name);
        fill_opt(&mut fields.nickname, &self.nickname);
        fill_opt(&mut fields.bio, &self.bio);
        fill_opt(&mut fields.location, &self.location);
        fill_opt(&mut fields.gender, &self.gender);
        fill_opt(&mut fields.birth_year, &self.birth_year);
        fill_opt(&mut fields.birth_month, &self.birth_month);
        fill_opt(&mut fields.birth_day, &self.birth_day);
        fill_opt(&mut fields.birth_date, &self.birth_date);
        fill_opt(&mut fields.photo, &self.photo);
        fill_opt(&mut fields.banner_image, &self.banner_image);
        fill_opt(&mut fields.twitter, &self.twitter);
        fill_opt(&mut fields.instagram, &self.instagram);
        fill_opt(&mut fields.linkedin, &self.linkedin);
        fill_opt(&mut fields.github, &self.github);
        fill_opt(&mut fields.custom_id, &self.custom_id);

        if let Some(skills) = &self.skills {
            let skills: Vec<String> = skills
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !skills.is_empty() {
                fields.skills = skills;
            }
        }

        let flags = [
            (&mut fields.show_education, self.show_education),
            (&mut fields.show_employment, self.show_employment),
            (&mut fields.show_portfolio, self.show_portfolio),
            (&mut fields.show_skills, self.show_skills),
            (&mut fields.show_social, self.show_social),
            (&mut fields.is_public, self.is_public),
        ];
        for (target, value) in flags {
            if let Some(value) = value {
                *target = value;
            }
        }
    }
}

/// Non-empty text after trimming
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The draft value as typed, when it has any non-whitespace content
fn present(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.trim().is_empty())
}

fn fill_text(target: &mut String, value: &Option<String>) {
    if let Some(v) = present(value) {
        target.clone_from(v);
    }
}

fn fill_opt(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = present(value) {
        *target = Some(v.clone());
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {}",
            other
        ))),
    }
}
