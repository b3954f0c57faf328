use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an authenticated account, supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty identifier is treated the same as no identifier
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable, one-per-account profile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: AccountId,
    pub name: String,
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<String>,
    pub birth_month: Option<String>,
    pub birth_day: Option<String>,
    pub birth_date: Option<String>,
    pub skills: Vec<String>,
    /// Image uploaded by the user
    pub photo: Option<String>,
    /// Image supplied by a third-party identity provider
    pub provider_avatar_url: Option<String>,
    /// Display image chosen by the avatar priority chain
    pub avatar_url: Option<String>,
    pub banner_image: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub show_education: bool,
    pub show_employment: bool,
    pub show_portfolio: bool,
    pub show_skills: bool,
    pub show_social: bool,
    pub is_public: bool,
    pub views_count: i64,
    pub custom_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scalar profile fields written by an upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub name: String,
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<String>,
    pub birth_month: Option<String>,
    pub birth_day: Option<String>,
    pub birth_date: Option<String>,
    pub skills: Vec<String>,
    pub photo: Option<String>,
    pub banner_image: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub show_education: bool,
    pub show_employment: bool,
    pub show_portfolio: bool,
    pub show_skills: bool,
    pub show_social: bool,
    pub is_public: bool,
    pub custom_id: Option<String>,
}

impl Default for ProfileFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            nickname: None,
            bio: None,
            location: None,
            gender: None,
            birth_year: None,
            birth_month: None,
            birth_day: None,
            birth_date: None,
            skills: Vec::new(),
            photo: None,
            banner_image: None,
            twitter: None,
            instagram: None,
            linkedin: None,
            github: None,
            show_education: true,
            show_employment: true,
            show_portfolio: true,
            show_skills: true,
            show_social: true,
            is_public: false,
            custom_id: None,
        }
    }
}

impl From<&Profile> for ProfileFields {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            nickname: profile.nickname.clone(),
            bio: profile.bio.clone(),
            location: profile.location.clone(),
            gender: profile.gender.clone(),
            birth_year: profile.birth_year.clone(),
            birth_month: profile.birth_month.clone(),
            birth_day: profile.birth_day.clone(),
            birth_date: profile.birth_date.clone(),
            skills: profile.skills.clone(),
            photo: profile.photo.clone(),
            banner_image: profile.banner_image.clone(),
            twitter: profile.twitter.clone(),
            instagram: profile.instagram.clone(),
            linkedin: profile.linkedin.clone(),
            github: profile.github.clone(),
            show_education: profile.show_education,
            show_employment: profile.show_employment,
            show_portfolio: profile.show_portfolio,
            show_skills: profile.show_skills,
            show_social: profile.show_social,
            is_public: profile.is_public,
            custom_id: profile.custom_id.clone(),
        }
    }
}

/// Row written by the scalar upsert, keyed by account
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpsert {
    pub account_id: AccountId,
    pub fields: ProfileFields,
    /// `None` keeps the provider image already stored
    pub provider_avatar_url: Option<String>,
    /// `None` falls back to the stored provider image
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationItem {
    pub school: String,
    pub degree: String,
    pub year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EmploymentItem {
    pub company: String,
    pub position: String,
    pub period: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: String,
}

/// The three dependent collections owned by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Education,
    Employment,
    Portfolio,
}

impl ChildKind {
    pub const ALL: [ChildKind; 3] = [
        ChildKind::Education,
        ChildKind::Employment,
        ChildKind::Portfolio,
    ];

    /// Table holding rows of this kind
    pub fn table_name(self) -> &'static str {
        match self {
            ChildKind::Education => "education",
            ChildKind::Employment => "employment",
            ChildKind::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Items of a single collection, tagged with their kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildItems {
    Education(Vec<EducationItem>),
    Employment(Vec<EmploymentItem>),
    Portfolio(Vec<PortfolioItem>),
}

impl ChildItems {
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildItems::Education(_) => ChildKind::Education,
            ChildItems::Employment(_) => ChildKind::Employment,
            ChildItems::Portfolio(_) => ChildKind::Portfolio,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChildItems::Education(items) => items.len(),
            ChildItems::Employment(items) => items.len(),
            ChildItems::Portfolio(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full contents of all three child collections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildCollections {
    pub education: Vec<EducationItem>,
    #[serde(alias = "career")]
    pub employment: Vec<EmploymentItem>,
    pub portfolio: Vec<PortfolioItem>,
}

impl ChildCollections {
    /// Split into one tagged list per kind, in `ChildKind::ALL` order
    pub fn into_items(self) -> [ChildItems; 3] {
        [
            ChildItems::Education(self.education),
            ChildItems::Employment(self.employment),
            ChildItems::Portfolio(self.portfolio),
        ]
    }
}

/// Optional blocks of a published page that can be hidden individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Education,
    Employment,
    Portfolio,
    Skills,
    Social,
}

impl Block {
    /// Column storing the visibility flag of this block
    pub fn column_name(self) -> &'static str {
        match self {
            Block::Education => "show_education",
            Block::Employment => "show_employment",
            Block::Portfolio => "show_portfolio",
            Block::Skills => "show_skills",
            Block::Social => "show_social",
        }
    }
}

impl std::str::FromStr for Block {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "education" => Ok(Block::Education),
            "employment" | "career" => Ok(Block::Employment),
            "portfolio" => Ok(Block::Portfolio),
            "skills" => Ok(Block::Skills),
            "social" | "sns" => Ok(Block::Social),
            _ => Err(format!("Invalid Block variant: {}", s)),
        }
    }
}

/// A published profile as shown to anonymous visitors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicProfile {
    pub profile: Profile,
    pub education: Vec<EducationItem>,
    pub employment: Vec<EmploymentItem>,
    pub portfolio: Vec<PortfolioItem>,
}

impl PublicProfile {
    /// Assemble the visitor view, emptying blocks the owner has hidden
    pub fn new(mut profile: Profile, children: ChildCollections) -> Self {
        let ChildCollections {
            education,
            employment,
            portfolio,
        } = children;

        if !profile.show_skills {
            profile.skills.clear();
        }
        if !profile.show_social {
            profile.twitter = None;
            profile.instagram = None;
            profile.linkedin = None;
            profile.github = None;
        }

        Self {
            education: if profile.show_education { education } else { Vec::new() },
            employment: if profile.show_employment { employment } else { Vec::new() },
            portfolio: if profile.show_portfolio { portfolio } else { Vec::new() },
            profile,
        }
    }
}
