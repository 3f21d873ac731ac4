use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerfumeId(pub i64);

/// Marketing gender tag as stored on the catalog row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unisex => "Unisex",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            _ => Self::Unisex,
        }
    }
}

/// Query-side gender restriction. A `Male` filter includes unisex perfumes,
/// a `Female` filter likewise; `Unisex` is strict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenderFilter {
    Male,
    Female,
    Unisex,
}

impl GenderFilter {
    /// Accepts English labels and the Korean labels used by the catalog UI.
    /// Unknown labels fall back to `Unisex`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "남성" => Self::Male,
            "여성" => Self::Female,
            "남녀공용" => Self::Unisex,
            other => match other.to_ascii_lowercase().as_str() {
                "male" => Self::Male,
                "female" => Self::Female,
                _ => Self::Unisex,
            },
        }
    }

    /// The stored gender tags admitted by this filter.
    pub fn admitted(&self) -> &'static [&'static str] {
        match self {
            Self::Male => &["Male", "Unisex"],
            Self::Female => &["Female", "Unisex"],
            Self::Unisex => &["Unisex"],
        }
    }

    pub fn admits(&self, gender: Gender) -> bool {
        self.admitted().contains(&gender.as_str())
    }
}

/// Catalog entity. The four attribute fields and the three score fields are
/// kept as raw JSON values; two different import paths populated them with
/// different encodings, so normalization happens in `attributes` at read
/// time and nowhere else.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Perfume {
    pub id: PerfumeId,
    pub brand: String,
    pub name: String,
    pub description: String,
    pub concentration: String,
    pub gender: Gender,
    pub sizes: Vec<i64>,
    pub detail_url: Option<String>,
    pub main_accords: Value,
    pub top_notes: Value,
    pub middle_notes: Value,
    pub base_notes: Value,
    pub notes_score: Value,
    pub season_score: Value,
    pub day_night_score: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
