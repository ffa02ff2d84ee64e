//! Family graph data model: persons, relationship rows, and the enriched
//! views returned to callers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KinshipError;

/// Person identifier (primary key of `persons`).
pub type PersonId = i64;

/// Label used when no direct active edge exists between two adjacent path nodes.
pub const FALLBACK_LABEL: &str = "Related";

/// A person record. Immutable for the duration of a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub gender_id: Option<i64>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub date_of_death: Option<NaiveDate>,
    #[serde(default)]
    pub religion_id: Option<i64>,
    #[serde(default)]
    pub religion_category_id: Option<i64>,
    #[serde(default)]
    pub religion_sub_category_id: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Person {
    /// Minimal constructor; optional fields start empty.
    pub fn new(id: PersonId, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            middle_name: None,
            last_name: last_name.to_string(),
            gender_id: None,
            date_of_birth: None,
            date_of_death: None,
            religion_id: None,
            religion_category_id: None,
            religion_sub_category_id: None,
            is_active: true,
        }
    }

    /// Liveness is the absence of a death date.
    pub fn is_living(&self) -> bool {
        self.date_of_death.is_none()
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.date_of_birth.map(|d| d.year())
    }

    /// "First Middle Last", skipping empty parts.
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// First name, last name and birth date are all present.
    pub fn has_identity(&self) -> bool {
        !self.first_name.trim().is_empty()
            && !self.last_name.trim().is_empty()
            && self.date_of_birth.is_some()
    }
}

/// Current address hierarchy ids of a person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub district_id: Option<i64>,
    pub city_id: Option<i64>,
}

/// Gender as resolved from a gender id. Deserializes case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum GenderCode {
    Male,
    Female,
    Unknown,
}

impl GenderCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderCode::Male => "MALE",
            GenderCode::Female => "FEMALE",
            GenderCode::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for GenderCode {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" | "M" => Ok(GenderCode::Male),
            "FEMALE" | "F" => Ok(GenderCode::Female),
            "UNKNOWN" | "U" => Ok(GenderCode::Unknown),
            other => Err(KinshipError::InvalidInput(format!("Unknown gender code: {}", other))),
        }
    }
}

impl TryFrom<String> for GenderCode {
    type Error = KinshipError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for GenderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed label of a directed relationship row, read from the row owner's
/// perspective: `A -> F: FATHER` means "F is A's father".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipType {
    Father,
    Mother,
    Son,
    Daughter,
    Husband,
    Wife,
    Spouse,
    Brother,
    Sister,
    Grandfather,
    Grandmother,
    Grandson,
    Granddaughter,
    Uncle,
    Aunt,
    Nephew,
    Niece,
    Cousin,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 18] = [
        RelationshipType::Father,
        RelationshipType::Mother,
        RelationshipType::Son,
        RelationshipType::Daughter,
        RelationshipType::Husband,
        RelationshipType::Wife,
        RelationshipType::Spouse,
        RelationshipType::Brother,
        RelationshipType::Sister,
        RelationshipType::Grandfather,
        RelationshipType::Grandmother,
        RelationshipType::Grandson,
        RelationshipType::Granddaughter,
        RelationshipType::Uncle,
        RelationshipType::Aunt,
        RelationshipType::Nephew,
        RelationshipType::Niece,
        RelationshipType::Cousin,
    ];

    /// Stable storage code.
    pub fn code(&self) -> &'static str {
        match self {
            RelationshipType::Father => "FATHER",
            RelationshipType::Mother => "MOTHER",
            RelationshipType::Son => "SON",
            RelationshipType::Daughter => "DAUGHTER",
            RelationshipType::Husband => "HUSBAND",
            RelationshipType::Wife => "WIFE",
            RelationshipType::Spouse => "SPOUSE",
            RelationshipType::Brother => "BROTHER",
            RelationshipType::Sister => "SISTER",
            RelationshipType::Grandfather => "GRANDFATHER",
            RelationshipType::Grandmother => "GRANDMOTHER",
            RelationshipType::Grandson => "GRANDSON",
            RelationshipType::Granddaughter => "GRANDDAUGHTER",
            RelationshipType::Uncle => "UNCLE",
            RelationshipType::Aunt => "AUNT",
            RelationshipType::Nephew => "NEPHEW",
            RelationshipType::Niece => "NIECE",
            RelationshipType::Cousin => "COUSIN",
        }
    }

    /// Display label used when the store has no label of its own.
    pub fn default_label(&self) -> &'static str {
        match self {
            RelationshipType::Father => "Father",
            RelationshipType::Mother => "Mother",
            RelationshipType::Son => "Son",
            RelationshipType::Daughter => "Daughter",
            RelationshipType::Husband => "Husband",
            RelationshipType::Wife => "Wife",
            RelationshipType::Spouse => "Spouse",
            RelationshipType::Brother => "Brother",
            RelationshipType::Sister => "Sister",
            RelationshipType::Grandfather => "Grandfather",
            RelationshipType::Grandmother => "Grandmother",
            RelationshipType::Grandson => "Grandson",
            RelationshipType::Granddaughter => "Granddaughter",
            RelationshipType::Uncle => "Uncle",
            RelationshipType::Aunt => "Aunt",
            RelationshipType::Nephew => "Nephew",
            RelationshipType::Niece => "Niece",
            RelationshipType::Cousin => "Cousin",
        }
    }

    /// Target is the row owner's parent.
    pub fn is_parent(&self) -> bool {
        matches!(self, RelationshipType::Father | RelationshipType::Mother)
    }

    /// Target is the row owner's child.
    pub fn is_child(&self) -> bool {
        matches!(self, RelationshipType::Son | RelationshipType::Daughter)
    }

    /// Target is the row owner's spouse.
    pub fn is_spouse(&self) -> bool {
        matches!(
            self,
            RelationshipType::Husband | RelationshipType::Wife | RelationshipType::Spouse
        )
    }

    /// Type of the paired row written from the other endpoint, given the
    /// gender of this row's owner.
    pub fn inverse(&self, owner_gender: GenderCode) -> RelationshipType {
        let female = owner_gender == GenderCode::Female;
        match self {
            RelationshipType::Father | RelationshipType::Mother => {
                if female { RelationshipType::Daughter } else { RelationshipType::Son }
            }
            RelationshipType::Son | RelationshipType::Daughter => {
                if female { RelationshipType::Mother } else { RelationshipType::Father }
            }
            RelationshipType::Husband => RelationshipType::Wife,
            RelationshipType::Wife => RelationshipType::Husband,
            RelationshipType::Spouse => RelationshipType::Spouse,
            RelationshipType::Brother | RelationshipType::Sister => {
                if female { RelationshipType::Sister } else { RelationshipType::Brother }
            }
            RelationshipType::Grandfather | RelationshipType::Grandmother => {
                if female { RelationshipType::Granddaughter } else { RelationshipType::Grandson }
            }
            RelationshipType::Grandson | RelationshipType::Granddaughter => {
                if female { RelationshipType::Grandmother } else { RelationshipType::Grandfather }
            }
            RelationshipType::Uncle | RelationshipType::Aunt => {
                if female { RelationshipType::Niece } else { RelationshipType::Nephew }
            }
            RelationshipType::Nephew | RelationshipType::Niece => {
                if female { RelationshipType::Aunt } else { RelationshipType::Uncle }
            }
            RelationshipType::Cousin => RelationshipType::Cousin,
        }
    }
}

impl FromStr for RelationshipType {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.code() == upper)
            .ok_or_else(|| KinshipError::InvalidInput(format!("Unknown relationship type: {}", s)))
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One directed relationship row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub person_id: PersonId,
    pub related_person_id: PersonId,
    pub relationship_type: RelationshipType,
    pub is_active: bool,
}

/// Enriched person fields shared by every query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonView {
    pub id: PersonId,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub full_name: String,
    pub gender: GenderCode,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub is_living: bool,
    pub address: String,
    pub religion: String,
}

impl PersonView {
    /// View for an id whose person row could not be read (dangling edge).
    pub fn unresolved(id: PersonId) -> Self {
        Self {
            id,
            first_name: String::new(),
            middle_name: None,
            last_name: String::new(),
            full_name: String::new(),
            gender: GenderCode::Unknown,
            date_of_birth: None,
            date_of_death: None,
            is_living: true,
            address: String::new(),
            religion: String::new(),
        }
    }
}

/// Reference from one result node to a neighbouring node, with the
/// relationship label read from the referencing node's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub id: PersonId,
    pub label: String,
}
