use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::{ClassId, DomainError, DomainResult, Entity};

/// Class lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassStatus {
    Active,
    Inactive,
    Archived,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Active => "ACTIVE",
            ClassStatus::Inactive => "INACTIVE",
            ClassStatus::Archived => "ARCHIVED",
        }
    }
}

impl FromStr for ClassStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ClassStatus::Active),
            "INACTIVE" => Ok(ClassStatus::Inactive),
            "ARCHIVED" => Ok(ClassStatus::Archived),
            other => Err(DomainError::validation(format!("unknown class status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassCategory {
    Fitness,
    Yoga,
    Dance,
    MartialArts,
    Sports,
    Wellness,
    Other,
}

impl ClassCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassCategory::Fitness => "FITNESS",
            ClassCategory::Yoga => "YOGA",
            ClassCategory::Dance => "DANCE",
            ClassCategory::MartialArts => "MARTIAL_ARTS",
            ClassCategory::Sports => "SPORTS",
            ClassCategory::Wellness => "WELLNESS",
            ClassCategory::Other => "OTHER",
        }
    }
}

impl FromStr for ClassCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FITNESS" => Ok(ClassCategory::Fitness),
            "YOGA" => Ok(ClassCategory::Yoga),
            "DANCE" => Ok(ClassCategory::Dance),
            "MARTIAL_ARTS" => Ok(ClassCategory::MartialArts),
            "SPORTS" => Ok(ClassCategory::Sports),
            "WELLNESS" => Ok(ClassCategory::Wellness),
            "OTHER" => Ok(ClassCategory::Other),
            other => Err(DomainError::validation(format!("unknown class category '{other}'"))),
        }
    }
}

/// A bookable offering. Owns zero or more sessions (by `ClassId` reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub description: Option<String>,
    pub category: ClassCategory,
    pub duration_minutes: u32,
    /// Always `>= 1`; inherited by every session of this class.
    pub max_capacity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub price_cents: u64,
    pub instructor_name: String,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Class {
    type Id = ClassId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClass {
    pub name: String,
    pub description: Option<String>,
    pub category: ClassCategory,
    pub duration_minutes: u32,
    pub max_capacity: u32,
    pub price_cents: u64,
    pub instructor_name: String,
}

/// Partial update: only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ClassCategory>,
    pub duration_minutes: Option<u32>,
    pub max_capacity: Option<u32>,
    pub price_cents: Option<u64>,
    pub instructor_name: Option<String>,
    pub status: Option<ClassStatus>,
}

const NAME_LEN: core::ops::RangeInclusive<usize> = 2..=100;
const DURATION_MINUTES: core::ops::RangeInclusive<u32> = 15..=480;
const CAPACITY: core::ops::RangeInclusive<u32> = 1..=100;
const DESCRIPTION_MAX: usize = 1000;

fn validate_name(field: &str, value: &str) -> DomainResult<()> {
    let len = value.trim().chars().count();
    if !NAME_LEN.contains(&len) {
        return Err(DomainError::validation(format!(
            "{field} must be between {} and {} characters",
            NAME_LEN.start(),
            NAME_LEN.end()
        )));
    }
    Ok(())
}

fn validate_duration(minutes: u32) -> DomainResult<()> {
    if !DURATION_MINUTES.contains(&minutes) {
        return Err(DomainError::validation(format!(
            "duration_minutes must be between {} and {}",
            DURATION_MINUTES.start(),
            DURATION_MINUTES.end()
        )));
    }
    Ok(())
}

fn validate_capacity(capacity: u32) -> DomainResult<()> {
    if !CAPACITY.contains(&capacity) {
        return Err(DomainError::validation(format!(
            "max_capacity must be between {} and {}",
            CAPACITY.start(),
            CAPACITY.end()
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> DomainResult<()> {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX) {
        return Err(DomainError::validation(format!(
            "description must be at most {DESCRIPTION_MAX} characters"
        )));
    }
    Ok(())
}

impl Class {
    /// Validate input and build an `ACTIVE` class.
    pub fn create(id: ClassId, input: NewClass, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_name("name", &input.name)?;
        validate_name("instructor_name", &input.instructor_name)?;
        validate_duration(input.duration_minutes)?;
        validate_capacity(input.max_capacity)?;
        validate_description(input.description.as_deref())?;

        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            duration_minutes: input.duration_minutes,
            max_capacity: input.max_capacity,
            price_cents: input.price_cents,
            instructor_name: input.instructor_name.trim().to_string(),
            status: ClassStatus::Active,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ClassStatus::Active
    }

    /// Apply a partial update. Validation runs before any field is touched.
    pub fn apply_patch(&mut self, patch: ClassPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        if let Some(instructor) = &patch.instructor_name {
            validate_name("instructor_name", instructor)?;
        }
        if let Some(minutes) = patch.duration_minutes {
            validate_duration(minutes)?;
        }
        if let Some(capacity) = patch.max_capacity {
            validate_capacity(capacity)?;
        }
        validate_description(patch.description.as_deref())?;

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(minutes) = patch.duration_minutes {
            self.duration_minutes = minutes;
        }
        if let Some(capacity) = patch.max_capacity {
            self.max_capacity = capacity;
        }
        if let Some(price) = patch.price_cents {
            self.price_cents = price;
        }
        if let Some(instructor) = patch.instructor_name {
            self.instructor_name = instructor.trim().to_string();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Some(now);
        Ok(())
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.status = ClassStatus::Archived;
        self.updated_at = Some(now);
    }
}
