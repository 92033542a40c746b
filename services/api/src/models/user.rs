//! Farmer profiles keyed by the identity provider's user id

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::patch;

pub const DEFAULT_LOCATION: &str = "Not specified";
pub const DEFAULT_FARM_SIZE: &str = "0";
pub const DEFAULT_CROP: &str = "None";

/// Farming practice declared on a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FarmingType {
    Organic,
    Mixed,
    #[default]
    Conventional,
    Sustainable,
}

impl FarmingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FarmingType::Organic => "organic",
            FarmingType::Mixed => "mixed",
            FarmingType::Conventional => "conventional",
            FarmingType::Sustainable => "sustainable",
        }
    }
}

impl FromStr for FarmingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organic" => Ok(FarmingType::Organic),
            "mixed" => Ok(FarmingType::Mixed),
            "conventional" => Ok(FarmingType::Conventional),
            "sustainable" => Ok(FarmingType::Sustainable),
            other => Err(format!("Invalid farming type: {}", other)),
        }
    }
}

impl fmt::Display for FarmingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn truthy_farming_type<'de, D>(deserializer: D) -> Result<Option<FarmingType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match patch::truthy_string(deserializer)? {
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub clerk_id: String,
    pub email: String,
    pub location: String,
    pub farm_size: String,
    pub main_crops: Vec<String>,
    pub farming_type: FarmingType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercased, trimmed email
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// New profile with the documented placeholders for everything the
    /// patch leaves out.
    pub fn new(clerk_id: &str, email: &str, fields: ProfilePatch) -> ApiResult<Self> {
        let clerk_id = clerk_id.trim();
        let email = normalize_email(email);
        if clerk_id.is_empty() || email.is_empty() {
            return Err(ApiError::Validation(
                "clerkId and email are required".to_string(),
            ));
        }

        let now = Utc::now();
        let mut user = Self {
            id: Uuid::new_v4(),
            clerk_id: clerk_id.to_string(),
            email,
            location: DEFAULT_LOCATION.to_string(),
            farm_size: DEFAULT_FARM_SIZE.to_string(),
            main_crops: vec![DEFAULT_CROP.to_string()],
            farming_type: FarmingType::default(),
            created_at: now,
            updated_at: now,
        };
        fields.apply(&mut user);
        Ok(user)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            clerk_id: self.clerk_id.clone(),
            email: self.email.clone(),
            location: self.location.clone(),
        }
    }
}

/// Author fields embedded in post responses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub clerk_id: String,
    pub email: String,
    pub location: String,
}

/// Mutable profile fields. Only the fields present and truthy are written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    #[serde(default, deserialize_with = "patch::truthy_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "patch::truthy_text_or_number")]
    pub farm_size: Option<String>,
    #[serde(default, deserialize_with = "patch::truthy_list")]
    pub main_crops: Option<Vec<String>>,
    #[serde(default, deserialize_with = "truthy_farming_type")]
    pub farming_type: Option<FarmingType>,
}

impl ProfilePatch {
    /// Merge into `user`, returning whether anything changed.
    pub fn apply(self, user: &mut User) -> bool {
        let mut changed = false;

        if let Some(location) = patch::truthy(self.location) {
            changed |= user.location != location;
            user.location = location;
        }
        if let Some(farm_size) = patch::truthy(self.farm_size) {
            changed |= user.farm_size != farm_size;
            user.farm_size = farm_size;
        }
        if let Some(crops) = self.main_crops.map(patch::normalize_list) {
            if !crops.is_empty() {
                changed |= user.main_crops != crops;
                user.main_crops = crops;
            }
        }
        if let Some(farming_type) = self.farming_type {
            changed |= user.farming_type != farming_type;
            user.farming_type = farming_type;
        }

        if changed {
            user.updated_at = Utc::now();
        }
        changed
    }
}

/// Profile sync payload sent on first authenticated contact
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSync {
    #[serde(default, alias = "clerkId")]
    pub identity_key: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "patch::truthy_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "patch::truthy_text_or_number")]
    pub farm_size: Option<String>,
    #[serde(default, deserialize_with = "patch::truthy_list")]
    pub main_crops: Option<Vec<String>>,
    #[serde(default, deserialize_with = "truthy_farming_type")]
    pub farming_type: Option<FarmingType>,
}

impl ProfileSync {
    pub fn fields(&self) -> ProfilePatch {
        ProfilePatch {
            location: self.location.clone(),
            farm_size: self.farm_size.clone(),
            main_crops: self.main_crops.clone(),
            farming_type: self.farming_type,
        }
    }
}
