//! Crop-cycle journals and their dated entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::patch;

/// Lifecycle of a timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl TimelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineStatus::Active => "active",
            TimelineStatus::Completed => "completed",
            TimelineStatus::Archived => "archived",
        }
    }
}

impl FromStr for TimelineStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(TimelineStatus::Active),
            "completed" => Ok(TimelineStatus::Completed),
            "archived" => Ok(TimelineStatus::Archived),
            other => Err(ApiError::Validation(format!("Invalid status: {}", other))),
        }
    }
}

/// Field activity recorded by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    SoilPreparation,
    Sowing,
    Fertilization,
    Irrigation,
    PestControl,
    Harvesting,
    Pruning,
    Weeding,
    Monitoring,
    Other,
}

impl FromStr for Activity {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "soil-preparation" => Activity::SoilPreparation,
            "sowing" => Activity::Sowing,
            "fertilization" => Activity::Fertilization,
            "irrigation" => Activity::Irrigation,
            "pest-control" => Activity::PestControl,
            "harvesting" => Activity::Harvesting,
            "pruning" => Activity::Pruning,
            "weeding" => Activity::Weeding,
            "monitoring" => Activity::Monitoring,
            "other" => Activity::Other,
            other => {
                return Err(ApiError::Validation(format!("Invalid activity: {}", other)));
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaUnit {
    #[default]
    Acres,
    Hectares,
    SquareMeters,
}

/// Cultivated area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Area {
    #[serde(default, deserialize_with = "patch::lenient_number")]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: AreaUnit,
}

/// Expected or actual harvest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Yield {
    #[serde(default, deserialize_with = "patch::lenient_number")]
    pub value: Option<f64>,
    pub unit: Option<String>,
}

/// Field measurements taken with an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetrics {
    #[serde(
        default,
        deserialize_with = "patch::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    #[serde(
        default,
        deserialize_with = "patch::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity: Option<f64>,
    #[serde(
        default,
        deserialize_with = "patch::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rainfall: Option<f64>,
    #[serde(
        rename = "soilPH",
        default,
        deserialize_with = "patch::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub soil_ph: Option<f64>,
}

/// Journal entry embedded in a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub activity: Activity,
    pub weather: String,
    pub notes: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub metrics: EntryMetrics,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Timeline entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub title: String,
    pub crop_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: String,
    pub status: TimelineStatus,
    pub entries: Vec<TimelineEntry>,
    pub total_area: Option<Area>,
    pub expected_yield: Option<Yield>,
    pub actual_yield: Option<Yield>,
    pub tags: Vec<String>,
    #[serde(rename = "__v")]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Decode the JSON-encoded metrics form field.
pub fn decode_metrics(text: &str) -> ApiResult<EntryMetrics> {
    serde_json::from_str(text)
        .map_err(|e| ApiError::validation_with("Invalid metrics format", e.to_string()))
}

/// Decode the JSON-encoded tags form field (an array of strings).
pub fn decode_tags(text: &str) -> ApiResult<Vec<String>> {
    serde_json::from_str::<Vec<String>>(text)
        .map(patch::normalize_list)
        .map_err(|e| ApiError::validation_with("Invalid tags format", e.to_string()))
}

/// Text fields of an entry form, as received
#[derive(Debug, Clone, Default)]
pub struct EntryForm {
    pub date: Option<String>,
    pub activity: Option<String>,
    pub weather: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<String>,
    pub tags: Option<String>,
}

/// Validated input of a new entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub date: DateTime<Utc>,
    pub activity: Activity,
    pub weather: String,
    pub notes: String,
    pub metrics: EntryMetrics,
    pub tags: Vec<String>,
}

impl NewEntry {
    pub fn from_form(form: EntryForm) -> ApiResult<Self> {
        let date = patch::truthy(form.date)
            .ok_or_else(|| ApiError::Validation("date is required".to_string()))?;
        let activity = patch::truthy(form.activity)
            .ok_or_else(|| ApiError::Validation("activity is required".to_string()))?;

        Ok(Self {
            date: patch::parse_datetime(&date).map_err(ApiError::Validation)?,
            activity: activity.parse()?,
            weather: required_text(form.weather.as_deref().unwrap_or_default(), "weather")?,
            notes: required_text(form.notes.as_deref().unwrap_or_default(), "notes")?,
            metrics: match patch::truthy(form.metrics) {
                Some(text) => decode_metrics(&text)?,
                None => EntryMetrics::default(),
            },
            tags: match patch::truthy(form.tags) {
                Some(text) => decode_tags(&text)?,
                None => Vec::new(),
            },
        })
    }
}

/// Validated partial update of an entry. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub date: Option<DateTime<Utc>>,
    pub activity: Option<Activity>,
    pub weather: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<EntryMetrics>,
    pub tags: Option<Vec<String>>,
}

impl EntryPatch {
    pub fn from_form(form: EntryForm) -> ApiResult<Self> {
        Ok(Self {
            date: patch::truthy(form.date)
                .map(|d| patch::parse_datetime(&d).map_err(ApiError::Validation))
                .transpose()?,
            activity: patch::truthy(form.activity)
                .map(|a| a.parse())
                .transpose()?,
            weather: patch::truthy(form.weather),
            notes: patch::truthy(form.notes),
            metrics: patch::truthy(form.metrics)
                .map(|m| decode_metrics(&m))
                .transpose()?,
            tags: patch::truthy(form.tags)
                .map(|t| decode_tags(&t))
                .transpose()?,
        })
    }
}

/// Payload of `POST /api/timelines`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeline {
    #[serde(alias = "clerkId")]
    pub identity_key: String,
    pub title: String,
    pub crop_type: String,
    #[serde(deserialize_with = "patch::datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "patch::nullable_datetime")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub description: String,
    #[serde(default)]
    pub total_area: Option<Area>,
    #[serde(default)]
    pub expected_yield: Option<Yield>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Whitelisted top-level fields of `PUT /api/timelines/:id`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimelinePatch {
    #[serde(alias = "clerkId")]
    pub identity_key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub crop_type: Option<String>,
    #[serde(default, deserialize_with = "patch::nullable_datetime")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "patch::nullable_datetime")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TimelineStatus>,
    #[serde(default, deserialize_with = "patch::nullable")]
    pub total_area: Option<Option<Area>>,
    #[serde(default, deserialize_with = "patch::nullable")]
    pub expected_yield: Option<Option<Yield>>,
    #[serde(default, deserialize_with = "patch::nullable")]
    pub actual_yield: Option<Option<Yield>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TimelinePatch {
    /// Shallow merge of the provided fields. Validation happens before any
    /// field is written.
    pub fn apply(&self, timeline: &mut Timeline) -> ApiResult<()> {
        let title = self
            .title
            .as_deref()
            .map(|t| required_text(t, "title"))
            .transpose()?;
        let crop_type = self
            .crop_type
            .as_deref()
            .map(|c| required_text(c, "cropType"))
            .transpose()?;
        let description = self
            .description
            .as_deref()
            .map(|d| required_text(d, "description"))
            .transpose()?;
        let start_date = match self.start_date {
            Some(Some(date)) => Some(date),
            Some(None) => {
                return Err(ApiError::Validation("startDate is required".to_string()));
            }
            None => None,
        };

        if let Some(title) = title {
            timeline.title = title;
        }
        if let Some(crop_type) = crop_type {
            timeline.crop_type = crop_type;
        }
        if let Some(description) = description {
            timeline.description = description;
        }
        if let Some(start_date) = start_date {
            timeline.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            timeline.end_date = end_date;
        }
        if let Some(status) = self.status {
            timeline.status = status;
        }
        if let Some(total_area) = &self.total_area {
            timeline.total_area = total_area.clone();
        }
        if let Some(expected_yield) = &self.expected_yield {
            timeline.expected_yield = expected_yield.clone();
        }
        if let Some(actual_yield) = &self.actual_yield {
            timeline.actual_yield = actual_yield.clone();
        }
        if let Some(tags) = &self.tags {
            timeline.tags = patch::normalize_list(tags);
        }
        Ok(())
    }
}

/// Query string of `GET /api/timelines`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineListQuery {
    #[serde(default, alias = "identityKey")]
    pub clerk_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Timeline {
    pub fn new(owner: Uuid, input: NewTimeline) -> ApiResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user: owner,
            title: required_text(&input.title, "title")?,
            crop_type: required_text(&input.crop_type, "cropType")?,
            start_date: input.start_date,
            end_date: input.end_date.flatten(),
            description: required_text(&input.description, "description")?,
            status: TimelineStatus::Active,
            entries: Vec::new(),
            total_area: input.total_area,
            expected_yield: input.expected_yield,
            actual_yield: None,
            tags: patch::normalize_list(input.tags),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn entry(&self, entry_id: Uuid) -> ApiResult<&TimelineEntry> {
        self.entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(entry_not_found)
    }

    pub fn add_entry(&mut self, input: NewEntry, images: Vec<String>) -> &TimelineEntry {
        let now = Utc::now();
        self.entries.push(TimelineEntry {
            id: Uuid::new_v4(),
            date: input.date,
            activity: input.activity,
            weather: input.weather,
            notes: input.notes,
            images,
            metrics: input.metrics,
            tags: input.tags,
            created_at: now,
            updated_at: now,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Merge scalar fields, replace metrics/tags only when supplied and append
    /// `new_images` to the images already on the entry.
    pub fn update_entry(
        &mut self,
        entry_id: Uuid,
        patch: EntryPatch,
        new_images: Vec<String>,
    ) -> ApiResult<&TimelineEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(entry_not_found)?;

        if let Some(date) = patch.date {
            entry.date = date;
        }
        if let Some(activity) = patch.activity {
            entry.activity = activity;
        }
        if let Some(weather) = patch.weather {
            entry.weather = weather;
        }
        if let Some(notes) = patch.notes {
            entry.notes = notes;
        }
        if let Some(metrics) = patch.metrics {
            entry.metrics = metrics;
        }
        if let Some(tags) = patch.tags {
            entry.tags = tags;
        }
        entry.images.extend(new_images);
        entry.updated_at = Utc::now();
        Ok(entry)
    }

    pub fn remove_entry(&mut self, entry_id: Uuid) -> ApiResult<TimelineEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(entry_not_found)?;
        Ok(self.entries.remove(index))
    }

    /// Every image referenced by any entry, in entry order.
    pub fn all_images(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| e.images.iter().cloned())
            .collect()
    }
}

fn entry_not_found() -> ApiError {
    ApiError::NotFound("Timeline entry not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Timeline {
        let input: NewTimeline = serde_json::from_value(serde_json::json!({
            "identityKey": "u1",
            "title": " Kharif soybean ",
            "cropType": "soybean",
            "startDate": "2024-06-15",
            "description": "Monsoon sowing on the east plot",
            "totalArea": { "value": 4.5 }
        }))
        .unwrap();
        Timeline::new(Uuid::new_v4(), input).unwrap()
    }

    fn sowing_form() -> EntryForm {
        EntryForm {
            date: Some("2024-06-20".into()),
            activity: Some("sowing".into()),
            weather: Some("light rain".into()),
            notes: Some("  JS-335 seed, 30 kg/acre ".into()),
            metrics: Some(r#"{"temperature": 27.5, "soilPH": 6.8}"#.into()),
            tags: Some(r#"["seed", " monsoon "]"#.into()),
        }
    }

    fn urls(n: usize, prefix: &str) -> Vec<String> {
        (0..n).map(|i| format!("/uploads/{}-{}.png", prefix, i)).collect()
    }

    #[test]
    fn test_new_timeline_defaults() {
        let timeline = timeline();
        assert_eq!(timeline.title, "Kharif soybean");
        assert_eq!(timeline.status, TimelineStatus::Active);
        assert!(timeline.entries.is_empty());
        assert_eq!(timeline.total_area.as_ref().unwrap().unit, AreaUnit::Acres);
    }

    #[test]
    fn test_entry_form_is_decoded() {
        let entry = NewEntry::from_form(sowing_form()).unwrap();
        assert_eq!(entry.activity, Activity::Sowing);
        assert_eq!(entry.notes, "JS-335 seed, 30 kg/acre");
        assert_eq!(entry.metrics.temperature, Some(27.5));
        assert_eq!(entry.metrics.soil_ph, Some(6.8));
        assert_eq!(entry.tags, vec!["seed", "monsoon"]);
    }

    #[test]
    fn test_malformed_metrics_or_tags_are_rejected() {
        let mut form = sowing_form();
        form.metrics = Some("{temperature: hot".into());
        let err = NewEntry::from_form(form).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let mut form = sowing_form();
        form.tags = Some("seed, monsoon".into());
        assert!(NewEntry::from_form(form).is_err());
    }

    #[test]
    fn test_form_metrics_and_area_accept_numeric_strings() {
        let metrics = decode_metrics(r#"{"temperature": "27.5", "humidity": "", "soilPH": 6.8}"#)
            .unwrap();
        assert_eq!(metrics.temperature, Some(27.5));
        assert_eq!(metrics.humidity, None);
        assert_eq!(metrics.soil_ph, Some(6.8));

        let err = decode_metrics(r#"{"rainfall": "heavy"}"#).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let input: NewTimeline = serde_json::from_value(serde_json::json!({
            "identityKey": "u1",
            "title": "Rabi wheat",
            "cropType": "wheat",
            "startDate": "2024-11-01",
            "description": "North plot",
            "totalArea": { "value": "4.5", "unit": "hectares" },
            "expectedYield": { "value": "", "unit": "quintal" }
        }))
        .unwrap();
        let timeline = Timeline::new(Uuid::new_v4(), input).unwrap();
        let area = timeline.total_area.unwrap();
        assert_eq!(area.value, Some(4.5));
        assert_eq!(area.unit, AreaUnit::Hectares);
        assert_eq!(timeline.expected_yield.unwrap().value, None);
    }

    #[test]
    fn test_entry_requires_core_fields() {
        let mut form = sowing_form();
        form.weather = None;
        assert!(NewEntry::from_form(form).is_err());

        let mut form = sowing_form();
        form.activity = Some("dancing".into());
        assert!(NewEntry::from_form(form).is_err());
    }

    #[test]
    fn test_update_entry_appends_images() {
        let mut timeline = timeline();
        let entry = NewEntry::from_form(sowing_form()).unwrap();
        let id = timeline.add_entry(entry, urls(3, "old")).id;

        let updated = timeline
            .update_entry(id, EntryPatch::default(), urls(2, "new"))
            .unwrap();
        assert_eq!(updated.images.len(), 5);
        assert_eq!(updated.images[0], "/uploads/old-0.png");
        assert_eq!(updated.images[4], "/uploads/new-1.png");
        assert_eq!(updated.activity, Activity::Sowing);
        assert_eq!(updated.tags, vec!["seed", "monsoon"]);
    }

    #[test]
    fn test_update_entry_replaces_supplied_metrics_only() {
        let mut timeline = timeline();
        let id = timeline
            .add_entry(NewEntry::from_form(sowing_form()).unwrap(), vec![])
            .id;

        let patch = EntryPatch::from_form(EntryForm {
            metrics: Some(r#"{"humidity": 80}"#.into()),
            notes: Some("germination visible".into()),
            ..EntryForm::default()
        })
        .unwrap();
        let updated = timeline.update_entry(id, patch, vec![]).unwrap();

        assert_eq!(updated.metrics.humidity, Some(80.0));
        assert_eq!(updated.metrics.temperature, None);
        assert_eq!(updated.notes, "germination visible");
        assert_eq!(updated.tags, vec!["seed", "monsoon"]);
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let mut timeline = timeline();
        let err = timeline
            .update_entry(Uuid::new_v4(), EntryPatch::default(), vec![])
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(timeline.remove_entry(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_all_images_across_entries() {
        let mut timeline = timeline();
        for i in 0..3 {
            let entry = NewEntry::from_form(sowing_form()).unwrap();
            timeline.add_entry(entry, urls(2, &i.to_string()));
        }
        assert_eq!(timeline.all_images().len(), 6);

        let first = timeline.entries[0].id;
        let removed = timeline.remove_entry(first).unwrap();
        assert_eq!(removed.images.len(), 2);
        assert_eq!(timeline.all_images().len(), 4);
    }

    #[test]
    fn test_patch_merges_and_clears() {
        let mut timeline = timeline();
        let patch: TimelinePatch = serde_json::from_value(serde_json::json!({
            "identityKey": "u1",
            "status": "completed",
            "endDate": "2024-10-01",
            "totalArea": null,
            "actualYield": { "value": 38.0, "unit": "quintal" }
        }))
        .unwrap();
        patch.apply(&mut timeline).unwrap();

        assert_eq!(timeline.status, TimelineStatus::Completed);
        assert!(timeline.end_date.is_some());
        assert_eq!(timeline.total_area, None);
        assert_eq!(timeline.actual_yield.as_ref().unwrap().value, Some(38.0));
        assert_eq!(timeline.title, "Kharif soybean");
    }

    #[test]
    fn test_patch_rejects_blank_title_and_unknown_fields() {
        let mut timeline = timeline();
        let patch: TimelinePatch =
            serde_json::from_value(serde_json::json!({"identityKey": "u1", "title": "  "}))
                .unwrap();
        assert!(patch.apply(&mut timeline).is_err());
        assert_eq!(timeline.title, "Kharif soybean");

        let unknown = serde_json::from_value::<TimelinePatch>(
            serde_json::json!({"identityKey": "u1", "user": "someone-else"}),
        );
        assert!(unknown.is_err());
    }
}
