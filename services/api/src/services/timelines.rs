//! Timeline store: crop-cycle journals and their entries
//!
//! Every mutation filters on owner and id together, so a timeline owned by
//! someone else answers 404 exactly like a missing one.

use media::{ObjectStorage, Upload, UploadPolicy};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::patch;
use crate::models::{
    EntryForm, EntryPatch, NewEntry, NewTimeline, Timeline, TimelineListQuery, TimelinePatch,
    TimelineStatus,
};
use crate::repositories::TimelineRepository;
use crate::services::{MAX_WRITE_ATTEMPTS, UserDirectory, release_best_effort, store_uploads};

#[derive(Clone)]
pub struct TimelineStore {
    timelines: Arc<dyn TimelineRepository>,
    directory: UserDirectory,
    storage: Arc<dyn ObjectStorage>,
    policy: UploadPolicy,
}

fn timeline_not_found() -> ApiError {
    ApiError::NotFound("Timeline not found".to_string())
}

impl TimelineStore {
    pub fn new(
        timelines: Arc<dyn TimelineRepository>,
        directory: UserDirectory,
        storage: Arc<dyn ObjectStorage>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            timelines,
            directory,
            storage,
            policy,
        }
    }

    pub async fn create(&self, input: NewTimeline) -> ApiResult<Timeline> {
        let owner = self.directory.resolve(&input.identity_key).await?;
        let timeline = Timeline::new(owner.id, input)?;
        self.timelines.insert(&timeline).await?;

        info!("Timeline {} created by {}", timeline.id, owner.clerk_id);
        Ok(timeline)
    }

    pub async fn list(&self, query: TimelineListQuery) -> ApiResult<Vec<Timeline>> {
        let identity_key = patch::truthy(query.clerk_id)
            .ok_or_else(|| ApiError::Validation("clerkId is required".to_string()))?;
        let status = patch::truthy(query.status)
            .map(|s| s.parse::<TimelineStatus>())
            .transpose()?;

        let owner = self.directory.resolve(&identity_key).await?;
        Ok(self.timelines.list_by_owner(owner.id, status).await?)
    }

    pub async fn get(&self, timeline_id: Uuid) -> ApiResult<Timeline> {
        self.timelines
            .find_by_id(timeline_id)
            .await?
            .ok_or_else(timeline_not_found)
    }

    pub async fn update(&self, timeline_id: Uuid, patch: TimelinePatch) -> ApiResult<Timeline> {
        let owner = self.directory.resolve(&patch.identity_key).await?;
        let timeline = self
            .mutate_owned(timeline_id, owner.id, |timeline| patch.apply(timeline))
            .await?;

        info!("Timeline {} updated by {}", timeline_id, owner.clerk_id);
        Ok(timeline)
    }

    /// Release every image of every entry, then delete the timeline. Failed
    /// releases are logged and do not stop the delete.
    pub async fn delete(&self, timeline_id: Uuid, identity_key: &str) -> ApiResult<()> {
        let owner = self.directory.resolve(identity_key).await?;
        let timeline = self.find_owned(timeline_id, owner.id).await?;

        release_best_effort(self.storage.as_ref(), &timeline.all_images()).await;

        if !self.timelines.delete_owned(timeline_id, owner.id).await? {
            return Err(timeline_not_found());
        }
        info!("Timeline {} deleted by {}", timeline_id, owner.clerk_id);
        Ok(())
    }

    pub async fn add_entry(
        &self,
        timeline_id: Uuid,
        identity_key: &str,
        form: EntryForm,
        images: Vec<Upload>,
    ) -> ApiResult<Timeline> {
        let owner = self.directory.resolve(identity_key).await?;
        let entry = NewEntry::from_form(form)?;
        self.find_owned(timeline_id, owner.id).await?;

        let urls = store_uploads(self.storage.as_ref(), &self.policy, &images).await?;
        let result = self
            .mutate_owned(timeline_id, owner.id, |timeline| {
                timeline.add_entry(entry.clone(), urls.clone());
                Ok(())
            })
            .await;

        self.committed_or_released(result, &urls).await
    }

    /// Merge the supplied fields into an entry and append the new images to
    /// the ones it already has.
    pub async fn update_entry(
        &self,
        timeline_id: Uuid,
        entry_id: Uuid,
        identity_key: &str,
        form: EntryForm,
        images: Vec<Upload>,
    ) -> ApiResult<Timeline> {
        let owner = self.directory.resolve(identity_key).await?;
        let changes = EntryPatch::from_form(form)?;
        self.find_owned(timeline_id, owner.id)
            .await?
            .entry(entry_id)?;

        let urls = store_uploads(self.storage.as_ref(), &self.policy, &images).await?;
        let result = self
            .mutate_owned(timeline_id, owner.id, |timeline| {
                timeline
                    .update_entry(entry_id, changes.clone(), urls.clone())
                    .map(|_| ())
            })
            .await;

        self.committed_or_released(result, &urls).await
    }

    /// Release the entry's images, then remove it from the timeline.
    pub async fn delete_entry(
        &self,
        timeline_id: Uuid,
        entry_id: Uuid,
        identity_key: &str,
    ) -> ApiResult<Timeline> {
        let owner = self.directory.resolve(identity_key).await?;
        let timeline = self.find_owned(timeline_id, owner.id).await?;
        let images = timeline.entry(entry_id)?.images.clone();

        release_best_effort(self.storage.as_ref(), &images).await;

        self.mutate_owned(timeline_id, owner.id, |timeline| {
            timeline.remove_entry(entry_id).map(|_| ())
        })
        .await
    }

    async fn find_owned(&self, timeline_id: Uuid, owner: Uuid) -> ApiResult<Timeline> {
        self.timelines
            .find_owned(timeline_id, owner)
            .await?
            .ok_or_else(timeline_not_found)
    }

    /// Compensate a failed write by releasing the files uploaded for it.
    async fn committed_or_released(
        &self,
        result: ApiResult<Timeline>,
        urls: &[String],
    ) -> ApiResult<Timeline> {
        if result.is_err() {
            release_best_effort(self.storage.as_ref(), urls).await;
        }
        result
    }

    async fn mutate_owned<F>(&self, timeline_id: Uuid, owner: Uuid, mut change: F) -> ApiResult<Timeline>
    where
        F: FnMut(&mut Timeline) -> ApiResult<()> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut timeline = self.find_owned(timeline_id, owner).await?;
            change(&mut timeline)?;

            match self.timelines.save(&timeline).await {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() => {
                    debug!(
                        "Timeline {} changed during write (attempt {})",
                        timeline_id, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ApiError::Conflict(format!(
            "Timeline {} is being modified concurrently, please retry",
            timeline_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileSync;
    use crate::repositories::MemoryUserRepository;
    use crate::repositories::faulty::FaultyTimelineRepository;
    use media::MemoryStorage;

    struct Fixture {
        store: TimelineStore,
        timelines: Arc<FaultyTimelineRepository>,
        storage: Arc<MemoryStorage>,
    }

    async fn fixture() -> Fixture {
        let directory = UserDirectory::new(Arc::new(MemoryUserRepository::new()));
        for key in ["u1", "u2"] {
            let sync: ProfileSync = serde_json::from_value(serde_json::json!({
                "identityKey": key,
                "email": format!("{}@farm.test", key)
            }))
            .unwrap();
            directory.upsert_profile(sync).await.unwrap();
        }

        let timelines = Arc::new(FaultyTimelineRepository::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = TimelineStore::new(
            timelines.clone(),
            directory,
            storage.clone(),
            UploadPolicy::default(),
        );
        Fixture {
            store,
            timelines,
            storage,
        }
    }

    fn new_timeline(owner: &str, start: &str) -> NewTimeline {
        serde_json::from_value(serde_json::json!({
            "identityKey": owner,
            "title": "Rabi wheat",
            "cropType": "wheat",
            "startDate": start,
            "description": "Irrigated plot near the well"
        }))
        .unwrap()
    }

    fn entry_form() -> EntryForm {
        EntryForm {
            date: Some("2024-11-20".into()),
            activity: Some("irrigation".into()),
            weather: Some("clear".into()),
            notes: Some("first watering".into()),
            ..EntryForm::default()
        }
    }

    fn photos(n: usize) -> Vec<Upload> {
        (0..n)
            .map(|i| Upload::new(format!("p{}.png", i), "image/png", vec![1; 16]))
            .collect()
    }

    #[tokio::test]
    async fn test_mutations_by_other_users_are_not_found() {
        let fx = fixture().await;
        let timeline = fx.store.create(new_timeline("u1", "2024-11-01")).await.unwrap();

        let patch: TimelinePatch =
            serde_json::from_value(serde_json::json!({"identityKey": "u2", "title": "Mine now"}))
                .unwrap();
        let err = fx.store.update(timeline.id, patch).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Timeline not found"));

        let err = fx.store.delete(timeline.id, "u2").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(fx.store.get(timeline.id).await.unwrap().title, "Rabi wheat");
    }

    #[tokio::test]
    async fn test_list_orders_by_start_date_and_filters_status() {
        let fx = fixture().await;
        fx.store.create(new_timeline("u1", "2023-11-01")).await.unwrap();
        let latest = fx.store.create(new_timeline("u1", "2024-11-01")).await.unwrap();
        fx.store.create(new_timeline("u2", "2025-01-01")).await.unwrap();

        let query = TimelineListQuery {
            clerk_id: Some("u1".into()),
            status: None,
        };
        let listed = fx.store.list(query).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, latest.id);

        let query = TimelineListQuery {
            clerk_id: Some("u1".into()),
            status: Some("archived".into()),
        };
        assert!(fx.store.list(query).await.unwrap().is_empty());

        let query = TimelineListQuery {
            clerk_id: Some("u1".into()),
            status: Some("lost".into()),
        };
        assert!(matches!(
            fx.store.list(query).await.unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_entry_checks_run_before_any_upload() {
        let fx = fixture().await;
        let timeline = fx.store.create(new_timeline("u1", "2024-11-01")).await.unwrap();

        let err = fx
            .store
            .update_entry(timeline.id, Uuid::new_v4(), "u1", entry_form(), photos(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(fx.storage.is_empty());

        let err = fx
            .store
            .add_entry(timeline.id, "u1", entry_form(), photos(6))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(fx.storage.is_empty());
    }

    #[tokio::test]
    async fn test_lost_entry_write_releases_new_uploads() {
        let fx = fixture().await;
        let timeline = fx.store.create(new_timeline("u1", "2024-11-01")).await.unwrap();
        let timeline = fx
            .store
            .add_entry(timeline.id, "u1", entry_form(), photos(1))
            .await
            .unwrap();
        let kept = timeline.entries[0].images.clone();
        fx.timelines.conflict_saves(true);

        let err = fx
            .store
            .add_entry(timeline.id, "u1", entry_form(), photos(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(fx.storage.released().len(), 2);

        let err = fx
            .store
            .update_entry(timeline.id, timeline.entries[0].id, "u1", entry_form(), photos(3))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(fx.storage.released().len(), 5);

        assert_eq!(fx.storage.len(), 1);
        assert!(fx.storage.contains(&kept[0]));
        let stored = fx.store.get(timeline.id).await.unwrap();
        assert_eq!(stored.entries.len(), 1);
        assert_eq!(stored.entries[0].images, kept);
    }

    #[tokio::test]
    async fn test_delete_entry_releases_its_images_only() {
        let fx = fixture().await;
        let timeline = fx.store.create(new_timeline("u1", "2024-11-01")).await.unwrap();
        fx.store
            .add_entry(timeline.id, "u1", entry_form(), photos(2))
            .await
            .unwrap();
        let timeline = fx
            .store
            .add_entry(timeline.id, "u1", entry_form(), photos(3))
            .await
            .unwrap();
        assert_eq!(fx.storage.len(), 5);

        let first = timeline.entries[0].id;
        let timeline = fx.store.delete_entry(timeline.id, first, "u1").await.unwrap();
        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(fx.storage.released().len(), 2);
        assert_eq!(fx.storage.len(), 3);
    }
}
