//! Notification feed: newest first, capped, with mark-as-read.

use crate::domain::errors::require_field;
use crate::domain::{DomainError, Notification};
use crate::ports::NotificationStore;
use crate::shared::timeout::bounded;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    limit: u32,
    call_timeout: Duration,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, limit: u32, call_timeout: Duration) -> Self {
        Self {
            store,
            limit,
            call_timeout,
        }
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Notification>, DomainError> {
        require_field("user_id", user_id)?;
        bounded(
            self.call_timeout,
            "list notifications",
            self.store.notifications_for_user(user_id, self.limit),
        )
        .await
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<(), DomainError> {
        require_field("notification_id", notification_id)?;
        let found = bounded(
            self.call_timeout,
            "mark notification read",
            self.store.mark_read(notification_id, Utc::now()),
        )
        .await?;
        if !found {
            return Err(DomainError::NotFound(format!(
                "notification {}",
                notification_id
            )));
        }
        debug!(notification_id, "notification marked read");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryStore;
    use crate::domain::{NewNotification, NotificationKind};

    async fn seed(store: &MemoryStore, user: &str, n: usize) {
        for i in 0..n {
            store
                .insert_notification(&NewNotification {
                    user_id: user.into(),
                    title: format!("note {}", i),
                    message: String::new(),
                    kind: NotificationKind::Other("system".into()),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_feed_is_capped_and_newest_first() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "u-1", 12).await;
        seed(&store, "u-2", 1).await;
        let svc = NotificationService::new(store, 10, Duration::from_secs(2));

        let feed = svc.for_user("u-1").await.unwrap();
        assert_eq!(feed.len(), 10);
        assert_eq!(feed[0].title, "note 11");
        assert!(feed.iter().all(|n| n.user_id == "u-1"));
    }

    #[tokio::test]
    async fn test_mark_read_sets_flag_or_not_found() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "u-1", 1).await;
        let svc = NotificationService::new(store.clone(), 10, Duration::from_secs(2));
        let id = svc.for_user("u-1").await.unwrap()[0].id.clone();

        svc.mark_read(&id).await.unwrap();
        let note = &svc.for_user("u-1").await.unwrap()[0];
        assert!(note.is_read);
        assert!(note.read_at.is_some());

        assert!(matches!(
            svc.mark_read("missing").await,
            Err(DomainError::NotFound(_))
        ));
    }
}
