use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    Profile,
    embedding::{EmbeddingError, GuardedEmbedder, profile_text},
    rematch::{EventBus, MatchingEvent},
    store::{ProfileStore, StoreError},
};

/// Onboarding / profile-edit entry point.
pub struct ProfileService {
    profiles: Arc<dyn ProfileStore>,
    embedder: Arc<GuardedEmbedder>,
    bus: EventBus,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileStore>, embedder: Arc<GuardedEmbedder>, bus: EventBus) -> Self {
        Self {
            profiles,
            embedder,
            bus,
        }
    }

    /// Saves the submitted profile with a freshly generated embedding and
    /// announces the change. An embedding failure is logged and the profile
    /// is stored without one; the next rematch retries it.
    #[instrument(skip(self, profile), fields(profile_id = profile.id))]
    pub async fn submit(&self, mut profile: Profile) -> Result<Profile, StoreError> {
        profile.embedding = match self.embedder.embed(&profile_text(&profile)).await {
            Ok(vector) => Some(vector),
            Err(EmbeddingError::EmptyInput) => None,
            Err(err) => {
                warn!(error = %err, "profile embedding failed; saving without it");
                None
            }
        };

        self.profiles.upsert(&profile).await?;
        self.bus.publish(MatchingEvent::ProfileChanged {
            profile_id: profile.id,
        });
        info!(has_embedding = profile.embedding.is_some(), "profile saved");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::{EmbeddingProvider, HashProvider},
        store::MemoryProfileStore,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    struct Failing;

    #[async_trait]
    impl EmbeddingProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::InvalidResponse("quota exhausted".into()))
        }
    }

    fn profile() -> Profile {
        Profile {
            id: 11,
            program: Some("Nursing".into()),
            province: Some("Manitoba".into()),
            // stale vector from an earlier edit
            embedding: Some(vec![9.0, 9.0]),
            ..Profile::default()
        }
    }

    #[tokio::test]
    async fn submit_regenerates_embedding_and_emits_event() {
        let store = Arc::new(MemoryProfileStore::new());
        let embedder = Arc::new(GuardedEmbedder::new(
            Arc::new(HashProvider::new(32)),
            Duration::from_secs(1),
            1,
        ));
        let bus = EventBus::new(4);
        let mut events = bus.subscribe();
        let service = ProfileService::new(store.clone(), embedder, bus);

        let saved = service.submit(profile()).await.unwrap();

        let embedding = saved.embedding.clone().unwrap();
        assert_eq!(embedding.len(), 32);
        assert_eq!(store.get(11).await.unwrap(), Some(saved));
        assert_eq!(
            events.recv().await.unwrap(),
            MatchingEvent::ProfileChanged { profile_id: 11 }
        );
    }

    #[tokio::test]
    async fn provider_failure_saves_profile_without_embedding() {
        let store = Arc::new(MemoryProfileStore::new());
        let embedder = Arc::new(GuardedEmbedder::new(Arc::new(Failing), Duration::from_secs(1), 1));
        let service = ProfileService::new(store.clone(), embedder, EventBus::new(4));

        let saved = service.submit(profile()).await.unwrap();

        assert!(saved.embedding.is_none());
        assert!(store.get(11).await.unwrap().unwrap().embedding.is_none());
    }
}
