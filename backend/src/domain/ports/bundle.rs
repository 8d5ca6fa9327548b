//! Port bundle shared by the progress services.

use std::sync::Arc;

use super::{
    ActivityRepository, BadgeRepository, CourseCatalog, ProfileRepository, ProgressRepository,
};

/// Every outbound port the progress engine needs.
#[derive(Clone)]
pub struct EnginePorts {
    /// Course structure reads.
    pub catalog: Arc<dyn CourseCatalog>,
    /// Enrollment and lesson/module state.
    pub progress: Arc<dyn ProgressRepository>,
    /// Submissions and quiz attempts.
    pub activity: Arc<dyn ActivityRepository>,
    /// Badge catalog and awards.
    pub badges: Arc<dyn BadgeRepository>,
    /// Profile rollups.
    pub profiles: Arc<dyn ProfileRepository>,
}

impl EnginePorts {
    /// Build a bundle from individual adapters.
    pub fn new(
        catalog: Arc<dyn CourseCatalog>,
        progress: Arc<dyn ProgressRepository>,
        activity: Arc<dyn ActivityRepository>,
        badges: Arc<dyn BadgeRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            catalog,
            progress,
            activity,
            badges,
            profiles,
        }
    }

    /// Build a bundle from one store that implements every port.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CourseCatalog
            + ProgressRepository
            + ActivityRepository
            + BadgeRepository
            + ProfileRepository
            + 'static,
    {
        Self {
            catalog: store.clone(),
            progress: store.clone(),
            activity: store.clone(),
            badges: store.clone(),
            profiles: store,
        }
    }
}
