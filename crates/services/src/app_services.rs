use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::analytics::AnalyticsService;
use crate::completion::CompletionService;
use crate::dashboard::DashboardService;
use crate::error::AppServicesError;
use crate::grades::GradeService;
use crate::progress::ProgressService;
use crate::risk::RiskService;
use crate::submission_service::SubmissionService;
use crate::trend::TrendService;

/// Assembles every service over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    grades: Arc<GradeService>,
    completion: Arc<CompletionService>,
    trend: Arc<TrendService>,
    risk: Arc<RiskService>,
    analytics: Arc<AnalyticsService>,
    dashboard: Arc<DashboardService>,
    submissions: Arc<SubmissionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.aggregates),
        ));
        let grades = Arc::new(GradeService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.submissions),
            Arc::clone(&storage.aggregates),
        ));
        let completion = Arc::new(CompletionService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.aggregates),
        ));
        let trend = Arc::new(TrendService::new(clock, Arc::clone(&storage.aggregates)));
        let risk = Arc::new(RiskService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.aggregates),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.aggregates),
            Arc::clone(&completion),
            Arc::clone(&trend),
            Arc::clone(&risk),
        ));
        let dashboard = Arc::new(DashboardService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.aggregates),
            Arc::clone(&progress),
            Arc::clone(&grades),
        ));
        let submissions = Arc::new(SubmissionService::new(
            clock,
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.submissions),
        ));

        Self {
            progress,
            grades,
            completion,
            trend,
            risk,
            analytics,
            dashboard,
            submissions,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn grades(&self) -> Arc<GradeService> {
        Arc::clone(&self.grades)
    }

    #[must_use]
    pub fn completion(&self) -> Arc<CompletionService> {
        Arc::clone(&self.completion)
    }

    #[must_use]
    pub fn trend(&self) -> Arc<TrendService> {
        Arc::clone(&self.trend)
    }

    #[must_use]
    pub fn risk(&self) -> Arc<RiskService> {
        Arc::clone(&self.risk)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn submissions(&self) -> Arc<SubmissionService> {
        Arc::clone(&self.submissions)
    }
}
