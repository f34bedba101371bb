#![forbid(unsafe_code)]

pub mod analytics;
pub mod app_services;
pub mod completion;
pub mod dashboard;
pub mod error;
pub mod grades;
pub mod progress;
pub mod risk;
pub mod submission_service;
pub mod trend;

#[cfg(test)]
pub(crate) mod testing;

pub use lms_core::Clock;

pub use analytics::{AnalyticsOverview, AnalyticsService, OverviewMetrics};
pub use app_services::AppServices;
pub use completion::{CompletionService, CourseDetail, CoursePerformance};
pub use dashboard::{CourseOverview, Dashboard, DashboardService, ProfileSummary};
pub use error::{AccessError, AnalyticsError, AppServicesError, SubmissionError};
pub use grades::{CourseGradeSummary, CourseGrades, GradeBook, GradeRow, GradeService};
pub use progress::{CourseCard, ProgressService, ProgressSummary};
pub use risk::{RiskBadge, RiskEntry, RiskService};
pub use submission_service::{SubmissionService, SubmitReceipt};
pub use trend::{TrendPoint, TrendService};
