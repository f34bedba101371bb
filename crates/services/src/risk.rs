use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use lms_core::metrics::{mean, normalized_percentage, percent, ratio, round1};
use lms_core::model::{Role, UserId};
use storage::repository::{AggregateQueries, GradedScore, UserIdentity, UserRepository};

use crate::error::AnalyticsError;

pub const RISK_LIST_LIMIT: usize = 3;
pub const LOW_PROGRESS_BELOW: u32 = 40;
pub const LOW_SUBMISSION_RATIO_BELOW: f64 = 0.5;
pub const LOW_AVERAGE_BELOW: f64 = 60.0;
const UNGRADED_SORT_KEY: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBadge {
    LowProgress,
    LowSubmissionRate,
    LowAverageScore,
}

impl RiskBadge {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RiskBadge::LowProgress => "low progress",
            RiskBadge::LowSubmissionRate => "low submission rate",
            RiskBadge::LowAverageScore => "low average score",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEntry {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub progress: u32,
    /// Shown as the progress figure.
    pub submission_rate: u32,
    pub avg_score: Option<f64>,
    pub badges: Vec<RiskBadge>,
}

/// Aggregate figures for one student before classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentMetrics {
    pub expected: u32,
    pub submitted: u32,
    pub avg_score: Option<f64>,
}

/// Badges earned by a student; each rule is evaluated independently.
///
/// The submission-rate rule reads the raw ratio, so it can disagree with the
/// rounded progress near 50%.
#[must_use]
pub fn badges_for(metrics: &StudentMetrics) -> Vec<RiskBadge> {
    let mut badges = Vec::new();
    if percent(metrics.submitted, metrics.expected) < LOW_PROGRESS_BELOW {
        badges.push(RiskBadge::LowProgress);
    }
    if ratio(metrics.submitted, metrics.expected).is_some_and(|r| r < LOW_SUBMISSION_RATIO_BELOW) {
        badges.push(RiskBadge::LowSubmissionRate);
    }
    if metrics.avg_score.is_some_and(|avg| avg < LOW_AVERAGE_BELOW) {
        badges.push(RiskBadge::LowAverageScore);
    }
    badges
}

/// `None` when the student earns no badge.
#[must_use]
pub fn classify(identity: &UserIdentity, metrics: &StudentMetrics) -> Option<RiskEntry> {
    let badges = badges_for(metrics);
    if badges.is_empty() {
        return None;
    }
    let progress = percent(metrics.submitted, metrics.expected);
    Some(RiskEntry {
        user_id: identity.id,
        name: identity.name.clone(),
        email: identity.email.clone(),
        progress,
        submission_rate: progress,
        avg_score: metrics.avg_score.map(round1),
        badges,
    })
}

/// Worst progress first, then worst score; ungraded students sort after any
/// real score. Keeps at most `RISK_LIST_LIMIT` entries.
#[must_use]
pub fn rank(mut entries: Vec<RiskEntry>) -> Vec<RiskEntry> {
    entries.sort_by(|a, b| {
        a.progress.cmp(&b.progress).then_with(|| {
            let a_avg = a.avg_score.unwrap_or(UNGRADED_SORT_KEY);
            let b_avg = b.avg_score.unwrap_or(UNGRADED_SORT_KEY);
            a_avg.total_cmp(&b_avg)
        })
    });
    entries.truncate(RISK_LIST_LIMIT);
    entries
}

/// `{user → unrounded mean normalized percentage}`.
#[must_use]
pub fn average_by_user(graded: &[GradedScore]) -> HashMap<UserId, f64> {
    let mut per_user: HashMap<UserId, Vec<f64>> = HashMap::new();
    for g in graded {
        per_user
            .entry(g.user_id)
            .or_default()
            .push(normalized_percentage(g.score, g.total_score));
    }
    per_user
        .into_iter()
        .filter_map(|(user, values)| mean(&values).map(|avg| (user, avg)))
        .collect()
}

/// Flags struggling students.
#[derive(Clone)]
pub struct RiskService {
    users: Arc<dyn UserRepository>,
    aggregates: Arc<dyn AggregateQueries>,
}

impl RiskService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, aggregates: Arc<dyn AggregateQueries>) -> Self {
        Self { users, aggregates }
    }

    /// Students to classify. Falls back to every enrolled user when role data
    /// cannot be read.
    async fn candidates(&self) -> Result<Vec<UserIdentity>, AnalyticsError> {
        match self.users.list_users_by_role(Role::Student).await {
            Ok(students) => Ok(students.iter().map(UserIdentity::from).collect()),
            Err(err) => {
                log::warn!("student lookup failed ({err}); using enrolled users instead");
                Ok(self.users.list_enrolled_users().await?)
            }
        }
    }

    /// Up to three at-risk students, worst first.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn at_risk_students(&self) -> Result<Vec<RiskEntry>, AnalyticsError> {
        let expected = self.aggregates.expected_by_user().await?;
        let submitted = self.aggregates.submitted_by_user().await?;
        let averages = average_by_user(&self.aggregates.graded_scores().await?);
        let candidates = self.candidates().await?;

        let flagged: Vec<RiskEntry> = candidates
            .iter()
            .filter_map(|identity| {
                let metrics = StudentMetrics {
                    expected: expected.get(&identity.id).copied().unwrap_or(0),
                    submitted: submitted.get(&identity.id).copied().unwrap_or(0),
                    avg_score: averages.get(&identity.id).copied(),
                };
                classify(identity, &metrics)
            })
            .collect();
        log::debug!(
            "{} of {} students flagged at risk",
            flagged.len(),
            candidates.len()
        );
        Ok(rank(flagged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, grade, submit};
    use async_trait::async_trait;
    use lms_core::model::{Enrollment, User};
    use storage::repository::StorageError;

    fn identity(id: u64) -> UserIdentity {
        UserIdentity {
            id: UserId::new(id),
            name: format!("S{id}"),
            email: format!("s{id}@example.com"),
        }
    }

    fn entry(id: u64, progress: u32, avg: Option<f64>) -> RiskEntry {
        RiskEntry {
            user_id: UserId::new(id),
            name: String::new(),
            email: String::new(),
            progress,
            submission_rate: progress,
            avg_score: avg,
            badges: vec![RiskBadge::LowProgress],
        }
    }

    #[test]
    fn healthy_student_has_no_badges() {
        let metrics = StudentMetrics {
            expected: 4,
            submitted: 3,
            avg_score: Some(62.5),
        };
        assert!(badges_for(&metrics).is_empty());
        assert!(classify(&identity(1), &metrics).is_none());
    }

    #[test]
    fn ratio_badge_ignores_rounding() {
        // 99 / 199 rounds to 50% progress but the raw ratio is below one half.
        let metrics = StudentMetrics {
            expected: 199,
            submitted: 99,
            avg_score: None,
        };
        assert_eq!(percent(99, 199), 50);
        assert_eq!(badges_for(&metrics), vec![RiskBadge::LowSubmissionRate]);
    }

    #[test]
    fn no_expected_work_only_trips_progress() {
        let metrics = StudentMetrics {
            expected: 0,
            submitted: 0,
            avg_score: None,
        };
        assert_eq!(badges_for(&metrics), vec![RiskBadge::LowProgress]);
        assert_eq!(RiskBadge::LowProgress.label(), "low progress");
    }

    #[test]
    fn rank_orders_by_progress_then_score() {
        let ranked = rank(vec![
            entry(1, 30, None),
            entry(2, 10, Some(70.0)),
            entry(3, 30, Some(20.0)),
            entry(4, 10, Some(40.0)),
            entry(5, 5, None),
        ]);
        let ids: Vec<u64> = ranked.iter().map(|e| e.user_id.value()).collect();
        assert_eq!(ids, vec![5, 4, 2]);
    }

    #[tokio::test]
    async fn one_struggling_student_among_five() {
        let fx = Fixture::new().await;
        fx.storage
            .enrollments
            .enroll(Enrollment::new(fx.outsider, fx.course))
            .await
            .unwrap();
        let mut others = vec![fx.outsider];
        for (id, name) in [(2, "Sara"), (3, "Kian"), (4, "Leila")] {
            others.push(fx.add_student(id, name).await);
        }
        for user in &others {
            for a in 1..=4 {
                submit(&fx, a, *user).await;
                grade(&fx, a, *user, 85).await;
            }
        }
        submit(&fx, 1, fx.student).await;
        grade(&fx, 1, fx.student, 30).await;

        let svc = RiskService::new(fx.storage.users.clone(), fx.storage.aggregates.clone());
        let risky = svc.at_risk_students().await.unwrap();

        assert_eq!(risky.len(), 1);
        let mina = &risky[0];
        assert_eq!(mina.user_id, fx.student);
        assert_eq!(mina.progress, 25);
        assert_eq!(mina.avg_score, Some(30.0));
        assert_eq!(
            mina.badges,
            vec![
                RiskBadge::LowProgress,
                RiskBadge::LowSubmissionRate,
                RiskBadge::LowAverageScore
            ]
        );
    }

    struct BrokenRoles {
        enrolled: Vec<UserIdentity>,
    }

    #[async_trait]
    impl UserRepository for BrokenRoles {
        async fn upsert_user(&self, _user: &User) -> Result<(), StorageError> {
            Ok(())
        }

        async fn get_user(&self, _id: UserId) -> Result<Option<User>, StorageError> {
            Ok(None)
        }

        async fn list_users_by_role(&self, _role: Role) -> Result<Vec<User>, StorageError> {
            Err(StorageError::Serialization("unknown role: guest".into()))
        }

        async fn list_enrolled_users(&self) -> Result<Vec<UserIdentity>, StorageError> {
            Ok(self.enrolled.clone())
        }

        async fn count_users(&self) -> Result<u32, StorageError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn unreadable_roles_fall_back_to_enrolled_users() {
        let fx = Fixture::new().await;
        let users = Arc::new(BrokenRoles {
            enrolled: vec![identity(1)],
        });
        let svc = RiskService::new(users, fx.storage.aggregates.clone());
        let risky = svc.at_risk_students().await.unwrap();
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].user_id, UserId::new(1));
        assert_eq!(risky[0].name, "S1");
    }
}
