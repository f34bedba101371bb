use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::assignment::Assignment;
use crate::model::ids::{AssignmentId, UserId};

/// A user's attempt at one assignment. Unique per (assignment, user).
///
/// `submitted_at == None` means the row exists but nothing was handed in;
/// `score == None` means it has not been graded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<u32>,
    pub file_url: Option<String>,
    pub comment: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// A fresh, handed-in submission with no grade yet.
    #[must_use]
    pub fn submitted(
        assignment_id: AssignmentId,
        user_id: UserId,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            assignment_id,
            user_id,
            submitted_at: Some(submitted_at),
            score: None,
            file_url: None,
            comment: None,
            graded_at: None,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: u32, graded_at: DateTime<Utc>) -> Self {
        self.score = Some(score);
        self.graded_at = Some(graded_at);
        self
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }

    /// Late iff handed in strictly after the due date. Undated assignments are never late.
    #[must_use]
    pub fn is_late_for(&self, assignment: &Assignment) -> bool {
        is_late(self.submitted_at, assignment.due_at())
    }
}

#[must_use]
pub fn is_late(submitted_at: Option<DateTime<Utc>>, due_at: Option<DateTime<Utc>>) -> bool {
    match (submitted_at, due_at) {
        (Some(submitted), Some(due)) => submitted > due,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseId;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn assignment(due_at: Option<DateTime<Utc>>) -> Assignment {
        Assignment::new(AssignmentId::new(1), CourseId::new(1), "HW", due_at, None).unwrap()
    }

    #[test]
    fn late_only_when_strictly_after_due() {
        let due = fixed_now();
        let on_time = Submission::submitted(AssignmentId::new(1), UserId::new(1), due);
        assert!(!on_time.is_late_for(&assignment(Some(due))));

        let late = Submission::submitted(
            AssignmentId::new(1),
            UserId::new(1),
            due + Duration::seconds(1),
        );
        assert!(late.is_late_for(&assignment(Some(due))));
    }

    #[test]
    fn undated_assignment_is_never_late() {
        let sub = Submission::submitted(AssignmentId::new(1), UserId::new(1), fixed_now());
        assert!(!sub.is_late_for(&assignment(None)));
    }

    #[test]
    fn grading_sets_score_and_timestamp() {
        let sub = Submission::submitted(AssignmentId::new(1), UserId::new(1), fixed_now())
            .with_score(80, fixed_now());
        assert!(sub.is_graded());
        assert_eq!(sub.graded_at, Some(fixed_now()));
    }
}
