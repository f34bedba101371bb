use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::metrics::MonthBucket;
use lms_core::model::{
    Assignment, AssignmentId, Course, CourseId, Enrollment, Role, Submission, SubmissionId, User,
    UserId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── ROW SHAPES ────────────────────────────────────────────────────────────────
//

/// A stored submission together with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    pub id: SubmissionId,
    pub submission: Submission,
}

/// Name and contact of a user, readable even when role data is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            name: user.name().to_owned(),
            email: user.email().to_owned(),
        }
    }
}

/// Per enrolled course: how many assignments exist and how many distinct ones
/// the user has handed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseProgressRow {
    pub course_id: CourseId,
    pub total_assignments: u32,
    pub submitted_assignments: u32,
}

/// One graded submission, flattened with the fields needed for percentage math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedScore {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub assignment_id: AssignmentId,
    pub score: u32,
    pub total_score: Option<u32>,
}

//
// ─── RECORD REPOSITORIES ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist or update a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError>;

    /// Fetch a user by ID, `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Users holding `role`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` when stored role data cannot be read.
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StorageError>;

    /// Distinct users with at least one enrollment, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_enrolled_users(&self) -> Result<Vec<UserIdentity>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_users(&self) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// All courses ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// Courses the user is enrolled in, ordered by title.
    ///
    /// `title_filter` is a literal substring match, case-insensitive for ASCII.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_courses_for_user(
        &self,
        user: UserId,
        title_filter: Option<&str>,
    ) -> Result<Vec<Course>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Enroll a user. Enrolling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn is_enrolled(&self, user: UserId, course: CourseId) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_enrollments_for_user(&self, user: UserId) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError>;

    /// Assignments of a course by due date, undated ones last.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_assignments_for_course(
        &self,
        course: CourseId,
    ) -> Result<Vec<Assignment>, StorageError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert or overwrite the submission for its (assignment, user) pair.
    ///
    /// A second upsert for the same pair updates the existing row and returns
    /// the same id; it never creates a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the submission cannot be stored.
    async fn upsert_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionId, StorageError>;

    /// Hand in (or re-hand in) for the pair in one atomic write.
    ///
    /// Stamps `submitted_at`. A `None` file or comment keeps the stored value.
    /// The grade columns are never written, so a score recorded concurrently
    /// survives.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown assignment or user, or
    /// other repository failures.
    async fn record_hand_in(
        &self,
        assignment: AssignmentId,
        user: UserId,
        submitted_at: DateTime<Utc>,
        file_url: Option<&str>,
        comment: Option<&str>,
    ) -> Result<SubmissionId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_submission(
        &self,
        assignment: AssignmentId,
        user: UserId,
    ) -> Result<Option<SubmissionRow>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_submissions_for_user_in_course(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<SubmissionRow>, StorageError>;

    /// Record a grade on an existing submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when no submission exists for the pair.
    async fn set_score(
        &self,
        assignment: AssignmentId,
        user: UserId,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

//
// ─── BULK AGGREGATES ──────────────────────────────────────────────────────────
//

/// Grouped queries that feed the analytics engine.
///
/// Each method is a single round-trip returning flat rows or lookup maps, so
/// callers never walk relationships row by row.
#[async_trait]
pub trait AggregateQueries: Send + Sync {
    /// `{course → number of assignments}`; courses without assignments are absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn assignment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError>;

    /// `{course → number of enrolled users}`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn enrollment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError>;

    /// Every (user, course) enrollment pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn enrollment_pairs(&self) -> Result<Vec<Enrollment>, StorageError>;

    /// `{(user, course) → distinct assignments handed in}`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn submitted_counts_by_user_course(
        &self,
    ) -> Result<HashMap<(UserId, CourseId), u32>, StorageError>;

    /// Assignment totals and distinct hand-ins for each course the user is enrolled in.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn enrolled_progress_by_course(
        &self,
        user: UserId,
    ) -> Result<Vec<CourseProgressRow>, StorageError>;

    /// `{user → assignments across all enrolled courses}`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn expected_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError>;

    /// `{user → handed-in submissions}`, system-wide.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn submitted_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError>;

    /// Every graded submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn graded_scores(&self) -> Result<Vec<GradedScore>, StorageError>;

    /// Graded submissions of one user across all courses.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn graded_scores_for_user(&self, user: UserId)
    -> Result<Vec<GradedScore>, StorageError>;

    /// Hand-in counts per calendar month for `from <= submitted_at < until`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn monthly_submission_counts(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<MonthBucket, u32>, StorageError>;

    /// Handed-in submissions of one user, system-wide.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn submitted_count_for_user(&self, user: UserId) -> Result<u32, StorageError>;

    /// Number of distinct courses with at least one enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn active_course_count(&self) -> Result<u32, StorageError>;
}

pub(crate) fn count_u32(field: &'static str, n: usize) -> Result<u32, StorageError> {
    u32::try_from(n).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

//
// ─── IN-MEMORY BACKEND ────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    courses: BTreeMap<CourseId, Course>,
    enrollments: BTreeSet<(UserId, CourseId)>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    submissions: BTreeMap<(AssignmentId, UserId), SubmissionRow>,
    next_submission_id: u64,
}

impl MemoryState {
    fn course_of(&self, assignment: AssignmentId) -> Option<CourseId> {
        self.assignments.get(&assignment).map(Assignment::course_id)
    }

    fn handed_in(&self) -> impl Iterator<Item = &Submission> {
        self.submissions
            .values()
            .map(|row| &row.submission)
            .filter(|s| s.is_submitted())
    }

    fn graded(&self) -> impl Iterator<Item = GradedScore> + '_ {
        self.submissions.values().filter_map(|row| {
            let s = &row.submission;
            let score = s.score?;
            let assignment = self.assignments.get(&s.assignment_id)?;
            Some(GradedScore {
                user_id: s.user_id,
                course_id: assignment.course_id(),
                assignment_id: s.assignment_id,
                score,
                total_score: assignment.total_score(),
            })
        })
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one lock, so every aggregate sees a consistent snapshot.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        self.lock()?.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .filter(|u| u.role() == role)
            .cloned()
            .collect())
    }

    async fn list_enrolled_users(&self) -> Result<Vec<UserIdentity>, StorageError> {
        let guard = self.lock()?;
        let enrolled: BTreeSet<UserId> = guard.enrollments.iter().map(|(u, _)| *u).collect();
        Ok(enrolled
            .into_iter()
            .filter_map(|id| guard.users.get(&id))
            .map(UserIdentity::from)
            .collect())
    }

    async fn count_users(&self) -> Result<u32, StorageError> {
        count_u32("users", self.lock()?.users.len())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        self.lock()?.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        Ok(self.lock()?.courses.values().cloned().collect())
    }

    async fn list_courses_for_user(
        &self,
        user: UserId,
        title_filter: Option<&str>,
    ) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        let needle = title_filter
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase);
        let mut courses: Vec<Course> = guard
            .enrollments
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, c)| guard.courses.get(c))
            .filter(|c| {
                needle
                    .as_deref()
                    .is_none_or(|n| c.title().to_ascii_lowercase().contains(n))
            })
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.title().cmp(b.title()).then(a.id().cmp(&b.id())));
        Ok(courses)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&enrollment.user_id)
            || !guard.courses.contains_key(&enrollment.course_id)
        {
            return Err(StorageError::NotFound);
        }
        guard
            .enrollments
            .insert((enrollment.user_id, enrollment.course_id));
        Ok(())
    }

    async fn is_enrolled(&self, user: UserId, course: CourseId) -> Result<bool, StorageError> {
        Ok(self.lock()?.enrollments.contains(&(user, course)))
    }

    async fn count_enrollments_for_user(&self, user: UserId) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        count_u32(
            "enrollments",
            guard.enrollments.iter().filter(|(u, _)| *u == user).count(),
        )
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryRepository {
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&assignment.course_id()) {
            return Err(StorageError::NotFound);
        }
        guard.assignments.insert(assignment.id(), assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        Ok(self.lock()?.assignments.get(&id).cloned())
    }

    async fn list_assignments_for_course(
        &self,
        course: CourseId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Assignment> = guard
            .assignments
            .values()
            .filter(|a| a.course_id() == course)
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.due_at().is_none(), a.due_at(), a.id()));
        Ok(out)
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn upsert_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.assignments.contains_key(&submission.assignment_id)
            || !guard.users.contains_key(&submission.user_id)
        {
            return Err(StorageError::NotFound);
        }
        let key = (submission.assignment_id, submission.user_id);
        if let Some(row) = guard.submissions.get_mut(&key) {
            row.submission = submission.clone();
            return Ok(row.id);
        }
        guard.next_submission_id += 1;
        let id = SubmissionId::new(guard.next_submission_id);
        guard.submissions.insert(
            key,
            SubmissionRow {
                id,
                submission: submission.clone(),
            },
        );
        Ok(id)
    }

    async fn record_hand_in(
        &self,
        assignment: AssignmentId,
        user: UserId,
        submitted_at: DateTime<Utc>,
        file_url: Option<&str>,
        comment: Option<&str>,
    ) -> Result<SubmissionId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.assignments.contains_key(&assignment) || !guard.users.contains_key(&user) {
            return Err(StorageError::NotFound);
        }
        if let Some(row) = guard.submissions.get_mut(&(assignment, user)) {
            let sub = &mut row.submission;
            sub.submitted_at = Some(submitted_at);
            if let Some(url) = file_url {
                sub.file_url = Some(url.to_owned());
            }
            if let Some(text) = comment {
                sub.comment = Some(text.to_owned());
            }
            return Ok(row.id);
        }
        guard.next_submission_id += 1;
        let id = SubmissionId::new(guard.next_submission_id);
        let mut submission = Submission::submitted(assignment, user, submitted_at);
        submission.file_url = file_url.map(str::to_owned);
        submission.comment = comment.map(str::to_owned);
        guard
            .submissions
            .insert((assignment, user), SubmissionRow { id, submission });
        Ok(id)
    }

    async fn get_submission(
        &self,
        assignment: AssignmentId,
        user: UserId,
    ) -> Result<Option<SubmissionRow>, StorageError> {
        Ok(self.lock()?.submissions.get(&(assignment, user)).cloned())
    }

    async fn list_submissions_for_user_in_course(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .submissions
            .values()
            .filter(|row| row.submission.user_id == user)
            .filter(|row| guard.course_of(row.submission.assignment_id) == Some(course))
            .cloned()
            .collect())
    }

    async fn set_score(
        &self,
        assignment: AssignmentId,
        user: UserId,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard
            .submissions
            .get_mut(&(assignment, user))
            .ok_or(StorageError::NotFound)?;
        row.submission.score = Some(score);
        row.submission.graded_at = Some(graded_at);
        Ok(())
    }
}

#[async_trait]
impl AggregateQueries for InMemoryRepository {
    async fn assignment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
        let guard = self.lock()?;
        let mut out = HashMap::new();
        for a in guard.assignments.values() {
            *out.entry(a.course_id()).or_insert(0) += 1;
        }
        Ok(out)
    }

    async fn enrollment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
        let guard = self.lock()?;
        let mut out = HashMap::new();
        for (_, course) in &guard.enrollments {
            *out.entry(*course).or_insert(0) += 1;
        }
        Ok(out)
    }

    async fn enrollment_pairs(&self) -> Result<Vec<Enrollment>, StorageError> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .map(|(u, c)| Enrollment::new(*u, *c))
            .collect())
    }

    async fn submitted_counts_by_user_course(
        &self,
    ) -> Result<HashMap<(UserId, CourseId), u32>, StorageError> {
        let guard = self.lock()?;
        let mut distinct: HashSet<(UserId, CourseId, AssignmentId)> = HashSet::new();
        for s in guard.handed_in() {
            if let Some(course) = guard.course_of(s.assignment_id) {
                distinct.insert((s.user_id, course, s.assignment_id));
            }
        }
        let mut out = HashMap::new();
        for (user, course, _) in distinct {
            *out.entry((user, course)).or_insert(0) += 1;
        }
        Ok(out)
    }

    async fn enrolled_progress_by_course(
        &self,
        user: UserId,
    ) -> Result<Vec<CourseProgressRow>, StorageError> {
        let guard = self.lock()?;
        let mut out = Vec::new();
        for (_, course) in guard.enrollments.iter().filter(|(u, _)| *u == user) {
            let total = guard
                .assignments
                .values()
                .filter(|a| a.course_id() == *course)
                .count();
            let submitted: HashSet<AssignmentId> = guard
                .handed_in()
                .filter(|s| s.user_id == user)
                .filter(|s| guard.course_of(s.assignment_id) == Some(*course))
                .map(|s| s.assignment_id)
                .collect();
            out.push(CourseProgressRow {
                course_id: *course,
                total_assignments: count_u32("assignments", total)?,
                submitted_assignments: count_u32("submissions", submitted.len())?,
            });
        }
        Ok(out)
    }

    async fn expected_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError> {
        let guard = self.lock()?;
        let mut per_course: HashMap<CourseId, u32> = HashMap::new();
        for a in guard.assignments.values() {
            *per_course.entry(a.course_id()).or_insert(0) += 1;
        }
        let mut out = HashMap::new();
        for (user, course) in &guard.enrollments {
            if let Some(n) = per_course.get(course) {
                *out.entry(*user).or_insert(0) += *n;
            }
        }
        Ok(out)
    }

    async fn submitted_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError> {
        let guard = self.lock()?;
        let mut out = HashMap::new();
        for s in guard.handed_in() {
            *out.entry(s.user_id).or_insert(0) += 1;
        }
        Ok(out)
    }

    async fn graded_scores(&self) -> Result<Vec<GradedScore>, StorageError> {
        Ok(self.lock()?.graded().collect())
    }

    async fn graded_scores_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<GradedScore>, StorageError> {
        Ok(self
            .lock()?
            .graded()
            .filter(|g| g.user_id == user)
            .collect())
    }

    async fn monthly_submission_counts(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<MonthBucket, u32>, StorageError> {
        let guard = self.lock()?;
        let mut out = HashMap::new();
        for at in guard.handed_in().filter_map(|s| s.submitted_at) {
            if at >= from && at < until {
                *out.entry(MonthBucket::containing(at)).or_insert(0) += 1;
            }
        }
        Ok(out)
    }

    async fn submitted_count_for_user(&self, user: UserId) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        count_u32(
            "submissions",
            guard.handed_in().filter(|s| s.user_id == user).count(),
        )
    }

    async fn active_course_count(&self) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        let courses: HashSet<CourseId> = guard.enrollments.iter().map(|(_, c)| *c).collect();
        count_u32("courses", courses.len())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub aggregates: Arc<dyn AggregateQueries>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every slot to clones of one repository.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + CourseRepository
            + EnrollmentRepository
            + AssignmentRepository
            + SubmissionRepository
            + AggregateQueries
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            courses: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            assignments: Arc::new(repo.clone()),
            submissions: Arc::new(repo.clone()),
            aggregates: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::fixed_now;

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        let user = User::new(UserId::new(1), "Mina", "mina@example.com", Role::Student).unwrap();
        repo.upsert_user(&user).await.unwrap();
        let course = Course::new(CourseId::new(1), "Web Basics").unwrap();
        repo.upsert_course(&course).await.unwrap();
        repo.enroll(Enrollment::new(user.id(), course.id()))
            .await
            .unwrap();
        for id in 1..=2 {
            let a = Assignment::new(
                AssignmentId::new(id),
                course.id(),
                format!("HW{id}"),
                None,
                None,
            )
            .unwrap();
            repo.upsert_assignment(&a).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn resubmission_overwrites_the_same_row() {
        let repo = seeded().await;
        let mut sub = Submission::submitted(AssignmentId::new(1), UserId::new(1), fixed_now());
        sub.file_url = Some("/uploads/v1.pdf".into());
        let first = repo.upsert_submission(&sub).await.unwrap();

        sub.file_url = Some("/uploads/v2.pdf".into());
        sub.submitted_at = Some(fixed_now() + chrono::Duration::hours(1));
        let second = repo.upsert_submission(&sub).await.unwrap();

        assert_eq!(first, second);
        let counts = repo.submitted_counts_by_user_course().await.unwrap();
        assert_eq!(counts.get(&(UserId::new(1), CourseId::new(1))), Some(&1));
        let row = repo
            .get_submission(AssignmentId::new(1), UserId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.submission.file_url.as_deref(), Some("/uploads/v2.pdf"));
    }

    #[tokio::test]
    async fn enrolling_twice_is_idempotent() {
        let repo = seeded().await;
        repo.enroll(Enrollment::new(UserId::new(1), CourseId::new(1)))
            .await
            .unwrap();
        let counts = repo.enrollment_counts_by_course().await.unwrap();
        assert_eq!(counts.get(&CourseId::new(1)), Some(&1));
    }

    #[tokio::test]
    async fn enrolled_progress_counts_only_handed_in_work() {
        let repo = seeded().await;
        let mut draft = Submission::submitted(AssignmentId::new(2), UserId::new(1), fixed_now());
        draft.submitted_at = None;
        repo.upsert_submission(&draft).await.unwrap();
        repo.upsert_submission(&Submission::submitted(
            AssignmentId::new(1),
            UserId::new(1),
            fixed_now(),
        ))
        .await
        .unwrap();

        let rows = repo
            .enrolled_progress_by_course(UserId::new(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_assignments, 2);
        assert_eq!(rows[0].submitted_assignments, 1);
    }

    #[tokio::test]
    async fn set_score_requires_existing_submission() {
        let repo = seeded().await;
        let err = repo
            .set_score(AssignmentId::new(1), UserId::new(1), 90, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn hand_in_keeps_grade_and_unset_fields() {
        let repo = seeded().await;
        let (a, u) = (AssignmentId::new(1), UserId::new(1));
        let first = repo
            .record_hand_in(a, u, fixed_now(), Some("/uploads/v1.pdf"), Some("draft"))
            .await
            .unwrap();
        repo.set_score(a, u, 70, fixed_now()).await.unwrap();

        let later = fixed_now() + chrono::Duration::hours(1);
        let second = repo
            .record_hand_in(a, u, later, None, Some("final"))
            .await
            .unwrap();
        assert_eq!(first, second);

        let row = repo.get_submission(a, u).await.unwrap().unwrap();
        assert_eq!(row.submission.submitted_at, Some(later));
        assert_eq!(row.submission.file_url.as_deref(), Some("/uploads/v1.pdf"));
        assert_eq!(row.submission.comment.as_deref(), Some("final"));
        assert_eq!(row.submission.score, Some(70));
    }

    #[tokio::test]
    async fn title_filter_has_no_wildcards() {
        let repo = seeded().await;
        let user = UserId::new(1);
        assert!(repo.list_courses_for_user(user, Some("_")).await.unwrap().is_empty());
        assert!(repo.list_courses_for_user(user, Some("%")).await.unwrap().is_empty());
        let hits = repo.list_courses_for_user(user, Some("WEB")).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}

