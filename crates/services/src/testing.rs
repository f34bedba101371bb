//! Shared fixtures for unit tests.

use chrono::Duration;

use lms_core::model::{
    Assignment, AssignmentId, Course, CourseId, Enrollment, Role, Submission, User, UserId,
};
use lms_core::time::fixed_now;
use storage::repository::Storage;

/// One student in "Web Basics" (4 assignments, undated total) plus an
/// assignment-free course, an instructor, and a user with no enrollments.
pub(crate) struct Fixture {
    pub storage: Storage,
    pub student: UserId,
    pub outsider: UserId,
    pub instructor: UserId,
    pub course: CourseId,
    pub empty_course: CourseId,
}

impl Fixture {
    pub async fn new() -> Self {
        let storage = Storage::in_memory();
        let student = UserId::new(1);
        let outsider = UserId::new(9);
        let instructor = UserId::new(10);
        let course = CourseId::new(1);
        let empty_course = CourseId::new(2);

        for (id, name, role) in [
            (student, "Mina", Role::Student),
            (outsider, "Arash", Role::Student),
            (instructor, "Dr. Rahimi", Role::Instructor),
        ] {
            let user = User::new(id, name, format!("{}@example.com", id.value()), role).unwrap();
            storage.users.upsert_user(&user).await.unwrap();
        }

        storage
            .courses
            .upsert_course(&Course::new(course, "Web Basics").unwrap())
            .await
            .unwrap();
        storage
            .courses
            .upsert_course(&Course::new(empty_course, "Empty Seminar").unwrap())
            .await
            .unwrap();

        let due = fixed_now() - Duration::days(1);
        for id in 1..=4 {
            let due_at = (id < 4).then_some(due);
            let assignment = Assignment::new(
                AssignmentId::new(id),
                course,
                format!("HW{id}"),
                due_at,
                None,
            )
            .unwrap();
            storage
                .assignments
                .upsert_assignment(&assignment)
                .await
                .unwrap();
        }

        for c in [course, empty_course] {
            storage
                .enrollments
                .enroll(Enrollment::new(student, c))
                .await
                .unwrap();
        }

        Self {
            storage,
            student,
            outsider,
            instructor,
            course,
            empty_course,
        }
    }

    /// Adds and enrolls another student in "Web Basics".
    pub async fn add_student(&self, id: u64, name: &str) -> UserId {
        let user_id = UserId::new(id);
        let user = User::new(user_id, name, format!("{id}@example.com"), Role::Student).unwrap();
        self.storage.users.upsert_user(&user).await.unwrap();
        self.storage
            .enrollments
            .enroll(Enrollment::new(user_id, self.course))
            .await
            .unwrap();
        user_id
    }
}

/// Hands in assignment `id` two days before the fixed clock (on time).
pub(crate) async fn submit(fx: &Fixture, id: u64, user: UserId) {
    let at = fixed_now() - Duration::days(2);
    fx.storage
        .submissions
        .upsert_submission(&Submission::submitted(AssignmentId::new(id), user, at))
        .await
        .unwrap();
}

pub(crate) async fn grade(fx: &Fixture, id: u64, user: UserId, score: u32) {
    fx.storage
        .submissions
        .set_score(AssignmentId::new(id), user, score, fixed_now())
        .await
        .unwrap();
}
