mod assignment;
mod course;
mod ids;
mod submission;
mod user;

pub use ids::{AssignmentId, CourseId, ParseIdError, SubmissionId, UserId};

pub use assignment::{
    Assignment, AssignmentError, DEFAULT_TOTAL_SCORE, effective_total_score,
};
pub use course::{Course, CourseError, Enrollment};
pub use submission::{Submission, is_late};
pub use user::{Role, User, UserError};
