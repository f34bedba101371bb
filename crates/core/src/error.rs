use thiserror::Error;

use crate::model::{AssignmentError, CourseError, UserError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
}
