//! Conversions from form errors into [`ServiceError`].

use crate::forms::posts::PostFormError;
use crate::services::ServiceError;

impl From<PostFormError> for ServiceError {
    fn from(val: PostFormError) -> Self {
        match val {
            PostFormError::Validation(errors) => ServiceError::Validation(errors),
            PostFormError::TypeConstraint(message) => ServiceError::Form(message),
        }
    }
}
