use crate::{api::Error as ApiError, StoreError, ValidationError};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Api(ApiError::Unauthorized))
    }
}
