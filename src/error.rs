#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("An actor with this email is already registered")]
    AlreadyRegistered,
    #[error("Licence key is not present in the valid licence set")]
    InvalidLicence,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Credential verification failed")]
    InvalidCredential,
    #[error("Listing has already been claimed")]
    AlreadyClaimed,
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Storage unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

// Storage and codec failures are infrastructure problems, never business
// outcomes. They all surface as StoreUnavailable with the cause attached.
impl From<sled::Error> for DomainError {
    fn from(err: sled::Error) -> Self {
        DomainError::StoreUnavailable(err.into())
    }
}

impl From<minicbor::decode::Error> for DomainError {
    fn from(err: minicbor::decode::Error) -> Self {
        DomainError::StoreUnavailable(err.into())
    }
}

impl<E> From<minicbor::encode::Error<E>> for DomainError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: minicbor::encode::Error<E>) -> Self {
        DomainError::StoreUnavailable(err.into())
    }
}
