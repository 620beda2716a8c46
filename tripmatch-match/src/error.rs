use tripmatch_core::matching::MatchStatus;
use tripmatch_core::trip::TripValidationError;
use tripmatch_core::{CoreError, HostId};

/// Coarse classification used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    State,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum TravelError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("languages must be an array of strings")]
    LanguagesType,

    #[error("Only approved hosts can create trips")]
    HostNotApproved,

    #[error("Host not found: {0}")]
    HostNotFound(HostId),

    // NotOwner and NotAuthorized share a message so a caller cannot tell
    // someone else's trip from a missing one
    #[error("Not authorized")]
    NotOwner,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Cannot match a trip with itself")]
    SelfMatch,

    #[error("Match already exists")]
    DuplicateMatch,

    #[error("Trip not found")]
    TripNotFound,

    #[error("Match not found")]
    MatchNotFound,

    #[error("Cannot {action} a match that is {from}")]
    InvalidTransition { from: MatchStatus, action: &'static str },

    #[error("{entity} {id} is already cancelled")]
    AlreadyCancelled { entity: &'static str, id: i64 },

    #[error(transparent)]
    Storage(#[from] CoreError),
}

impl TravelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TravelError::Validation(_) | TravelError::LanguagesType => ErrorKind::Validation,
            TravelError::HostNotApproved | TravelError::NotOwner | TravelError::NotAuthorized => {
                ErrorKind::Authorization
            }
            TravelError::SelfMatch
            | TravelError::DuplicateMatch
            | TravelError::InvalidTransition { .. }
            | TravelError::AlreadyCancelled { .. } => ErrorKind::State,
            TravelError::HostNotFound(_) | TravelError::TripNotFound | TravelError::MatchNotFound => {
                ErrorKind::NotFound
            }
            TravelError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<TripValidationError> for TravelError {
    fn from(err: TripValidationError) -> Self {
        match err {
            TripValidationError::LanguagesType => TravelError::LanguagesType,
            other => TravelError::Validation(other.to_string()),
        }
    }
}

pub type TravelResult<T> = Result<T, TravelError>;
