use parley_vocab::TranslationError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session actor has stopped")]
    ActorClosed,
    #[error(transparent)]
    Translation(#[from] TranslationError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
