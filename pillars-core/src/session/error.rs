use super::SessionState;

/// A rejected session operation. Always safe to show to the requester.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("already in the session")]
    AlreadyInSession,
    #[error("the session is full ({max} players)")]
    SessionFull { max: usize },
    #[error("not possible while the session is {actual}")]
    WrongState { actual: SessionState },
    #[error("not enough players to start ({have}/{need})")]
    BelowMinimum { have: usize, need: usize },
    #[error("not in the session")]
    NotInSession,
}
