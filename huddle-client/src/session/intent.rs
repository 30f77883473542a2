use crate::error::SessionError;
use crate::session::TeardownReport;
use tokio::sync::oneshot;

/// Requests from the UI to the session controller task.
#[derive(Debug)]
pub enum Intent {
    ToggleCamera {
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    ToggleMic {
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    ToggleScreenShare {
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    SendChat {
        content: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave {
        reply: oneshot::Sender<TeardownReport>,
    },
}
