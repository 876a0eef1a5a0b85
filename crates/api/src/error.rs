use signage_core::error::CoreError;
use signage_core::store::StoreError;

/// Why an inbound message was dropped before reaching a handler.
///
/// Never reported back to the sender.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The token is deliberately not part of the error.
    #[error("Invalid request token")]
    InvalidToken,

    #[error("Message carries no command")]
    MissingCommand,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
}

/// Failure inside a command handler.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Outcome of a dispatch that did not complete normally.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Command '{command}' failed: {source}")]
    Command {
        command: String,
        #[source]
        source: CommandError,
    },
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
