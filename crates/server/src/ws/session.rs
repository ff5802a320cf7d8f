use crate::error::{ChatError, ChatResult};
use crate::middleware::auth::bearer_token;
use crate::models::{AuthUser, Identity};

use super::frame::Frame;

/// Header stamped on every admitted frame with the bound user id.
pub const USER_ID_HEADER: &str = "user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Connect,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Other(String),
}

impl From<&str> for ClientCommand {
    fn from(raw: &str) -> Self {
        match raw {
            "CONNECT" | "STOMP" => ClientCommand::Connect,
            "SEND" => ClientCommand::Send,
            "SUBSCRIBE" => ClientCommand::Subscribe,
            "UNSUBSCRIBE" => ClientCommand::Unsubscribe,
            "DISCONNECT" => ClientCommand::Disconnect,
            other => ClientCommand::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(AuthUser),
    Terminated,
}

#[derive(Debug)]
pub enum Admitted {
    Connect {
        credential: Option<String>,
    },
    Frame {
        command: ClientCommand,
        frame: Frame,
        user: AuthUser,
    },
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    pub fn terminate(&mut self) -> Option<AuthUser> {
        match std::mem::replace(&mut self.state, SessionState::Terminated) {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn admit(&mut self, mut frame: Frame) -> ChatResult<Admitted> {
        let command = ClientCommand::from(frame.command.as_str());
        let bound = match &self.state {
            SessionState::Terminated => {
                return Err(ChatError::AuthenticationFailed("Session is closed".into()));
            }
            SessionState::Unauthenticated => None,
            SessionState::Authenticated(user) => Some(user.clone()),
        };

        match (bound, command) {
            (_, ClientCommand::Other(name)) => Err(ChatError::UnsupportedOperation(format!(
                "Unsupported command: {name}"
            ))),
            (None, ClientCommand::Connect) => Ok(Admitted::Connect {
                credential: bearer_credential(&frame),
            }),
            (Some(_), ClientCommand::Connect) => Err(ChatError::UnsupportedOperation(
                "Session is already connected".into(),
            )),
            (None, _) => {
                self.state = SessionState::Terminated;
                Err(ChatError::AuthenticationFailed(
                    "CONNECT with a bearer token first".into(),
                ))
            }
            (Some(user), command) => {
                frame.set(USER_ID_HEADER, user.id.clone());
                Ok(Admitted::Frame {
                    command,
                    frame,
                    user,
                })
            }
        }
    }

    pub fn bind(&mut self, identity: Identity) -> ChatResult<AuthUser> {
        match identity {
            Identity::Authenticated(user) if self.state == SessionState::Unauthenticated => {
                self.state = SessionState::Authenticated(user.clone());
                Ok(user)
            }
            Identity::Authenticated(_) => Err(ChatError::UnsupportedOperation(
                "Session is already connected".into(),
            )),
            Identity::Unauthenticated => {
                self.state = SessionState::Terminated;
                Err(ChatError::AuthenticationFailed(
                    "Invalid or expired token".into(),
                ))
            }
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header, name matched
/// case-insensitively.
pub fn bearer_credential(frame: &Frame) -> Option<String> {
    frame
        .get_ignore_case("authorization")
        .and_then(bearer_token)
        .map(str::to_string)
}
