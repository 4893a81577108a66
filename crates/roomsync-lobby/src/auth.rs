//! Authentication hook for the handshake.
//!
//! roomsync doesn't issue or validate credentials itself. The server calls
//! an [`Authenticator`] with whatever token the client sent in its
//! handshake and uses the returned [`UserId`] for every later request on
//! that connection.

use std::future::Future;

use roomsync_protocol::UserId;

use crate::LobbyError;

/// Validates a client's token and returns who they are.
///
/// # Example
///
/// ```rust
/// use roomsync_lobby::{Authenticator, LobbyError};
/// use roomsync_protocol::UserId;
///
/// /// Accepts numeric tokens as user ids. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserId, LobbyError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| LobbyError::Unauthorized("token must be a number".into()))?;
///         Ok(UserId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the user behind `token`, or [`LobbyError::Unauthorized`].
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserId, LobbyError>> + Send;
}
