//! Gmail API module split into logical submodules
//!
//! - auth: OAuth2 token lifecycle (cache, refresh, interactive consent)
//! - token: the persisted token format
//! - operations: the send call

pub mod auth;
pub mod operations;
pub mod token;

pub use auth::{CredentialManager, GoogleOAuthFlow, OAuthFlow, GMAIL_SEND_SCOPE};
pub use operations::{AuthorizedClient, MailTransport, ME};
pub use token::StoredToken;

// Re-export mocks for tests in sibling modules
#[cfg(test)]
pub use auth::MockOAuthFlow;
#[cfg(test)]
pub use operations::MockMailTransport;
