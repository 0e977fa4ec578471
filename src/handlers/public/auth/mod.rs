pub mod login;   // POST /all/user/login
pub mod refresh; // POST /all/user/refresh

pub use login::login_post;
pub use refresh::refresh_post;

use crate::auth::SessionError;
use crate::error::ApiError;

fn session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::Rejected(reason) => {
            tracing::debug!("Refresh rejected: {}", reason);
            ApiError::unauthenticated()
        }
        SessionError::Signing(reason) => {
            tracing::error!("Token signing failed: {}", reason);
            ApiError::internal_server_error("Server error")
        }
    }
}
