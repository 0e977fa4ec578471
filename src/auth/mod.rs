pub mod claims;
pub mod session;
pub mod token;

pub use claims::{Claims, Principal, Role, TokenKind};
pub use session::{issue_session, refresh_session, SessionError, TokenPair};
pub use token::{Clock, ManualClock, SystemClock, TokenCodec, TokenError, TokenSettings};
