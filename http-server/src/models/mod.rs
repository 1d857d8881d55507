mod session;
mod user;

pub use session::SessionStore;
pub use user::AuthenticatedUser;
