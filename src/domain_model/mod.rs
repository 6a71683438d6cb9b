mod credential;
mod token;
mod user;

pub use credential::*;
pub use token::*;
pub use user::*;
