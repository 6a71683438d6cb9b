mod auth_service_impl;
mod password_hasher_argon2;
mod token_codec_jwt;
mod token_config;
mod token_service_impl;

pub use auth_service_impl::*;
pub use password_hasher_argon2::*;
pub use token_codec_jwt::*;
pub use token_config::*;
pub use token_service_impl::*;
