mod clock;
pub use clock::*;

// store

mod credential_store;
mod revocation_cache;

pub use credential_store::*;
pub use revocation_cache::*;

// repo

mod user_repo;

pub use user_repo::*;
