//! Process-local adapters. Back the `memory` backends and every test.

mod clock_manual;
mod credential_store_memory;
mod revocation_cache_memory;
mod user_repo_memory;

pub use clock_manual::*;
pub use credential_store_memory::*;
pub use revocation_cache_memory::*;
pub use user_repo_memory::*;
