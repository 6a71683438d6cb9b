mod purge_worker;
mod server;

pub use purge_worker::*;
pub use server::*;
