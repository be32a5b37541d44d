pub mod cache;
pub mod retry;
pub mod spnego;

pub use cache::{KerberosCache, ProcessRunner, TokioProcessRunner};
