//! # Backend Database
//!
//! The process-wide [`Engine`] (a connection pool built once from the
//! connection URI) and the scoped [`Session`]s handed out per unit of work.
//!
//! Sessions never auto-commit. Whatever happens to the caller, a session is
//! closed exactly once and its connection goes back to the pool.

pub mod engine;
pub mod error;
pub mod session;


pub use engine::{Engine, EngineOptions, EngineStats, SessionSource, build_engine, with_session};
pub use error::DbError;
pub use session::{Session, SessionState};
