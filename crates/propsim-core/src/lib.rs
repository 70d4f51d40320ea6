pub mod error;
pub mod mortgage;
pub mod types;

#[cfg(feature = "property")]
pub mod property;

#[cfg(feature = "payoff")]
pub mod debt;

#[cfg(feature = "payoff")]
pub mod payoff;

pub use error::EngineError;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
