//! Role module implementations
//!
//! The shell and bootstrapper are policy-free; everything a role actually
//! does lives in a [`crate::unit::UnitModule`] implementation under this
//! module. The mock modules stand in for the real engine: they move real
//! items through the real queues and channels, with trivial evaluation.

pub mod mock;
