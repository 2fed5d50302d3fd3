/*!
 * Core Types
 * Common types used across the pipe devices
 */

/// Size type for buffer operations
pub type Size = usize;

/// Major device number
pub type Major = u32;

/// Minor device number
pub type Minor = u32;

/// Unique identifier of an open pipe handle
pub type HandleId = u64;
