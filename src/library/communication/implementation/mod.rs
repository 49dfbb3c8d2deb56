//! Implementations of the [`Transport`](super::Transport) trait

pub mod memory;
pub mod redis;
