//! Storage and caller-memory abstractions for the device
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Device (coordination layer)        │
//! │  - one lock, two acquisition modes  │
//! │  - open count, sessions, signals    │
//! └─────────────────────────────────────┘
//!          ▲                   ▲
//!          │ guards            │ copies through
//!          ▼                   ▼
//! ┌───────────────────┐ ┌───────────────────┐
//! │  FixedBuffer      │ │  UserSink /       │
//! │  - payload + len  │ │  UserSource       │
//! │  - terminator     │ │  - may fault      │
//! └───────────────────┘ └───────────────────┘
//! ```

pub mod buffer;
pub mod user;

pub use buffer::FixedBuffer;
pub use user::{IoSink, IoSource, UserSink, UserSource};
