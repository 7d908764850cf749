//! quorum/crates/services/src/lib.rs
//!
//! The caller-facing operation surface of the subsystem. Each service
//! orchestrates port traits from `domains`; the HTTP/routing collaborator
//! consumes these and nothing below them.

pub mod acceptance;
pub mod aggregates;
pub mod cache;
pub mod comments;
pub mod content;
pub mod events;
pub mod reactions;
pub mod sanitizer;
pub mod search;

pub use acceptance::AcceptanceService;
pub use aggregates::{AggregatePolicy, AggregateService};
pub use cache::CacheService;
pub use comments::{CommentPolicy, CommentService};
pub use content::ContentService;
pub use events::LogSink;
pub use reactions::ReactionService;
pub use search::SearchService;
