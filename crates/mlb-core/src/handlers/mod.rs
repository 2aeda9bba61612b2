//! Command handlers, grouped by what they touch on the remote service.
//!
//! Every handler is an `impl Bot` method returning `Result<Vec<Reply>>`;
//! [`crate::bot::Bot::handle`] turns errors into replies.

mod lists;
mod membership;
mod moderation;

pub use lists::partition_lists;
