//! Outbound publishing targets.
//!
//! - [`wordpress`]: WordPress REST API posts
//! - [`social`]: Ayrshare-compatible social posting

pub mod social;
pub mod wordpress;

pub use social::{AyrshareClient, SocialPost, SocialPostResult, SocialPublisher};
pub use wordpress::{PublishedPost, WordPressClient, WordPressPost, WordPressPublisher};
