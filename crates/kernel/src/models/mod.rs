//! Content models.

pub mod blog_post;
pub mod page_config;
pub mod text_content;

pub use blog_post::{BlogPost, BlogPostFilter, BlogPostPatch, NewBlogPost, UNKNOWN_AUTHOR};
pub use page_config::{NewPageConfig, PageConfig, PageConfigPatch};
pub use text_content::{NewTextContent, TextContent, TextContentPatch};

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, the precision PostgreSQL stores.
///
/// Both storage backends stamp records with this so a saved entity compares
/// equal to the same entity read back.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
