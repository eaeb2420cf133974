//! Timeline service
//!
//! Paginated post listings and post submission.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::forms;
use crate::config::TimelineConfig;
use crate::data::{Database, Post};
use crate::error::AppError;

/// One page of a listing
///
/// Asking for the same page again re-runs the query, so a page can be
/// requested any number of times.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served
    pub page: i64,
    pub page_size: usize,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            next_page: self.next_page,
            prev_page: self.prev_page,
        }
    }
}

/// Resolved pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    page: i64,
    page_size: usize,
}

impl Window {
    /// Rows to ask for: one more than a page, to learn whether a next page
    /// exists.
    fn limit(&self) -> i64 {
        self.page_size as i64 + 1
    }

    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size as i64)
    }

    fn into_page<T>(self, mut rows: Vec<T>) -> Page<T> {
        let has_more = rows.len() > self.page_size;
        rows.truncate(self.page_size);

        Page {
            items: rows,
            page: self.page,
            page_size: self.page_size,
            next_page: has_more.then(|| self.page + 1),
            prev_page: (self.page > 1).then(|| self.page - 1),
        }
    }
}

/// Timeline service
pub struct TimelineService {
    db: Arc<Database>,
    config: TimelineConfig,
}

impl TimelineService {
    /// Create new timeline service
    pub fn new(db: Arc<Database>, config: TimelineConfig) -> Self {
        Self { db, config }
    }

    /// Clamp a requested page and page size
    ///
    /// Pages below 1 become 1. Missing sizes use the configured default, zero
    /// becomes 1 and anything above the configured maximum is capped.
    fn window(&self, page: Option<i64>, page_size: Option<usize>) -> Window {
        let page_size = page_size
            .unwrap_or(self.config.posts_per_page)
            .clamp(1, self.config.max_page_size.max(1));
        Window {
            page: page.unwrap_or(1).max(1),
            page_size,
        }
    }

    /// Home timeline
    ///
    /// Posts by the user and by everyone they follow, newest first. Each post
    /// appears once even when several followed users follow each other.
    pub async fn home_timeline(
        &self,
        user_id: i64,
        page: Option<i64>,
        page_size: Option<usize>,
    ) -> Result<Page<Post>, AppError> {
        let window = self.window(page, page_size);
        let rows = self
            .db
            .get_followed_posts(user_id, window.limit(), window.offset())
            .await?;
        Ok(window.into_page(rows))
    }

    /// Posts authored by one user
    pub async fn user_timeline(
        &self,
        user_id: i64,
        page: Option<i64>,
        page_size: Option<usize>,
    ) -> Result<Page<Post>, AppError> {
        let window = self.window(page, page_size);
        let rows = self
            .db
            .get_user_posts(user_id, window.limit(), window.offset())
            .await?;
        Ok(window.into_page(rows))
    }

    /// Every post (explore view)
    pub async fn global_timeline(
        &self,
        page: Option<i64>,
        page_size: Option<usize>,
    ) -> Result<Page<Post>, AppError> {
        let window = self.window(page, page_size);
        let rows = self
            .db
            .get_all_posts(window.limit(), window.offset())
            .await?;
        Ok(window.into_page(rows))
    }

    /// Submit a post
    ///
    /// # Errors
    /// `Validation` if the body is empty after trimming or too long
    pub async fn create_post(&self, author_id: i64, body: &str) -> Result<Post, AppError> {
        forms::ensure_valid(forms::validate_post(body))?;

        let post = self
            .db
            .insert_post(author_id, body.trim(), Utc::now())
            .await?;
        tracing::info!(post_id = post.id, user_id = author_id, "Post created");

        Ok(post)
    }
}
