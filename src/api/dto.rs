//! Response DTOs
//!
//! View data handed to presentation. No markup is built here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Post, User};
use crate::service::{FollowCounts, Page, avatar_reference};

/// Avatar size on profile pages
pub const PROFILE_AVATAR_SIZE: u32 = 128;
/// Avatar size next to posts
pub const POST_AVATAR_SIZE: u32 = 36;

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub about_me: Option<String>,
    pub avatar: String,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            about_me: user.about_me.clone(),
            avatar: avatar_reference(&user.email, PROFILE_AVATAR_SIZE),
            last_seen: user.last_seen,
            created_at: user.created_at,
            url: user_path(&user.username),
        }
    }
}

/// A post as shown in a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub author_url: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        let author_url = user_path(&post.author);
        Self {
            id: post.id,
            body: post.body,
            timestamp: post.timestamp,
            author: post.author,
            author_url,
        }
    }
}

/// A page of results with ready-to-follow cursor links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: usize,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub next_url: Option<String>,
    pub prev_url: Option<String>,
}

impl<T> PageResponse<T> {
    /// Build from a service page, linking cursors relative to `path`
    pub fn from_page<U>(page: Page<U>, path: &str) -> Self
    where
        T: From<U>,
    {
        let link = |n: i64| format!("{path}?page={n}");
        let page = page.map(T::from);
        Self {
            next_url: page.next_page.map(link),
            prev_url: page.prev_page.map(link),
            items: page.items,
            page: page.page,
            page_size: page.page_size,
            next_page: page.next_page,
            prev_page: page.prev_page,
        }
    }
}

/// Profile page: the user, their graph counts and their posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub followers_count: i64,
    pub following_count: i64,
    /// Whether the viewer follows this user
    pub is_following: bool,
    /// Whether the viewer is this user
    pub is_self: bool,
    pub posts: PageResponse<PostResponse>,
}

impl ProfileResponse {
    pub fn new(
        user: &User,
        counts: FollowCounts,
        is_following: bool,
        is_self: bool,
        posts: PageResponse<PostResponse>,
    ) -> Self {
        Self {
            user: UserResponse::from(user),
            followers_count: counts.followers,
            following_count: counts.following,
            is_following,
            is_self,
            posts,
        }
    }
}

/// Current values for the profile edit form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditProfileResponse {
    pub username: String,
    pub about_me: Option<String>,
}

/// Returned on login alongside the session cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub redirect_to: String,
    pub expires_at: i64,
}

/// Plain confirmation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn user_path(username: &str) -> String {
    format!("/user/{}", urlencoding::encode(username))
}
