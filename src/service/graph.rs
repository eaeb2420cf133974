//! Social graph
//!
//! Directed follow edges between users.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, User};
use crate::error::AppError;

/// Follow counts for a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

/// Social graph service
pub struct GraphService {
    db: Arc<Database>,
}

impl GraphService {
    /// Create new graph service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Make `follower_id` follow `followed_id`
    ///
    /// Following someone twice is a no-op.
    ///
    /// # Errors
    /// `SelfFollowRejected` if both ids are the same
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
        if follower_id == followed_id {
            return Err(AppError::SelfFollowRejected);
        }

        if self
            .db
            .insert_follow(follower_id, followed_id, Utc::now())
            .await?
        {
            tracing::info!(follower_id, followed_id, "Follow created");
        }
        Ok(())
    }

    /// Remove the edge if present
    ///
    /// A self edge never exists, so unfollowing yourself is a no-op too.
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
        if self.db.delete_follow(follower_id, followed_id).await? {
            tracing::info!(follower_id, followed_id, "Follow removed");
        }
        Ok(())
    }

    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        self.db.is_following(follower_id, followed_id).await
    }

    pub async fn followers_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.db.count_followers(user_id).await
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.db.count_following(user_id).await
    }

    pub async fn counts(&self, user_id: i64) -> Result<FollowCounts, AppError> {
        Ok(FollowCounts {
            followers: self.followers_count(user_id).await?,
            following: self.following_count(user_id).await?,
        })
    }

    async fn resolve(&self, username: &str) -> Result<User, AppError> {
        self.db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Follow by username
    ///
    /// # Returns
    /// The followed user
    pub async fn follow_username(&self, follower: &User, username: &str) -> Result<User, AppError> {
        let target = self.resolve(username).await?;
        self.follow(follower.id, target.id).await?;
        Ok(target)
    }

    /// Unfollow by username
    ///
    /// # Returns
    /// The unfollowed user
    pub async fn unfollow_username(
        &self,
        follower: &User,
        username: &str,
    ) -> Result<User, AppError> {
        let target = self.resolve(username).await?;
        self.unfollow(follower.id, target.id).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NewUser;
    use tempfile::TempDir;

    async fn setup() -> (GraphService, Vec<User>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("graph.db"))
                .await
                .unwrap(),
        );

        let mut users = Vec::new();
        for name in ["alice", "bob", "carol"] {
            users.push(
                db.insert_user(
                    &NewUser {
                        username: name.to_string(),
                        email: format!("{name}@example.com"),
                        password_hash: "hash".to_string(),
                    },
                    Utc::now(),
                )
                .await
                .unwrap(),
            );
        }

        (GraphService::new(db), users, temp_dir)
    }

    #[tokio::test]
    async fn follow_unfollow_roundtrip() {
        let (graph, users, _dir) = setup().await;
        let (alice, bob) = (&users[0], &users[1]);

        graph.follow(alice.id, bob.id).await.unwrap();
        assert!(graph.is_following(alice.id, bob.id).await.unwrap());
        assert!(!graph.is_following(bob.id, alice.id).await.unwrap());

        graph.unfollow(alice.id, bob.id).await.unwrap();
        assert!(!graph.is_following(alice.id, bob.id).await.unwrap());

        // Absent edge
        graph.unfollow(alice.id, bob.id).await.unwrap();
    }

    #[tokio::test]
    async fn double_follow_is_idempotent() {
        let (graph, users, _dir) = setup().await;
        let (alice, bob) = (&users[0], &users[1]);

        graph.follow(alice.id, bob.id).await.unwrap();
        graph.follow(alice.id, bob.id).await.unwrap();

        assert_eq!(graph.followers_count(bob.id).await.unwrap(), 1);
        assert_eq!(graph.following_count(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let (graph, users, _dir) = setup().await;
        let alice = &users[0];

        assert!(matches!(
            graph.follow(alice.id, alice.id).await.unwrap_err(),
            AppError::SelfFollowRejected
        ));
        assert!(!graph.is_following(alice.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_noop() {
        let (graph, users, _dir) = setup().await;
        let (alice, bob) = (&users[0], &users[1]);

        graph.unfollow(alice.id, bob.id).await.unwrap();
        graph.unfollow(alice.id, alice.id).await.unwrap();

        assert!(!graph.is_following(alice.id, alice.id).await.unwrap());
        assert_eq!(graph.following_count(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counts_reflect_edges() {
        let (graph, users, _dir) = setup().await;
        let (alice, bob, carol) = (&users[0], &users[1], &users[2]);

        graph.follow(alice.id, carol.id).await.unwrap();
        graph.follow(bob.id, carol.id).await.unwrap();
        graph.follow(carol.id, alice.id).await.unwrap();

        assert_eq!(
            graph.counts(carol.id).await.unwrap(),
            FollowCounts {
                followers: 2,
                following: 1
            }
        );
    }

    #[tokio::test]
    async fn username_variants_resolve_or_fail() {
        let (graph, users, _dir) = setup().await;
        let alice = &users[0];

        let bob = graph.follow_username(alice, "bob").await.unwrap();
        assert!(graph.is_following(alice.id, bob.id).await.unwrap());

        assert!(matches!(
            graph.follow_username(alice, "nobody").await.unwrap_err(),
            AppError::NotFound
        ));
        assert!(matches!(
            graph.unfollow_username(alice, "nobody").await.unwrap_err(),
            AppError::NotFound
        ));
    }
}
