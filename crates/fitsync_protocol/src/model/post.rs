//! Posts, comments and shares.

use super::log::WorkoutLog;
use super::program::Program;
use super::user::UserSummary;
use crate::error::{ModelError, ModelResult};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id.
    pub id: EntityId,
    /// Author.
    pub user: UserSummary,
    /// Text.
    pub content: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A feed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Post id.
    pub id: EntityId,
    /// Author.
    pub user: UserSummary,
    /// Text.
    #[serde(default)]
    pub content: String,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Attached program snapshot.
    #[serde(default)]
    pub program: Option<Box<Program>>,
    /// Attached workout log snapshot.
    #[serde(default)]
    pub workout_log: Option<Box<WorkoutLog>>,
    /// Number of likes.
    #[serde(default)]
    pub likes_count: u64,
    /// Whether the viewer likes this post.
    #[serde(default)]
    pub is_liked: bool,
    /// Comments, oldest first.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Number of comments.
    #[serde(default)]
    pub comments_count: u64,
    /// Number of shares of this post.
    #[serde(default)]
    pub shares_count: u64,
    /// Whether this post re-shares another.
    #[serde(default)]
    pub is_share: bool,
    /// The shared post, when `is_share` is set.
    #[serde(default)]
    pub original_post: Option<Box<Post>>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What a post carries besides its text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostAttachment<'a> {
    /// Nothing.
    None,
    /// A program snapshot.
    Program(&'a Program),
    /// A workout log snapshot.
    WorkoutLog(&'a WorkoutLog),
}

impl Post {
    /// The single attachment, or an error if both are set.
    pub fn attachment(&self) -> ModelResult<PostAttachment<'_>> {
        match (&self.program, &self.workout_log) {
            (Some(_), Some(_)) => Err(ModelError::AttachmentConflict),
            (Some(p), None) => Ok(PostAttachment::Program(p)),
            (None, Some(l)) => Ok(PostAttachment::WorkoutLog(l)),
            (None, None) => Ok(PostAttachment::None),
        }
    }

    /// Flips the viewer's like, keeping `likes_count` in step.
    pub fn toggle_like(&mut self, liked: bool) {
        if self.is_liked == liked {
            return;
        }
        self.is_liked = liked;
        self.likes_count = if liked {
            self.likes_count.saturating_add(1)
        } else {
            self.likes_count.saturating_sub(1)
        };
    }
}

/// Payload for creating a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    /// Text.
    pub content: String,
    /// Program to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<EntityId>,
    /// Workout log to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_log_id: Option<EntityId>,
    /// Image URL, already uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl NewPost {
    /// Text-only post.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attaches a program.
    pub fn with_program(mut self, id: impl Into<EntityId>) -> Self {
        self.program_id = Some(id.into());
        self
    }

    /// Attaches a workout log.
    pub fn with_workout_log(mut self, id: impl Into<EntityId>) -> Self {
        self.workout_log_id = Some(id.into());
        self
    }

    /// Rejects posts attaching both a program and a log.
    pub fn validate(&self) -> ModelResult<()> {
        if self.program_id.is_some() && self.workout_log_id.is_some() {
            return Err(ModelError::AttachmentConflict);
        }
        Ok(())
    }
}

/// Partial post update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostUpdate {
    /// New text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
