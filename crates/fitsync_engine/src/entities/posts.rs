//! Posts, likes, comments and shares.

use super::{filtered, record_id, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{CacheRule, ListPosition, QueryKey};
use fitsync_protocol::model::{Comment, NewPost, Page, Post, PostUpdate};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub(crate) const POSTS: Collections = Collections::new(EntityKind::Post, &["feed", "user"]);

/// Feed filter. The default is the first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFilter {
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl FeedFilter {
    /// Filter for one page.
    pub fn page(page: u32) -> Self {
        // page 1 and no page are the same list
        Self {
            page: (page > 1).then_some(page),
        }
    }
}

/// `posts/feed/<filter>`
pub fn feed_key(filter: &FeedFilter) -> SyncResult<QueryKey> {
    filtered(POSTS.key("feed"), filter)
}

/// `posts/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    POSTS.detail(id)
}

/// `posts/user/<id>`
pub fn user_posts_key(user: &EntityId) -> QueryKey {
    POSTS.key("user").id(user)
}

/// `posts/detail/<id>/comments`
pub fn comments_key(post: &EntityId) -> QueryKey {
    POSTS.sub(post, "comments")
}

fn author_of(record: &serde_json::Value) -> SyncResult<EntityId> {
    record_id(&record["user"])
}

/// Rules placing a new post at the head of the first feed page and of its
/// author's list.
fn publish(record: &serde_json::Value) -> SyncResult<Vec<CacheRule>> {
    let head = feed_key(&FeedFilter::default())?;
    let mut rules = POSTS.insert(head.exact(), ListPosition::Head, record)?;
    rules.push(CacheRule::prepend(
        user_posts_key(&author_of(record)?).exact(),
        record.clone(),
    ));
    Ok(rules)
}

/// Reads and writes on posts.
pub struct Posts<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Posts handle.
    pub fn posts(&self) -> Posts<'_, T> {
        Posts { sync: self }
    }
}

impl<T: ApiTransport> Posts<'_, T> {
    /// One page of the feed.
    pub async fn feed(&self, filter: &FeedFilter) -> SyncResult<Page<Post>> {
        let query = ReadQuery::new(
            feed_key(filter)?,
            ApiRequest::get("/posts/feed/").with_query_from(filter)?,
        );
        self.sync.read_as(&query).await
    }

    /// A single post.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<Post> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/posts/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Posts written by `user`.
    pub async fn user_posts(&self, user: &EntityId) -> SyncResult<Vec<Post>> {
        let query = ReadQuery::new(
            user_posts_key(user),
            ApiRequest::get(format!("/posts/user/{user}/")),
        );
        self.sync.read_as(&query).await
    }

    /// Comments on a post, oldest first.
    pub async fn comments(&self, post: &EntityId) -> SyncResult<Vec<Comment>> {
        let query = ReadQuery::new(
            comments_key(post),
            ApiRequest::get(format!("/posts/{post}/comments/")),
        );
        self.sync.read_as(&query).await
    }

    /// Publishes a post. A post carrying both a program and a log is
    /// refused before any call.
    pub async fn create(&self, post: &NewPost) -> SyncResult<Post> {
        post.validate()?;
        let mutation = Mutation::confirm(ApiRequest::post("/posts/").with_body(post)?)
            .touching(EntityKind::Post)
            .reconcile(|record, _| publish(record))
            .cascade(Trigger::PostCreated);
        self.sync.write_as(mutation).await
    }

    /// Edits a post's text or image.
    pub async fn update(&self, id: &EntityId, update: &PostUpdate) -> SyncResult<Post> {
        let mutation = Mutation::confirm(ApiRequest::patch(format!("/posts/{id}/")).with_body(update)?)
            .touching(EntityKind::Post)
            .reconcile(|record, _| POSTS.upsert(record));
        self.sync.write_as(mutation).await
    }

    /// Deletes a post.
    pub async fn delete(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(ApiRequest::delete(format!("/posts/{id}/")), move |_| {
            Ok(POSTS.remove(&target))
        })
        .touching(EntityKind::Post)
        .cascade(Trigger::PostDeleted);
        self.sync.write(mutation).await.map(drop)
    }

    /// Likes a post.
    pub async fn like(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        self.set_liked(id, true).await
    }

    /// Removes a like.
    pub async fn unlike(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        self.set_liked(id, false).await
    }

    async fn set_liked(&self, id: &EntityId, liked: bool) -> SyncResult<serde_json::Value> {
        let path = format!("/posts/{id}/like/");
        let request = if liked {
            ApiRequest::post(path)
        } else {
            ApiRequest::delete(path)
        };
        let target = id.clone();
        let confirmed = id.clone();
        let mutation = Mutation::optimistic(request, move |cache| {
            POSTS.edit::<Post, _>(cache, &target, |post| {
                post.toggle_like(liked);
                Ok(())
            })
        })
        .touching(EntityKind::Post)
        .reconcile(move |response, cache| {
            // some deployments answer with the updated post, others with a status
            if EntityId::of_record(response).as_ref() == Some(&confirmed) {
                Ok(POSTS.replace_cached(cache, &confirmed, response.clone()))
            } else {
                Ok(Vec::new())
            }
        });
        self.sync.write(mutation).await
    }

    /// Adds a comment.
    pub async fn add_comment(&self, post: &EntityId, content: &str) -> SyncResult<Comment> {
        let target = post.clone();
        let mutation = Mutation::confirm(
            ApiRequest::post(format!("/posts/{post}/comments/"))
                .with_json(json!({"content": content})),
        )
        .touching(EntityKind::Post)
        .reconcile(move |record, cache| {
            let comment: Comment = serde_json::from_value(record.clone())?;
            let mut rules = vec![CacheRule::append(
                comments_key(&target).exact(),
                record.clone(),
            )];
            rules.extend(POSTS.edit::<Post, _>(cache, &target, |post| {
                post.comments.push(comment);
                post.comments_count += 1;
                Ok(())
            })?);
            Ok(rules)
        });
        self.sync.write_as(mutation).await
    }

    /// Deletes a comment.
    pub async fn delete_comment(&self, post: &EntityId, comment: &EntityId) -> SyncResult<()> {
        let target = post.clone();
        let gone = comment.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::delete(format!("/posts/{post}/comments/{comment}/")),
            move |cache| {
                let comments = comments_key(&target);
                let listed = cache.find_record(&comments.exact(), &gone).is_some();
                let mut rules = vec![CacheRule::remove(comments.exact(), gone.clone())];
                rules.extend(POSTS.edit::<Post, _>(cache, &target, |post| {
                    let before = post.comments.len();
                    post.comments.retain(|c| c.id != gone);
                    if listed || post.comments.len() < before {
                        post.comments_count = post.comments_count.saturating_sub(1);
                    }
                    Ok(())
                })?);
                Ok(rules)
            },
        )
        .touching(EntityKind::Post);
        self.sync.write(mutation).await.map(drop)
    }

    /// Shares a post to the current user's followers.
    pub async fn share(&self, id: &EntityId, content: Option<&str>) -> SyncResult<Post> {
        let original = id.clone();
        let mutation = Mutation::confirm(
            ApiRequest::post(format!("/posts/{id}/share/"))
                .with_json(json!({"content": content.unwrap_or_default()})),
        )
        .touching(EntityKind::Post)
        .reconcile(move |record, cache| {
            let mut rules = POSTS.edit::<Post, _>(cache, &original, |post| {
                post.shares_count += 1;
                Ok(())
            })?;
            rules.extend(publish(record)?);
            Ok(rules)
        })
        .cascade(Trigger::PostShared);
        self.sync.write_as(mutation).await
    }
}
