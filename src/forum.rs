//! The public forum: top-level posts with comments and votes.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::authorship::AuthorView;
use crate::error::{AppError, AppResult};
use crate::store::{Db, VoteTarget};
use crate::validate;
use crate::voting::{self, VoteTally, VoteValue};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    New,
    Top,
}

impl FromStr for PostSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(PostSort::New),
            "top" => Ok(PostSort::Top),
            other => Err(format!("unknown sort '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub body: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: AuthorView,
    pub votes: VoteTally,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub body: String,
    pub author: AuthorView,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

fn load_post(db: &Db, post_id: &str) -> AppResult<ForumPost> {
    db.find_post(post_id)?
        .ok_or_else(|| AppError::not_found("post"))
}

fn post_views(db: &Db, posts: Vec<ForumPost>, viewer: Option<&User>) -> AppResult<Vec<PostView>> {
    let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
    let users = db.users_by_ids(&author_ids)?;
    let counts = db.comment_counts(&ids)?;
    let votes = db.votes_for(VoteTarget::Post, &ids)?;
    let totals = voting::tally(&votes, viewer.map(|v| v.id.as_str()));

    Ok(posts
        .into_iter()
        .map(|post| PostView {
            author: AuthorView::present(&post.author_id, users.get(&post.author_id), post.anonymous, viewer),
            votes: voting::tally_for(&totals, &post.id),
            comment_count: counts.get(&post.id).copied().unwrap_or(0),
            id: post.id,
            title: post.title,
            body: post.body,
            created_at: post.created_at,
            edited_at: post.edited_at,
        })
        .collect())
}

/// Newest first, or highest score first (newest breaks ties).
pub fn sort_posts(posts: &mut [PostView], sort: PostSort) {
    match sort {
        PostSort::New => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        PostSort::Top => posts.sort_by(|a, b| {
            b.votes
                .score
                .cmp(&a.votes.score)
                .then(b.created_at.cmp(&a.created_at))
        }),
    }
}

pub fn list_posts(db: &Db, sort: PostSort, viewer: Option<&User>) -> AppResult<Vec<PostView>> {
    let mut views = post_views(db, db.list_posts()?, viewer)?;
    sort_posts(&mut views, sort);
    Ok(views)
}

pub fn create_post(db: &Db, author: &User, input: NewPost) -> AppResult<ForumPost> {
    let post = ForumPost {
        id: Uuid::new_v4().to_string(),
        author_id: author.id.clone(),
        title: validate::title(&input.title)?,
        body: validate::body(&input.body)?,
        anonymous: input.anonymous,
        created_at: Utc::now(),
        edited_at: None,
    };
    db.insert_post(&post)?;
    Ok(post)
}

pub fn post_detail(db: &Db, post_id: &str, viewer: Option<&User>) -> AppResult<PostDetail> {
    let post = load_post(db, post_id)?;
    let comments = db.list_comments(post_id)?;
    let author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
    let users: HashMap<String, User> = db.users_by_ids(&author_ids)?;

    let mut views = post_views(db, vec![post], viewer)?;
    let post = views
        .pop()
        .ok_or_else(|| AppError::Internal("post view missing".into()))?;
    let comments = comments
        .into_iter()
        .map(|c| CommentView {
            author: AuthorView::present(&c.author_id, users.get(&c.author_id), c.anonymous, viewer),
            id: c.id,
            body: c.body,
            created_at: c.created_at,
        })
        .collect();
    Ok(PostDetail { post, comments })
}

pub fn update_post(db: &Db, actor: &User, post_id: &str, update: PostUpdate) -> AppResult<ForumPost> {
    let mut post = load_post(db, post_id)?;
    if post.author_id != actor.id {
        return Err(AppError::forbidden("only the author can edit this post"));
    }
    if let Some(title) = update.title {
        post.title = validate::title(&title)?;
    }
    if let Some(body) = update.body {
        post.body = validate::body(&body)?;
    }
    post.edited_at = Some(Utc::now());
    db.update_post(&post)?;
    Ok(post)
}

pub fn delete_post(db: &Db, actor: &User, post_id: &str) -> AppResult<()> {
    let post = load_post(db, post_id)?;
    if post.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::forbidden("only the author or an admin can delete this post"));
    }
    db.delete_post(post_id)?;
    tracing::info!(post_id, actor = %actor.id, "forum post deleted");
    Ok(())
}

pub fn vote_post(db: &Db, voter: &User, post_id: &str, value: VoteValue) -> AppResult<VoteTally> {
    let post = load_post(db, post_id)?;
    if post.author_id == voter.id {
        return Err(AppError::validation("you cannot vote on your own post"));
    }
    let existing = db.current_vote(VoteTarget::Post, post_id, &voter.id)?;
    db.apply_vote(VoteTarget::Post, post_id, &voter.id, voting::resolve(existing, value))?;

    let votes = db.votes_for(VoteTarget::Post, &[post_id.to_string()])?;
    Ok(voting::tally_for(&voting::tally(&votes, Some(&voter.id)), post_id))
}

pub fn create_comment(db: &Db, author: &User, post_id: &str, input: NewComment) -> AppResult<Comment> {
    load_post(db, post_id)?;
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.to_string(),
        author_id: author.id.clone(),
        body: validate::body(&input.body)?,
        anonymous: input.anonymous,
        created_at: Utc::now(),
    };
    db.insert_comment(&comment)?;
    Ok(comment)
}

pub fn delete_comment(db: &Db, actor: &User, comment_id: &str) -> AppResult<()> {
    let comment = db
        .find_comment(comment_id)?
        .ok_or_else(|| AppError::not_found("comment"))?;
    if comment.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::forbidden("only the author or an admin can delete this comment"));
    }
    db.delete_comment(comment_id)
}
