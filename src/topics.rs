//! Module-scoped question threads.
//!
//! A topic belongs to a module and collects replies. Replies are voted on,
//! the topic author may accept one (which resolves the topic), and anyone
//! may subscribe to be notified of new replies. Authors are subscribed to
//! their own topics automatically.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::authorship::AuthorView;
use crate::codename::codename;
use crate::error::{AppError, AppResult};
use crate::notifications::{NotificationKind, Notifier};
use crate::store::{Db, VoteTarget};
use crate::validate;
use crate::voting::{self, VoteTally, VoteValue};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Open,
    Resolved,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Open => "open",
            TopicStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for TopicStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TopicStatus::Open),
            "resolved" => Ok(TopicStatus::Resolved),
            other => Err(format!("unknown topic status '{}'", other)),
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub id: String,
    pub module_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub anonymous: bool,
    pub status: TopicStatus,
    pub accepted_reply_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub id: String,
    pub topic_id: String,
    pub author_id: String,
    pub body: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// A topic with its derived list-page counters.
#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub topic: Topic,
    pub reply_count: u32,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReply {
    pub body: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub body: String,
    pub author: AuthorView,
    pub status: TopicStatus,
    pub accepted_reply_id: Option<String>,
    pub reply_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyView {
    pub id: String,
    pub body: String,
    pub author: AuthorView,
    pub accepted: bool,
    pub votes: VoteTally,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicDetail {
    #[serde(flatten)]
    pub topic: TopicView,
    pub subscribed: bool,
    pub replies: Vec<ReplyView>,
}

fn topic_view(summary: &TopicSummary, users: &HashMap<String, User>, viewer: Option<&User>) -> TopicView {
    let topic = &summary.topic;
    TopicView {
        id: topic.id.clone(),
        module_id: topic.module_id.clone(),
        title: topic.title.clone(),
        body: topic.body.clone(),
        author: AuthorView::present(&topic.author_id, users.get(&topic.author_id), topic.anonymous, viewer),
        status: topic.status,
        accepted_reply_id: topic.accepted_reply_id.clone(),
        reply_count: summary.reply_count,
        created_at: topic.created_at,
        last_activity_at: summary.last_activity_at,
    }
}

/// Accepted reply first, then highest score, then oldest.
pub fn order_replies(replies: &mut [ReplyView]) {
    replies.sort_by(|a, b| {
        b.accepted
            .cmp(&a.accepted)
            .then(b.votes.score.cmp(&a.votes.score))
            .then(a.created_at.cmp(&b.created_at))
    });
}

fn display_name(user: &User, anonymous: bool) -> String {
    if anonymous {
        codename(&user.id)
    } else {
        user.display_name.clone()
    }
}

fn load_topic(db: &Db, topic_id: &str) -> AppResult<Topic> {
    db.find_topic(topic_id)?
        .ok_or_else(|| AppError::not_found("topic"))
}

fn load_reply(db: &Db, reply_id: &str) -> AppResult<Reply> {
    db.find_reply(reply_id)?
        .ok_or_else(|| AppError::not_found("reply"))
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub fn list_topics(
    db: &Db,
    module_id: &str,
    status: Option<TopicStatus>,
    viewer: Option<&User>,
) -> AppResult<Vec<TopicView>> {
    db.find_module(module_id)?
        .ok_or_else(|| AppError::not_found("module"))?;
    let summaries = db.list_topics(module_id, status)?;
    let author_ids: Vec<String> = summaries.iter().map(|s| s.topic.author_id.clone()).collect();
    let users = db.users_by_ids(&author_ids)?;
    Ok(summaries.iter().map(|s| topic_view(s, &users, viewer)).collect())
}

pub fn create_topic(db: &Db, author: &User, module_id: &str, input: NewTopic) -> AppResult<Topic> {
    db.find_module(module_id)?
        .ok_or_else(|| AppError::not_found("module"))?;
    let now = Utc::now();
    let topic = Topic {
        id: Uuid::new_v4().to_string(),
        module_id: module_id.to_string(),
        author_id: author.id.clone(),
        title: validate::title(&input.title)?,
        body: validate::body(&input.body)?,
        anonymous: input.anonymous,
        status: TopicStatus::Open,
        accepted_reply_id: None,
        created_at: now,
        updated_at: now,
    };
    db.insert_topic(&topic)?;
    db.subscribe(&topic.id, &author.id)?;
    tracing::info!(topic_id = %topic.id, module_id, "topic created");
    Ok(topic)
}

pub fn topic_detail(db: &Db, topic_id: &str, viewer: Option<&User>) -> AppResult<TopicDetail> {
    let summary = db
        .topic_summary(topic_id)?
        .ok_or_else(|| AppError::not_found("topic"))?;
    let replies = db.list_replies(topic_id)?;

    let mut ids: Vec<String> = replies.iter().map(|r| r.author_id.clone()).collect();
    ids.push(summary.topic.author_id.clone());
    let users = db.users_by_ids(&ids)?;

    let reply_ids: Vec<String> = replies.iter().map(|r| r.id.clone()).collect();
    let votes = db.votes_for(VoteTarget::Reply, &reply_ids)?;
    let totals = voting::tally(&votes, viewer.map(|v| v.id.as_str()));

    let accepted = summary.topic.accepted_reply_id.as_deref();
    let mut views: Vec<ReplyView> = replies
        .iter()
        .map(|reply| ReplyView {
            id: reply.id.clone(),
            body: reply.body.clone(),
            author: AuthorView::present(&reply.author_id, users.get(&reply.author_id), reply.anonymous, viewer),
            accepted: accepted == Some(reply.id.as_str()),
            votes: voting::tally_for(&totals, &reply.id),
            created_at: reply.created_at,
            edited_at: reply.edited_at,
        })
        .collect();
    order_replies(&mut views);

    let subscribed = match viewer {
        Some(user) => db.is_subscribed(topic_id, &user.id)?,
        None => false,
    };

    Ok(TopicDetail {
        topic: topic_view(&summary, &users, viewer),
        subscribed,
        replies: views,
    })
}

pub fn update_topic(db: &Db, actor: &User, topic_id: &str, update: TopicUpdate) -> AppResult<Topic> {
    let mut topic = load_topic(db, topic_id)?;
    if topic.author_id != actor.id {
        return Err(AppError::forbidden("only the author can edit this topic"));
    }
    if let Some(title) = update.title {
        topic.title = validate::title(&title)?;
    }
    if let Some(body) = update.body {
        topic.body = validate::body(&body)?;
    }
    topic.updated_at = Utc::now();
    db.update_topic(&topic)?;
    Ok(topic)
}

pub fn delete_topic(db: &Db, actor: &User, topic_id: &str) -> AppResult<()> {
    let topic = load_topic(db, topic_id)?;
    if topic.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::forbidden("only the author or an admin can delete this topic"));
    }
    db.delete_topic(topic_id)?;
    tracing::info!(topic_id, actor = %actor.id, "topic deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

pub async fn create_reply(
    db: &Db,
    notifier: &Notifier,
    author: &User,
    topic_id: &str,
    input: NewReply,
) -> AppResult<Reply> {
    let mut topic = load_topic(db, topic_id)?;
    let now = Utc::now();
    let reply = Reply {
        id: Uuid::new_v4().to_string(),
        topic_id: topic_id.to_string(),
        author_id: author.id.clone(),
        body: validate::body(&input.body)?,
        anonymous: input.anonymous,
        created_at: now,
        edited_at: None,
    };
    db.insert_reply(&reply)?;
    topic.updated_at = now;
    db.update_topic(&topic)?;

    // The reply is stored; notifying subscribers is best effort from here.
    let subscribers = match db.subscribers(topic_id) {
        Ok(subscribers) => subscribers,
        Err(err) => {
            tracing::warn!(topic_id, error = %err, "could not load subscribers");
            return Ok(reply);
        }
    };
    let message = format!(
        "{} replied to \"{}\".",
        display_name(author, reply.anonymous),
        topic.title
    );
    notifier
        .notify_all(
            &subscribers,
            Some(&author.id),
            NotificationKind::TopicReply,
            &message,
            Some(&format!("/topics/{}", topic_id)),
        )
        .await;
    Ok(reply)
}

pub fn update_reply(db: &Db, actor: &User, reply_id: &str, body: &str) -> AppResult<Reply> {
    let mut reply = load_reply(db, reply_id)?;
    if reply.author_id != actor.id {
        return Err(AppError::forbidden("only the author can edit this reply"));
    }
    reply.body = validate::body(body)?;
    reply.edited_at = Some(Utc::now());
    db.update_reply(&reply)?;
    Ok(reply)
}

/// Delete a reply. Removing the accepted answer reopens the topic.
pub fn delete_reply(db: &Db, actor: &User, reply_id: &str) -> AppResult<()> {
    let reply = load_reply(db, reply_id)?;
    if reply.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::forbidden("only the author or an admin can delete this reply"));
    }
    let topic = load_topic(db, &reply.topic_id)?;
    if topic.accepted_reply_id.as_deref() == Some(reply_id) {
        db.set_accepted_reply(&topic.id, None, TopicStatus::Open)?;
    }
    db.delete_reply(reply_id)?;
    Ok(())
}

pub fn vote_reply(db: &Db, voter: &User, reply_id: &str, value: VoteValue) -> AppResult<VoteTally> {
    let reply = load_reply(db, reply_id)?;
    if reply.author_id == voter.id {
        return Err(AppError::validation("you cannot vote on your own reply"));
    }
    let existing = db.current_vote(VoteTarget::Reply, reply_id, &voter.id)?;
    db.apply_vote(VoteTarget::Reply, reply_id, &voter.id, voting::resolve(existing, value))?;

    let votes = db.votes_for(VoteTarget::Reply, &[reply_id.to_string()])?;
    Ok(voting::tally_for(&voting::tally(&votes, Some(&voter.id)), reply_id))
}

/// Mark `reply_id` as the answer to `topic_id`. Only the topic author may.
pub async fn accept_reply(
    db: &Db,
    notifier: &Notifier,
    actor: &User,
    topic_id: &str,
    reply_id: &str,
) -> AppResult<Topic> {
    let mut topic = load_topic(db, topic_id)?;
    if topic.author_id != actor.id {
        return Err(AppError::forbidden("only the topic author can accept a reply"));
    }
    let reply = load_reply(db, reply_id)?;
    if reply.topic_id != topic.id {
        return Err(AppError::validation("reply does not belong to this topic"));
    }

    db.set_accepted_reply(topic_id, Some(reply_id), TopicStatus::Resolved)?;
    topic.accepted_reply_id = Some(reply_id.to_string());
    topic.status = TopicStatus::Resolved;

    if reply.author_id != actor.id {
        if let Some(reply_author) = db.find_user(&reply.author_id)? {
            let message = format!("Your reply to \"{}\" was accepted as the answer.", topic.title);
            let sent = notifier
                .notify(
                    &reply_author,
                    NotificationKind::ReplyAccepted,
                    &message,
                    Some(&format!("/topics/{}", topic_id)),
                )
                .await;
            if let Err(err) = sent {
                tracing::warn!(topic_id, error = %err, "could not notify reply author");
            }
        }
    }
    Ok(topic)
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

pub fn subscribe(db: &Db, user: &User, topic_id: &str) -> AppResult<()> {
    load_topic(db, topic_id)?;
    db.subscribe(topic_id, &user.id)
}

pub fn unsubscribe(db: &Db, user: &User, topic_id: &str) -> AppResult<()> {
    load_topic(db, topic_id)?;
    db.unsubscribe(topic_id, &user.id)
}

pub fn subscriptions(db: &Db, user: &User) -> AppResult<Vec<TopicView>> {
    let summaries = db.subscribed_topics(&user.id)?;
    let author_ids: Vec<String> = summaries.iter().map(|s| s.topic.author_id.clone()).collect();
    let users = db.users_by_ids(&author_ids)?;
    Ok(summaries
        .iter()
        .map(|s| topic_view(s, &users, Some(user)))
        .collect())
}
