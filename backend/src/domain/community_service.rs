//! Comment threads with moderation, and the public guestbook.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::Clock;
use tracing::info;
use uuid::Uuid;

use crate::domain::port_errors::{map_comment_error, map_guestbook_error, map_manuscript_error};
use crate::domain::ports::{CommentRepository, GuestbookRepository, ManuscriptRepository};
use crate::domain::{
    Area, AuthState, Comment, CommentId, CommentStatus, CommentThread, Error, GuestbookDraft,
    GuestbookEntry, InventoryCode, ReviewDecision, Role, comment_body, require_area,
};

/// Upper bound on guestbook entries returned per request.
pub const GUESTBOOK_PAGE_MAX: u32 = 100;

/// Manuscript comments.
#[derive(Clone)]
pub struct CommentService<M, C> {
    manuscripts: Arc<M>,
    comments: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<M, C> CommentService<M, C> {
    /// Create a new service with the given ports and clock.
    pub fn new(manuscripts: Arc<M>, comments: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            manuscripts,
            comments,
            clock,
        }
    }
}

impl<M, C> CommentService<M, C>
where
    M: ManuscriptRepository,
    C: CommentRepository,
{
    /// Post a comment or reply as the signed-in contributor.
    ///
    /// Administrator comments are published immediately; everyone else's
    /// wait for moderation.
    pub async fn post(
        &self,
        state: &AuthState,
        manuscript: &InventoryCode,
        body: &str,
        parent: Option<CommentId>,
    ) -> Result<Comment, Error> {
        require_area(state.role, Area::Contributor)?;
        let user = state
            .user
            .as_ref()
            .ok_or_else(|| Error::unauthorized("sign in to comment"))?;
        let body = comment_body(body).map_err(|err| Error::invalid_request(err.to_string()))?;

        let exists = self
            .manuscripts
            .find_by_code(manuscript)
            .await
            .map_err(map_manuscript_error)?
            .is_some();
        if !exists {
            return Err(Error::not_found(format!("manuscript {manuscript} not found")));
        }
        if let Some(parent_id) = parent {
            self.check_parent(manuscript, &parent_id).await?;
        }

        let author_name = state
            .profile
            .as_ref()
            .map(|profile| profile.full_name.clone())
            .or_else(|| user.email().map(str::to_owned))
            .unwrap_or_else(|| user.id().to_string());
        let status = if state.role == Role::Admin {
            CommentStatus::Approved
        } else {
            CommentStatus::Pending
        };
        let comment = Comment {
            id: CommentId::random(),
            manuscript: manuscript.clone(),
            author_id: user.id().clone(),
            author_name,
            parent_id: parent,
            body,
            status,
            created_at: self.clock.utc(),
        };
        self.comments
            .insert(&comment)
            .await
            .map_err(map_comment_error)?;
        info!(id = %comment.id, %manuscript, status = comment.status.as_str(), "comment posted");
        Ok(comment)
    }

    async fn check_parent(
        &self,
        manuscript: &InventoryCode,
        parent_id: &CommentId,
    ) -> Result<(), Error> {
        let parent = self
            .comments
            .find_by_id(parent_id)
            .await
            .map_err(map_comment_error)?
            .ok_or_else(|| Error::not_found(format!("comment {parent_id} not found")))?;
        if parent.manuscript != *manuscript {
            return Err(Error::invalid_request(
                "replies must stay on the parent comment's manuscript",
            ));
        }
        if parent.status != CommentStatus::Approved {
            return Err(Error::invalid_request(
                "replies are only allowed to approved comments",
            ));
        }
        Ok(())
    }

    /// Approved comments on `manuscript` as a reply tree, oldest first.
    pub async fn thread(&self, manuscript: &InventoryCode) -> Result<Vec<CommentThread>, Error> {
        let mut approved = self
            .comments
            .list_for_manuscript(manuscript, CommentStatus::Approved)
            .await
            .map_err(map_comment_error)?;
        approved.sort_by_key(|comment| comment.created_at);

        let mut roots = Vec::new();
        let mut replies: HashMap<CommentId, Vec<Comment>> = HashMap::new();
        for comment in approved {
            match comment.parent_id {
                Some(parent) => replies.entry(parent).or_default().push(comment),
                None => roots.push(comment),
            }
        }
        Ok(roots
            .into_iter()
            .map(|root| attach_replies(root, &mut replies))
            .collect())
    }

    /// Comments awaiting moderation.
    pub async fn moderation_queue(&self, role: Role) -> Result<Vec<Comment>, Error> {
        require_area(role, Area::Admin)?;
        self.comments
            .list_by_status(CommentStatus::Pending)
            .await
            .map_err(map_comment_error)
    }

    /// Approve or reject a comment.
    pub async fn moderate(
        &self,
        role: Role,
        id: &CommentId,
        decision: ReviewDecision,
    ) -> Result<(), Error> {
        require_area(role, Area::Admin)?;
        let status = CommentStatus::from(decision);
        let updated = self
            .comments
            .set_status(id, status)
            .await
            .map_err(map_comment_error)?;
        if !updated {
            return Err(Error::not_found(format!("comment {id} not found")));
        }
        info!(%id, status = status.as_str(), "comment moderated");
        Ok(())
    }
}

fn attach_replies(
    comment: Comment,
    replies: &mut HashMap<CommentId, Vec<Comment>>,
) -> CommentThread {
    let children = replies.remove(&comment.id).unwrap_or_default();
    CommentThread {
        comment,
        replies: children
            .into_iter()
            .map(|child| attach_replies(child, replies))
            .collect(),
    }
}

/// Visitor guestbook.
#[derive(Clone)]
pub struct GuestbookService<G> {
    entries: Arc<G>,
    clock: Arc<dyn Clock>,
}

impl<G> GuestbookService<G> {
    /// Create a new service with the given repository and clock.
    pub fn new(entries: Arc<G>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }
}

impl<G> GuestbookService<G>
where
    G: GuestbookRepository,
{
    /// Add an entry. Open to everyone.
    pub async fn sign(&self, draft: GuestbookDraft) -> Result<GuestbookEntry, Error> {
        let entry = draft.into_entry(Uuid::new_v4(), self.clock.utc());
        self.entries
            .insert(&entry)
            .await
            .map_err(map_guestbook_error)?;
        Ok(entry)
    }

    /// Newest entries first; `limit` is clamped to `1..=GUESTBOOK_PAGE_MAX`.
    pub async fn entries(&self, limit: u32) -> Result<Vec<GuestbookEntry>, Error> {
        self.entries
            .list_recent(limit.clamp(1, GUESTBOOK_PAGE_MAX))
            .await
            .map_err(map_guestbook_error)
    }

    /// Delete an entry.
    pub async fn remove(&self, role: Role, id: &Uuid) -> Result<(), Error> {
        require_area(role, Area::Admin)?;
        let removed = self
            .entries
            .delete(id)
            .await
            .map_err(map_guestbook_error)?;
        if !removed {
            return Err(Error::not_found(format!("guestbook entry {id} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
