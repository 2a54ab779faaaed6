//! Comment and guestbook service coverage.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    FixtureCommentRepository, FixtureGuestbookRepository, FixtureManuscriptRepository,
};
use crate::domain::{AuthUser, ErrorCode, Manuscript, UserId, VerificationStatus};
use crate::test_support::session::{
    ADMIN_ID, MutableClock, READER_ID, epoch, profile_for, session_for,
};

type Comments = CommentService<FixtureManuscriptRepository, FixtureCommentRepository>;

struct Setup {
    service: Comments,
    clock: Arc<MutableClock>,
}

fn code(raw: &str) -> InventoryCode {
    InventoryCode::new(raw).expect("valid code")
}

fn state_for(raw_id: &str, role: Role) -> AuthState {
    let session = session_for(raw_id);
    AuthState {
        user: Some(session.user().clone()),
        session: Some(session),
        profile: (role != Role::Admin).then(|| profile_for(raw_id, VerificationStatus::Verified)),
        role,
        loading: false,
        is_initialized: true,
    }
}

#[fixture]
fn setup() -> Setup {
    let clock = Arc::new(MutableClock::new(epoch()));
    let manuscripts = FixtureManuscriptRepository::with_manuscripts([
        Manuscript::new(code("MS-1"), "Serat Centhini").expect("manuscript"),
        Manuscript::new(code("MS-2"), "Babad Tanah Jawi").expect("manuscript"),
    ]);
    Setup {
        service: CommentService::new(
            Arc::new(manuscripts),
            Arc::new(FixtureCommentRepository::default()),
            Arc::clone(&clock) as _,
        ),
        clock,
    }
}

#[rstest]
#[tokio::test]
async fn contributor_comments_wait_for_moderation(setup: Setup) {
    let reader = state_for(READER_ID, Role::VerifiedUser);

    let comment = setup
        .service
        .post(&reader, &code("MS-1"), "  Beautiful rubrication. ", None)
        .await
        .expect("posted");

    assert_eq!(comment.status, CommentStatus::Pending);
    assert_eq!(comment.body, "Beautiful rubrication.");
    assert_eq!(comment.author_name, "Test Reader");
    assert!(setup.service.thread(&code("MS-1")).await.expect("thread").is_empty());
}

#[rstest]
#[tokio::test]
async fn admin_comments_publish_immediately(setup: Setup) {
    let admin = state_for(ADMIN_ID, Role::Admin);
    let comment = setup
        .service
        .post(&admin, &code("MS-1"), "Digitised in 2024.", None)
        .await
        .expect("posted");

    assert_eq!(comment.status, CommentStatus::Approved);
    assert_eq!(comment.author_name, ADMIN_ID);
}

#[rstest]
#[case(Role::Guest, ErrorCode::Unauthorized)]
#[case(Role::Pending, ErrorCode::Forbidden)]
#[tokio::test]
async fn posting_requires_contributor_role(
    setup: Setup,
    #[case] role: Role,
    #[case] expected: ErrorCode,
) {
    let state = state_for(READER_ID, role);
    let err = setup
        .service
        .post(&state, &code("MS-1"), "hello", None)
        .await
        .expect_err("denied");
    assert_eq!(err.code(), expected);
}

#[rstest]
#[tokio::test]
async fn posting_to_unknown_manuscript_is_not_found(setup: Setup) {
    let reader = state_for(READER_ID, Role::VerifiedUser);
    let err = setup
        .service
        .post(&reader, &code("MS-404"), "hello", None)
        .await
        .expect_err("missing manuscript");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn replies_need_an_approved_parent_on_the_same_manuscript(setup: Setup) {
    let admin = state_for(ADMIN_ID, Role::Admin);
    let reader = state_for(READER_ID, Role::VerifiedUser);
    let approved = setup
        .service
        .post(&admin, &code("MS-1"), "Root", None)
        .await
        .expect("root");
    let pending = setup
        .service
        .post(&reader, &code("MS-1"), "Unmoderated", None)
        .await
        .expect("pending root");

    let other_manuscript = setup
        .service
        .post(&reader, &code("MS-2"), "Wrong place", Some(approved.id))
        .await
        .expect_err("cross-manuscript reply");
    let to_pending = setup
        .service
        .post(&reader, &code("MS-1"), "Too early", Some(pending.id))
        .await
        .expect_err("reply to pending");
    let to_missing = setup
        .service
        .post(&reader, &code("MS-1"), "Ghost", Some(CommentId::random()))
        .await
        .expect_err("reply to missing");

    assert_eq!(other_manuscript.code(), ErrorCode::InvalidRequest);
    assert_eq!(to_pending.code(), ErrorCode::InvalidRequest);
    assert_eq!(to_missing.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn thread_nests_approved_replies_and_drops_orphans(setup: Setup) {
    let admin = state_for(ADMIN_ID, Role::Admin);
    let reader = state_for(READER_ID, Role::VerifiedUser);
    let root = setup
        .service
        .post(&admin, &code("MS-1"), "Root", None)
        .await
        .expect("root");
    setup.clock.advance(Duration::from_secs(1));
    let reply = setup
        .service
        .post(&reader, &code("MS-1"), "Reply", Some(root.id))
        .await
        .expect("reply");
    setup.clock.advance(Duration::from_secs(1));
    let nested = setup
        .service
        .post(&admin, &code("MS-1"), "Nested under pending", Some(root.id))
        .await
        .expect("admin reply");

    let thread = setup.service.thread(&code("MS-1")).await.expect("thread");
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].replies.len(), 1, "pending reply is hidden");
    assert_eq!(thread[0].replies[0].comment.id, nested.id);

    setup
        .service
        .moderate(Role::Admin, &reply.id, ReviewDecision::Approve)
        .await
        .expect("moderated");
    let thread = setup.service.thread(&code("MS-1")).await.expect("thread");
    let reply_ids: Vec<CommentId> = thread[0].replies.iter().map(|r| r.comment.id).collect();
    assert_eq!(reply_ids, [reply.id, nested.id]);
}

#[rstest]
#[tokio::test]
async fn thread_drops_replies_whose_parent_is_hidden() {
    let clock = Arc::new(MutableClock::new(epoch()));
    let hidden_parent = CommentId::random();
    let orphan = Comment {
        id: CommentId::random(),
        manuscript: code("MS-1"),
        author_id: UserId::new(READER_ID).expect("id"),
        author_name: "Reader".to_owned(),
        parent_id: Some(hidden_parent),
        body: "Orphan".to_owned(),
        status: CommentStatus::Approved,
        created_at: epoch(),
    };
    let service = CommentService::new(
        Arc::new(FixtureManuscriptRepository::default()),
        Arc::new(FixtureCommentRepository::with_comments([orphan])),
        clock as _,
    );

    assert!(service.thread(&code("MS-1")).await.expect("thread").is_empty());
}

#[rstest]
#[tokio::test]
async fn moderation_is_admin_only(setup: Setup) {
    let err = setup
        .service
        .moderation_queue(Role::VerifiedUser)
        .await
        .expect_err("denied");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let missing = setup
        .service
        .moderate(Role::Admin, &CommentId::random(), ReviewDecision::Reject)
        .await
        .expect_err("missing");
    assert_eq!(missing.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn guestbook_lists_newest_first_and_admins_remove() {
    let clock = Arc::new(MutableClock::new(epoch()));
    let service = GuestbookService::new(
        Arc::new(FixtureGuestbookRepository::default()),
        Arc::clone(&clock) as _,
    );
    let first = service
        .sign(GuestbookDraft::try_new("Ayu", Some("Solo"), "Lovely").expect("draft"))
        .await
        .expect("signed");
    clock.advance(Duration::from_secs(60));
    let second = service
        .sign(GuestbookDraft::try_new("Budi", None, "Thanks").expect("draft"))
        .await
        .expect("signed");

    let names: Vec<String> = service
        .entries(10)
        .await
        .expect("entries")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, ["Budi", "Ayu"]);

    let denied = service
        .remove(Role::Guest, &first.id)
        .await
        .expect_err("guests cannot delete");
    assert_eq!(denied.code(), ErrorCode::Unauthorized);
    service.remove(Role::Admin, &second.id).await.expect("removed");
    assert_eq!(service.entries(0).await.expect("entries").len(), 1);
}

#[test]
fn admin_state_has_identity() {
    let admin = state_for(ADMIN_ID, Role::Admin);
    assert_eq!(
        admin.user.as_ref().map(AuthUser::id).map(ToString::to_string),
        Some(ADMIN_ID.to_owned())
    );
}
