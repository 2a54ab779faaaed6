//! Domain primitives, services, and ports.
//!
//! Purpose: hold the portal's business rules independent of the hosted
//! backend, the completion service, and the CLI. Adapters talk to the domain
//! through the traits in [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - SessionStore: session mirror with derived [`Role`] and loading floor.
//! - derive_role / AuthorizationPolicy: role rules.
//! - Area / require_area: route guards keyed off role.
//! - Registration, verification, catalogue, community, and assistant
//!   services.

pub mod access;
pub mod assistant;
pub mod auth;
pub mod catalogue_service;
pub mod community;
pub mod community_service;
pub mod error;
pub mod manuscript;
pub mod manuscript_sheet;
pub(crate) mod port_errors;
pub mod ports;
pub mod profile;
pub mod registration_service;
pub mod role;
pub mod session_store;
pub mod user;

pub use self::access::{Area, require_area};
pub use self::assistant::{DEFAULT_APOLOGY, ManuscriptAssistant, QUESTION_MAX, build_prompt};
pub use self::auth::{AuthChange, AuthEventKind, LoginCredentials, LoginValidationError, PASSWORD_MIN};
pub use self::catalogue_service::CatalogueService;
pub use self::community::{
    COMMENT_BODY_MAX, Comment, CommentId, CommentStatus, CommentThread, CommunityValidationError,
    GUESTBOOK_MESSAGE_MAX, GUESTBOOK_NAME_MAX, GUESTBOOK_ORIGIN_MAX, GuestbookDraft,
    GuestbookEntry, ReviewDecision, comment_body,
};
pub use self::community_service::{CommentService, GuestbookService};
pub use self::error::{Error, ErrorCode};
pub use self::manuscript::{
    InventoryCode, Manuscript, ManuscriptQuery, ManuscriptValidationError, SEARCH_LIMIT_DEFAULT,
    SEARCH_LIMIT_MAX,
};
pub use self::manuscript_sheet::{ImportReport, RejectedRow, SHEET_COLUMNS, SheetRow};
pub use self::profile::{
    ALUMNI_YEAR_MAX, ALUMNI_YEAR_MIN, AlumniDetails, Profile, ProfileDraft, ProfileDraftBuilder,
    ProfileValidationError, VerificationStatus,
};
pub use self::registration_service::{RegistrationService, VerificationService};
pub use self::role::{AdminIdentifierPolicy, AuthorizationPolicy, Role, derive_role};
pub use self::session_store::{
    AuthState, DEFAULT_MIN_LOADING, DEFAULT_SIGN_OUT_GRACE, DelayScheduler, DelayedCallback,
    Listener, ScheduledCallback, SessionStore, SessionStoreConfig, SessionStorePorts,
    SessionStoreRuntime, Subscription, TokioScheduler,
};
pub use self::user::{AuthUser, Session, UserId, UserValidationError};

