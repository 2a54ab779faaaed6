//! Service wiring and command dispatch for the CLI.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sheet_file::{read_sheet, write_sheet};
use super::status::settled;
use super::{CliError, Command, ManuscriptArgs, RegisterArgs, SignInArgs, StatusView};
use crate::domain::port_errors::map_session_error;
use crate::domain::ports::{
    CommentRepository, GuestbookRepository, ManuscriptRepository, ProfileRepository,
    SessionSource, TextCompletionSource,
};
use crate::domain::{
    AuthState, AuthUser, AuthorizationPolicy, CatalogueService, CommentId, CommentService, Error,
    GuestbookDraft, GuestbookService, InventoryCode, LoginCredentials, Manuscript,
    ManuscriptAssistant, ManuscriptQuery, Profile, ProfileDraft, RegistrationService, ReviewDecision, SessionStore, SessionStoreConfig,
    SessionStorePorts, SessionStoreRuntime, UserId, VerificationService,
};

/// Outbound adapters the portal runs against.
pub struct PortalAdapters<P, M, C, G, T> {
    /// Hosted auth service.
    pub source: Arc<dyn SessionSource>,
    /// Member profiles.
    pub profiles: Arc<P>,
    /// Catalogue records.
    pub manuscripts: Arc<M>,
    /// Manuscript comments.
    pub comments: Arc<C>,
    /// Guestbook entries.
    pub guestbook: Arc<G>,
    /// Assistant completions.
    pub completion: Arc<T>,
}

/// Every service the CLI commands need, built from one set of adapters.
pub struct PortalApp<P, M, C, G, T> {
    source: Arc<dyn SessionSource>,
    store: SessionStore,
    registration: RegistrationService<dyn SessionSource, P>,
    verification: VerificationService<P>,
    catalogue: CatalogueService<M>,
    comments: CommentService<M, C>,
    guestbook: GuestbookService<G>,
    assistant: ManuscriptAssistant<T>,
}

impl<P, M, C, G, T> PortalApp<P, M, C, G, T>
where
    P: ProfileRepository + 'static,
    M: ManuscriptRepository,
    C: CommentRepository,
    G: GuestbookRepository,
    T: TextCompletionSource,
{
    /// Wire the services around `adapters`.
    pub fn new(
        adapters: PortalAdapters<P, M, C, G, T>,
        policy: Arc<dyn AuthorizationPolicy>,
        runtime: SessionStoreRuntime,
        config: SessionStoreConfig,
        apology: &str,
    ) -> Self {
        let PortalAdapters {
            source,
            profiles,
            manuscripts,
            comments,
            guestbook,
            completion,
        } = adapters;
        let clock = Arc::clone(&runtime.clock);
        let lookups: Arc<dyn ProfileRepository> = profiles.clone();
        let store = SessionStore::new(
            SessionStorePorts::new(Arc::clone(&source), lookups, policy),
            runtime,
            config,
        );
        Self {
            registration: RegistrationService::new(Arc::clone(&source), Arc::clone(&profiles)),
            source,
            store,
            verification: VerificationService::new(profiles),
            catalogue: CatalogueService::new(Arc::clone(&manuscripts)),
            comments: CommentService::new(manuscripts, comments, Arc::clone(&clock)),
            guestbook: GuestbookService::new(guestbook, clock),
            assistant: ManuscriptAssistant::new(completion, apology),
        }
    }

    /// The session store driving role checks.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one command, writing its output to `out`.
    ///
    /// Commands that need a role sign in first, wait for the store to derive
    /// it, run, and sign out again whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns domain, file, or output failures.
    pub async fn run<W>(&self, command: Command, out: &mut W) -> Result<(), CliError>
    where
        W: Write + Send,
    {
        match command {
            Command::Status(sign_in) => {
                let view = self
                    .as_member(&sign_in, |state| async move { Ok(StatusView::from(&state)) })
                    .await?;
                print_json(out, &view)
            }
            Command::Register(form) => {
                let profile = self.register(&form).await?;
                print_json(out, &profile)
            }
            Command::CompleteProfile(form) => {
                let draft = profile_draft(&form)?;
                let profile = self
                    .as_member(&form.account, |state| async move {
                        let user = state.user.ok_or_else(|| {
                            Error::unauthorized("sign in before completing a profile")
                        })?;
                        self.registration.complete_profile(&user, draft).await
                    })
                    .await?;
                print_json(out, &profile)
            }
            Command::Search {
                term,
                limit,
                offset,
            } => {
                let query = ManuscriptQuery::new(term.as_deref()).page(limit, offset);
                let found = self.catalogue.search(&query).await?;
                print_json(out, &found)
            }
            Command::Show { code } => {
                let code = InventoryCode::new(code).map_err(invalid)?;
                let manuscript = self.catalogue.get(&code).await?;
                print_json(out, &manuscript)
            }
            Command::Save { sign_in, record } => {
                let manuscript = manuscript(record)?;
                let saved = self
                    .as_member(&sign_in, |state| async move {
                        self.catalogue.save(state.role, manuscript).await
                    })
                    .await?;
                print_json(out, &saved)
            }
            Command::Delete { sign_in, code } => {
                let code = InventoryCode::new(code).map_err(invalid)?;
                let target = code.clone();
                self.as_member(&sign_in, |state| async move {
                    self.catalogue.delete(state.role, &target).await
                })
                .await?;
                print_json(out, &json!({ "deleted": code }))
            }
            Command::Pending(sign_in) => {
                let pending = self
                    .as_member(&sign_in, |state| async move {
                        self.verification.pending(state.role).await
                    })
                    .await?;
                print_json(out, &pending)
            }
            Command::Verify {
                sign_in,
                user_id,
                reject,
            } => {
                let user_id = UserId::new(&user_id).map_err(invalid)?;
                let target = user_id.clone();
                let status = self
                    .as_member(&sign_in, |state| async move {
                        self.verification
                            .decide(state.role, &target, decision(reject))
                            .await
                    })
                    .await?;
                print_json(out, &json!({ "user_id": user_id, "status": status }))
            }
            Command::Import { sign_in, file } => {
                let rows = read_sheet(&file)?;
                let report = self
                    .as_member(&sign_in, |state| async move {
                        self.catalogue.import_rows(state.role, &rows).await
                    })
                    .await?;
                print_json(out, &report)
            }
            Command::Export { sign_in, file } => {
                let rows = self
                    .as_member(&sign_in, |state| async move {
                        self.catalogue.export_rows(state.role).await
                    })
                    .await?;
                write_sheet(&file, &rows)?;
                print_json(out, &json!({ "exported": rows.len(), "file": file }))
            }
            Command::Ask { code, question } => self.ask(&code, &question, out).await,
            Command::Thread { code } => {
                let code = InventoryCode::new(code).map_err(invalid)?;
                let thread = self.comments.thread(&code).await?;
                print_json(out, &thread)
            }
            Command::Comment {
                sign_in,
                code,
                body,
                reply_to,
            } => {
                let code = InventoryCode::new(code).map_err(invalid)?;
                let parent = reply_to.map(CommentId::from_uuid);
                let comment = self
                    .as_member(&sign_in, |state| async move {
                        self.comments.post(&state, &code, &body, parent).await
                    })
                    .await?;
                print_json(out, &comment)
            }
            Command::Moderation(sign_in) => {
                let queue = self
                    .as_member(&sign_in, |state| async move {
                        self.comments.moderation_queue(state.role).await
                    })
                    .await?;
                print_json(out, &queue)
            }
            Command::Moderate {
                sign_in,
                comment_id,
                reject,
            } => {
                let id = CommentId::from_uuid(comment_id);
                self.as_member(&sign_in, |state| async move {
                    self.comments
                        .moderate(state.role, &id, decision(reject))
                        .await
                })
                .await?;
                print_json(out, &json!({ "comment_id": id, "approved": !reject }))
            }
            Command::Guestbook { limit } => {
                let entries = self.guestbook.entries(limit).await?;
                print_json(out, &entries)
            }
            Command::Sign {
                name,
                origin,
                message,
            } => {
                let draft = GuestbookDraft::try_new(&name, origin.as_deref(), &message)
                    .map_err(invalid)?;
                let entry = self.guestbook.sign(draft).await?;
                print_json(out, &entry)
            }
            Command::Unsign { sign_in, entry_id } => {
                self.as_member(&sign_in, |state| async move {
                    self.guestbook.remove(state.role, &entry_id).await
                })
                .await?;
                print_json(out, &json!({ "removed": entry_id }))
            }
        }
    }

    async fn register(&self, form: &RegisterArgs) -> Result<Profile, Error> {
        let credentials = credentials(&form.account)?;
        let draft = profile_draft(form)?;
        self.registration.register(&credentials, draft).await
    }

    async fn ask<W>(&self, code: &str, question: &str, out: &mut W) -> Result<(), CliError>
    where
        W: Write + Send,
    {
        let code = InventoryCode::new(code).map_err(invalid)?;
        let manuscript = self.catalogue.get(&code).await?;
        let mut written = Ok(());
        self.assistant
            .ask(question, &manuscript, |chunk| {
                if written.is_ok() {
                    written = out.write_all(chunk.as_bytes()).and_then(|()| out.flush());
                }
            })
            .await?;
        written?;
        writeln!(out)?;
        Ok(())
    }

    /// Run `action` with the settled state of a fresh sign-in, then sign out
    /// whatever the outcome.
    async fn as_member<R, F, Fut>(&self, account: &SignInArgs, action: F) -> Result<R, CliError>
    where
        F: FnOnce(AuthState) -> Fut,
        Fut: Future<Output = Result<R, Error>>,
    {
        let (state, listener) = self.sign_in(account).await?;
        let result = action(state).await;
        self.sign_out(listener).await;
        Ok(result?)
    }

    /// Sign in with `account` and wait for the store to derive the role.
    async fn sign_in(
        &self,
        account: &SignInArgs,
    ) -> Result<(AuthState, JoinHandle<()>), CliError> {
        let credentials = credentials(account)?;
        let listener = self.store.spawn_listener();
        let signed_in = async {
            settled(&self.store, |_| true).await?;
            let session = self
                .source
                .sign_in_with_password(&credentials)
                .await
                .map_err(map_session_error)?;
            let user_id = session.user().id().clone();
            settled(&self.store, move |state| {
                state.user.as_ref().map(AuthUser::id) == Some(&user_id)
            })
            .await
        }
        .await;
        match signed_in {
            Ok(state) => {
                debug!(role = %state.role, "signed in for command");
                Ok((state, listener))
            }
            Err(error) => {
                listener.abort();
                Err(error)
            }
        }
    }

    async fn sign_out(&self, listener: JoinHandle<()>) {
        match self.store.sign_out().await {
            Ok(()) => {
                if let Err(error) = settled(&self.store, |state| state.user.is_none()).await {
                    warn!(%error, "session did not clear after sign-out");
                }
            }
            Err(error) => warn!(%error, "sign-out after command failed"),
        }
        listener.abort();
    }
}

fn credentials(account: &SignInArgs) -> Result<LoginCredentials, Error> {
    LoginCredentials::try_from_parts(&account.email, &account.password).map_err(invalid)
}

fn profile_draft(form: &RegisterArgs) -> Result<ProfileDraft, Error> {
    let mut draft = ProfileDraft::builder()
        .full_name(&form.full_name)
        .domicile(&form.domicile)
        .institution(&form.institution)
        .occupation(&form.occupation)
        .phone(&form.phone);
    if let Some(unit) = &form.alumni_unit {
        draft = draft.alumni(unit, form.alumni_year);
    }
    draft.build().map_err(invalid)
}

fn manuscript(record: ManuscriptArgs) -> Result<Manuscript, Error> {
    let code = InventoryCode::new(&record.code).map_err(invalid)?;
    let mut manuscript = Manuscript::new(code, &record.title).map_err(invalid)?;
    let text = |value: Option<String>| {
        value
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    };
    manuscript.author = text(record.author);
    manuscript.language = text(record.language);
    manuscript.script = text(record.script);
    manuscript.material = text(record.material);
    manuscript.page_count = record.page_count;
    manuscript.date_text = text(record.date_text);
    manuscript.collection = text(record.collection);
    manuscript.summary = text(record.summary);
    manuscript.image_url = text(record.image_url);
    Ok(manuscript)
}

fn decision(reject: bool) -> ReviewDecision {
    if reject {
        ReviewDecision::Reject
    } else {
        ReviewDecision::Approve
    }
}

fn invalid(error: impl ToString) -> Error {
    Error::invalid_request(error.to_string())
}

fn print_json<W: Write>(out: &mut W, value: &impl Serialize) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|error| CliError::Output(error.into()))?;
    writeln!(out)?;
    Ok(())
}
