//! Wire shapes for the hosted auth endpoints and data tables.
//!
//! Adapters decode into these DTOs first, then map into domain types in one
//! pass. Row DTOs also serialise for inserts and upserts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    AlumniDetails, AuthUser, Comment, CommentId, CommentStatus, GuestbookEntry, InventoryCode,
    Manuscript, Profile, Session, UserId, VerificationStatus,
};

#[derive(Debug, Deserialize)]
pub(super) struct AuthUserDto {
    pub(super) id: String,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl AuthUserDto {
    pub(super) fn into_domain(self) -> Result<AuthUser, String> {
        let id = UserId::new(&self.id).map_err(|err| format!("user {}: {err}", self.id))?;
        AuthUser::try_new(id, self.email.as_deref()).map_err(|err| err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenGrantDto {
    pub(super) access_token: String,
    #[serde(default)]
    pub(super) refresh_token: Option<String>,
    pub(super) expires_in: i64,
    pub(super) user: AuthUserDto,
}

impl TokenGrantDto {
    pub(super) fn into_session(self, now: DateTime<Utc>) -> Result<Session, String> {
        if self.access_token.is_empty() {
            return Err("token grant is missing an access token".to_owned());
        }
        let user = self.user.into_domain()?;
        let expires_at = Duration::try_seconds(self.expires_in.max(0))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| format!("token lifetime {} is out of range", self.expires_in))?;
        Ok(Session::new(
            self.access_token,
            self.refresh_token,
            expires_at,
            user,
        ))
    }
}

/// Sign-up answers with a token grant when confirmation is off, else a bare
/// user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignUpDto {
    WithSession(TokenGrantDto),
    User(AuthUserDto),
}

impl SignUpDto {
    /// The created user, plus the session when the service opened one.
    pub(super) fn into_outcome(
        self,
        now: DateTime<Utc>,
    ) -> Result<(AuthUser, Option<Session>), String> {
        match self {
            Self::WithSession(grant) => {
                let session = grant.into_session(now)?;
                Ok((session.user().clone(), Some(session)))
            }
            Self::User(user) => Ok((user.into_domain()?, None)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AuthErrorDto {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl AuthErrorDto {
    pub(super) fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CredentialsDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshDto<'a> {
    pub(super) refresh_token: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ProfileRow {
    pub(super) user_id: String,
    pub(super) full_name: String,
    pub(super) domicile: String,
    pub(super) institution: String,
    pub(super) occupation: String,
    pub(super) phone: String,
    #[serde(default)]
    pub(super) alumni_unit: Option<String>,
    #[serde(default)]
    pub(super) alumni_year: Option<i32>,
    pub(super) status: VerificationStatus,
}

impl From<&Profile> for ProfileRow {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            full_name: profile.full_name.clone(),
            domicile: profile.domicile.clone(),
            institution: profile.institution.clone(),
            occupation: profile.occupation.clone(),
            phone: profile.phone.clone(),
            alumni_unit: profile.alumni.as_ref().map(|alumni| alumni.unit.clone()),
            alumni_year: profile.alumni.as_ref().and_then(|alumni| alumni.year),
            status: profile.status,
        }
    }
}

impl ProfileRow {
    pub(super) fn into_domain(self) -> Result<Profile, String> {
        let user_id =
            UserId::new(&self.user_id).map_err(|err| format!("profile {}: {err}", self.user_id))?;
        let alumni = self.alumni_unit.map(|unit| AlumniDetails {
            unit,
            year: self.alumni_year,
        });
        Ok(Profile {
            user_id,
            full_name: self.full_name,
            domicile: self.domicile,
            institution: self.institution,
            occupation: self.occupation,
            phone: self.phone,
            alumni,
            status: self.status,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StatusPatch<S> {
    pub(super) status: S,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ManuscriptRow {
    pub(super) inventory_code: String,
    pub(super) title: String,
    pub(super) author: Option<String>,
    pub(super) language: Option<String>,
    pub(super) script: Option<String>,
    pub(super) material: Option<String>,
    pub(super) page_count: Option<i64>,
    pub(super) date_text: Option<String>,
    pub(super) collection: Option<String>,
    pub(super) summary: Option<String>,
    pub(super) image_url: Option<String>,
}

impl From<&Manuscript> for ManuscriptRow {
    fn from(manuscript: &Manuscript) -> Self {
        Self {
            inventory_code: manuscript.inventory_code.to_string(),
            title: manuscript.title.clone(),
            author: manuscript.author.clone(),
            language: manuscript.language.clone(),
            script: manuscript.script.clone(),
            material: manuscript.material.clone(),
            page_count: manuscript.page_count.map(i64::from),
            date_text: manuscript.date_text.clone(),
            collection: manuscript.collection.clone(),
            summary: manuscript.summary.clone(),
            image_url: manuscript.image_url.clone(),
        }
    }
}

impl ManuscriptRow {
    pub(super) fn into_domain(self) -> Result<Manuscript, String> {
        let code = InventoryCode::new(&self.inventory_code).map_err(|err| err.to_string())?;
        let page_count = self
            .page_count
            .map(u32::try_from)
            .transpose()
            .map_err(|_| format!("manuscript {code}: page count out of range"))?;
        let manuscript = Manuscript {
            inventory_code: code,
            title: self.title,
            author: blank_to_none(self.author),
            language: blank_to_none(self.language),
            script: blank_to_none(self.script),
            material: blank_to_none(self.material),
            page_count,
            date_text: blank_to_none(self.date_text),
            collection: blank_to_none(self.collection),
            summary: blank_to_none(self.summary),
            image_url: blank_to_none(self.image_url),
        };
        manuscript
            .validate()
            .map_err(|err| format!("manuscript {}: {err}", manuscript.inventory_code))?;
        Ok(manuscript)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CommentRow {
    pub(super) id: Uuid,
    pub(super) manuscript_code: String,
    pub(super) author_id: String,
    pub(super) author_name: String,
    pub(super) parent_id: Option<Uuid>,
    pub(super) body: String,
    pub(super) status: CommentStatus,
    pub(super) created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentRow {
    fn from(comment: &Comment) -> Self {
        Self {
            id: *comment.id.as_uuid(),
            manuscript_code: comment.manuscript.to_string(),
            author_id: comment.author_id.to_string(),
            author_name: comment.author_name.clone(),
            parent_id: comment.parent_id.map(|parent| *parent.as_uuid()),
            body: comment.body.clone(),
            status: comment.status,
            created_at: comment.created_at,
        }
    }
}

impl CommentRow {
    pub(super) fn into_domain(self) -> Result<Comment, String> {
        Ok(Comment {
            id: CommentId::from_uuid(self.id),
            manuscript: InventoryCode::new(&self.manuscript_code)
                .map_err(|err| format!("comment {}: {err}", self.id))?,
            author_id: UserId::new(&self.author_id)
                .map_err(|err| format!("comment {}: {err}", self.id))?,
            author_name: self.author_name,
            parent_id: self.parent_id.map(CommentId::from_uuid),
            body: self.body,
            status: self.status,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct GuestbookRow {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) origin: Option<String>,
    pub(super) message: String,
    pub(super) created_at: DateTime<Utc>,
}

impl From<&GuestbookEntry> for GuestbookRow {
    fn from(entry: &GuestbookEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            origin: entry.origin.clone(),
            message: entry.message.clone(),
            created_at: entry.created_at,
        }
    }
}

impl From<GuestbookRow> for GuestbookEntry {
    fn from(row: GuestbookRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            origin: row.origin,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

/// Decode every row, failing on the first invalid one.
pub(super) fn rows_into_domain<R, T>(
    rows: Vec<R>,
    convert: impl Fn(R) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    rows.into_iter().map(convert).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn token_grant_becomes_session_with_absolute_expiry() {
        let grant: TokenGrantDto = serde_json::from_value(json!({
            "access_token": "jwt",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {"id": "00000000-0000-0000-0000-000000000001", "email": "reader@archive.test"}
        }))
        .expect("grant decodes");

        let session = grant.into_session(now()).expect("session");
        assert_eq!(session.expires_at(), now() + Duration::hours(1));
        assert_eq!(session.refresh_token(), Some("refresh"));
        assert_eq!(session.user().email(), Some("reader@archive.test"));
    }

    #[test]
    fn sign_up_accepts_both_response_shapes() {
        let id = "00000000-0000-0000-0000-000000000002";
        let bare: SignUpDto = serde_json::from_value(json!({"id": id, "email": "a@b.test"}))
            .expect("bare user");
        let wrapped: SignUpDto = serde_json::from_value(json!({
            "access_token": "jwt",
            "expires_in": 60,
            "user": {"id": id}
        }))
        .expect("session");

        let (user, session) = bare.into_outcome(now()).expect("bare outcome");
        assert_eq!(user.id().as_ref(), id);
        assert!(session.is_none());

        let (user, session) = wrapped.into_outcome(now()).expect("session outcome");
        assert_eq!(user.id().as_ref(), id);
        let session = session.expect("session opened");
        assert_eq!(session.access_token(), "jwt");
        assert_eq!(session.expires_at(), now() + Duration::minutes(1));
    }

    #[test]
    fn auth_errors_prefer_the_human_message() {
        let dto: AuthErrorDto = serde_json::from_value(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        }))
        .expect("error body");
        assert_eq!(dto.into_message().as_deref(), Some("Invalid login credentials"));
    }

    #[test]
    fn unknown_profile_status_decodes_as_unknown() {
        let row: ProfileRow = serde_json::from_value(json!({
            "user_id": "00000000-0000-0000-0000-000000000001",
            "full_name": "Dewi",
            "domicile": "Semarang",
            "institution": "Undip",
            "occupation": "Lecturer",
            "phone": "08123456789",
            "alumni_unit": "Faculty of Letters",
            "alumni_year": null,
            "status": "suspended"
        }))
        .expect("row decodes");

        let profile = row.into_domain().expect("profile");
        assert_eq!(profile.status, VerificationStatus::Unknown);
        assert!(profile.is_alumni());
    }

    #[test]
    fn manuscript_rows_drop_blank_text_and_reject_bad_counts() {
        let row: ManuscriptRow = serde_json::from_value(json!({
            "inventory_code": "MS-1",
            "title": "Serat Menak",
            "author": "",
            "language": "Javanese",
            "script": null,
            "material": null,
            "page_count": 120,
            "date_text": null,
            "collection": null,
            "summary": "  ",
            "image_url": null
        }))
        .expect("row decodes");
        let manuscript = row.into_domain().expect("manuscript");
        assert_eq!(manuscript.author, None);
        assert_eq!(manuscript.summary, None);
        assert_eq!(manuscript.page_count, Some(120));

        let negative = ManuscriptRow {
            page_count: Some(-3),
            ..ManuscriptRow::from(&manuscript)
        };
        assert!(negative.into_domain().is_err());
    }
}
