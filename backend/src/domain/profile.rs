//! Application-level user profiles and their verification status.
//!
//! A profile is created when a registered user completes the profile form and
//! starts out `pending`. Administrators move it to `verified` or `rejected`;
//! only verified profiles unlock contributor features.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Earliest accepted alumni graduation year.
pub const ALUMNI_YEAR_MIN: i32 = 1900;
/// Latest accepted alumni graduation year.
pub const ALUMNI_YEAR_MAX: i32 = 2100;
const PHONE_DIGITS_MIN: usize = 8;
const PHONE_DIGITS_MAX: usize = 15;

/// Verification gate for registered users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Awaiting an administrator decision.
    Pending,
    /// Accepted as a trusted contributor.
    Verified,
    /// Declined by an administrator.
    Rejected,
    /// Any status string this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl VerificationStatus {
    /// Wire representation stored in the `profiles` table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors raised by [`ProfileDraft::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    /// A required text field was blank once trimmed.
    MissingField { field: &'static str },
    /// Phone number is not 8 to 15 digits.
    InvalidPhone,
    /// Alumni must name their unit.
    MissingAlumniUnit,
    /// Alumni year falls outside the accepted range.
    AlumniYearOutOfRange { year: i32 },
}

impl fmt::Display for ProfileValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "{field} must not be empty"),
            Self::InvalidPhone => write!(
                f,
                "phone number must contain {PHONE_DIGITS_MIN} to {PHONE_DIGITS_MAX} digits"
            ),
            Self::MissingAlumniUnit => write!(f, "alumni must provide their unit"),
            Self::AlumniYearOutOfRange { year } => write!(
                f,
                "alumni year {year} must be between {ALUMNI_YEAR_MIN} and {ALUMNI_YEAR_MAX}"
            ),
        }
    }
}

impl std::error::Error for ProfileValidationError {}

/// Alumni details attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlumniDetails {
    /// Unit or faculty the member graduated from.
    pub unit: String,
    /// Graduation year, when given.
    pub year: Option<i32>,
}

/// Validated registration form contents.
///
/// ## Invariants
/// - Text fields are trimmed and non-empty.
/// - `phone` holds only an optional leading `+` followed by 8 to 15 digits.
/// - `alumni` is present only for members who declared themselves alumni.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    full_name: String,
    domicile: String,
    institution: String,
    occupation: String,
    phone: String,
    alumni: Option<AlumniDetails>,
}

impl ProfileDraft {
    /// Start building a draft from raw form values.
    pub fn builder() -> ProfileDraftBuilder {
        ProfileDraftBuilder::default()
    }

    /// Attach the draft to a user, producing a `pending` profile.
    pub fn into_pending_profile(self, user_id: UserId) -> Profile {
        Profile {
            user_id,
            full_name: self.full_name,
            domicile: self.domicile,
            institution: self.institution,
            occupation: self.occupation,
            phone: self.phone,
            alumni: self.alumni,
            status: VerificationStatus::Pending,
        }
    }

    /// Normalised full name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Normalised phone number.
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Alumni details, if declared.
    pub fn alumni(&self) -> Option<&AlumniDetails> {
        self.alumni.as_ref()
    }
}

/// Builder collecting raw profile form fields before validation.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraftBuilder {
    full_name: String,
    domicile: String,
    institution: String,
    occupation: String,
    phone: String,
    is_alumni: bool,
    alumni_unit: Option<String>,
    alumni_year: Option<i32>,
}

impl ProfileDraftBuilder {
    /// Set the full name.
    pub fn full_name(mut self, value: impl Into<String>) -> Self {
        self.full_name = value.into();
        self
    }

    /// Set the domicile (city or region of residence).
    pub fn domicile(mut self, value: impl Into<String>) -> Self {
        self.domicile = value.into();
        self
    }

    /// Set the institutional affiliation.
    pub fn institution(mut self, value: impl Into<String>) -> Self {
        self.institution = value.into();
        self
    }

    /// Set the occupation.
    pub fn occupation(mut self, value: impl Into<String>) -> Self {
        self.occupation = value.into();
        self
    }

    /// Set the phone number as typed.
    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = value.into();
        self
    }

    /// Declare alumni membership with unit and optional year.
    pub fn alumni(mut self, unit: impl Into<String>, year: Option<i32>) -> Self {
        self.is_alumni = true;
        self.alumni_unit = Some(unit.into());
        self.alumni_year = year;
        self
    }

    /// Validate the collected fields.
    pub fn build(self) -> Result<ProfileDraft, ProfileValidationError> {
        let full_name = required("full name", &self.full_name)?;
        let domicile = required("domicile", &self.domicile)?;
        let institution = required("institution", &self.institution)?;
        let occupation = required("occupation", &self.occupation)?;
        let phone = normalise_phone(&self.phone)?;

        let alumni = if self.is_alumni {
            let unit = self
                .alumni_unit
                .as_deref()
                .map(str::trim)
                .filter(|unit| !unit.is_empty())
                .ok_or(ProfileValidationError::MissingAlumniUnit)?;
            if let Some(year) = self.alumni_year {
                if !(ALUMNI_YEAR_MIN..=ALUMNI_YEAR_MAX).contains(&year) {
                    return Err(ProfileValidationError::AlumniYearOutOfRange { year });
                }
            }
            Some(AlumniDetails {
                unit: unit.to_owned(),
                year: self.alumni_year,
            })
        } else {
            None
        };

        Ok(ProfileDraft {
            full_name,
            domicile,
            institution,
            occupation,
            phone,
            alumni,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ProfileValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProfileValidationError::MissingField { field });
    }
    Ok(trimmed.to_owned())
}

fn normalise_phone(raw: &str) -> Result<String, ProfileValidationError> {
    let trimmed = raw.trim();
    let (prefix, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let mut digits = String::with_capacity(rest.len());
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' => {}
            _ => return Err(ProfileValidationError::InvalidPhone),
        }
    }
    if !(PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits.len()) {
        return Err(ProfileValidationError::InvalidPhone);
    }
    Ok(format!("{prefix}{digits}"))
}

/// Stored profile for a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owner of the profile.
    pub user_id: UserId,
    /// Full legal or preferred name.
    pub full_name: String,
    /// City or region of residence.
    pub domicile: String,
    /// Institutional affiliation.
    pub institution: String,
    /// Occupation.
    pub occupation: String,
    /// Normalised phone number.
    pub phone: String,
    /// Alumni details, if the member is an alumnus.
    pub alumni: Option<AlumniDetails>,
    /// Verification gate.
    pub status: VerificationStatus,
}

impl Profile {
    /// Whether the member declared alumni status.
    pub fn is_alumni(&self) -> bool {
        self.alumni.is_some()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for profile drafts.
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn complete() -> ProfileDraftBuilder {
        ProfileDraft::builder()
            .full_name("  Siti Rahmawati ")
            .domicile("Yogyakarta")
            .institution("Universitas Gadjah Mada")
            .occupation("Philologist")
            .phone("+62 812-3456-7890")
    }

    #[rstest]
    fn builds_trimmed_draft(complete: ProfileDraftBuilder) {
        let draft = complete.build().expect("valid draft");
        assert_eq!(draft.full_name(), "Siti Rahmawati");
        assert_eq!(draft.phone(), "+6281234567890");
        assert!(draft.alumni().is_none());
    }

    #[rstest]
    fn pending_profile_carries_draft_fields(complete: ProfileDraftBuilder) {
        let user_id = UserId::random();
        let profile = complete
            .alumni("Faculty of Letters", Some(2012))
            .build()
            .expect("valid draft")
            .into_pending_profile(user_id.clone());
        assert_eq!(profile.user_id, user_id);
        assert_eq!(profile.status, VerificationStatus::Pending);
        assert!(profile.is_alumni());
    }

    #[rstest]
    #[case::blank_name(ProfileDraft::builder().full_name(" "), ProfileValidationError::MissingField { field: "full name" })]
    #[case::blank_domicile(ProfileDraft::builder().full_name("A"), ProfileValidationError::MissingField { field: "domicile" })]
    fn reports_first_missing_field(
        #[case] builder: ProfileDraftBuilder,
        #[case] expected: ProfileValidationError,
    ) {
        assert_eq!(builder.build(), Err(expected));
    }

    #[rstest]
    #[case("12345")]
    #[case("0812 3456 7890 1234 5")]
    #[case("08123x4567")]
    fn rejects_bad_phone_numbers(complete: ProfileDraftBuilder, #[case] phone: &str) {
        assert_eq!(
            complete.phone(phone).build(),
            Err(ProfileValidationError::InvalidPhone)
        );
    }

    #[rstest]
    fn alumni_require_unit(complete: ProfileDraftBuilder) {
        assert_eq!(
            complete.alumni("  ", None).build(),
            Err(ProfileValidationError::MissingAlumniUnit)
        );
    }

    #[rstest]
    #[case(1899)]
    #[case(2101)]
    fn alumni_year_is_bounded(complete: ProfileDraftBuilder, #[case] year: i32) {
        assert_eq!(
            complete.alumni("Letters", Some(year)).build(),
            Err(ProfileValidationError::AlumniYearOutOfRange { year })
        );
    }

    #[rstest]
    #[case("\"verified\"", VerificationStatus::Verified)]
    #[case("\"pending\"", VerificationStatus::Pending)]
    #[case("\"suspended\"", VerificationStatus::Unknown)]
    fn status_decodes_unknown_values(#[case] raw: &str, #[case] expected: VerificationStatus) {
        let status: VerificationStatus = serde_json::from_str(raw).expect("status decodes");
        assert_eq!(status, expected);
    }
}
