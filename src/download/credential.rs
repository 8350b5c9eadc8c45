//! Download credentials.
//!
//! Three distinct kinds, never interchangeable:
//!
//! | kind            | cookie          | path       | value                        |
//! |-----------------|-----------------|------------|------------------------------|
//! | `FilePassword`  | `dg_pw_{id}`    | `/d/{id}`  | `{exp}:{fingerprint}`        |
//! | `FileSession`   | `dg_dl_{id}`    | `/d/{id}`  | `{exp}:{id}:{email}`         |
//! | `GlobalSession` | `dg_session`    | `/`        | `{exp}:{email}`              |
//!
//! Cookies are signed by the web layer, so values cannot be forged. Expiry is
//! absolute and checked here on every request; credentials are never refreshed.

use crate::auth::fingerprint;
use crate::file::FileRecord;

/// Name of the global download-account session cookie.
pub const GLOBAL_SESSION_COOKIE: &str = "dg_session";

const PASSWORD_COOKIE_PREFIX: &str = "dg_pw_";
const FILE_SESSION_COOKIE_PREFIX: &str = "dg_dl_";

/// Kind of download credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// The file's password was entered. Scoped to one file.
    FilePassword,
    /// A download account signed in for one file.
    FileSession,
    /// A download account session usable outside a single file.
    GlobalSession,
}

impl CredentialKind {
    /// Cookie name for this kind.
    pub fn cookie_name(&self, file_id: Option<&str>) -> String {
        match self {
            CredentialKind::FilePassword => {
                format!("{PASSWORD_COOKIE_PREFIX}{}", file_id.unwrap_or_default())
            }
            CredentialKind::FileSession => {
                format!("{FILE_SESSION_COOKIE_PREFIX}{}", file_id.unwrap_or_default())
            }
            CredentialKind::GlobalSession => GLOBAL_SESSION_COOKIE.to_string(),
        }
    }

    /// Cookie path for this kind.
    pub fn cookie_path(&self, file_id: Option<&str>) -> String {
        match self {
            CredentialKind::FilePassword | CredentialKind::FileSession => {
                format!("/d/{}", file_id.unwrap_or_default())
            }
            CredentialKind::GlobalSession => "/".to_string(),
        }
    }
}

/// A credential the caller should hand to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Kind.
    pub kind: CredentialKind,
    /// File scope, for per-file kinds.
    pub file_id: Option<String>,
    /// Cookie value.
    pub value: String,
    /// Absolute expiry (unix seconds).
    pub expires_at: i64,
}

impl IssuedCredential {
    /// Cookie name.
    pub fn cookie_name(&self) -> String {
        self.kind.cookie_name(self.file_id.as_deref())
    }

    /// Cookie path.
    pub fn cookie_path(&self) -> String {
        self.kind.cookie_path(self.file_id.as_deref())
    }

    /// Seconds until expiry, for `Max-Age`.
    pub fn max_age_secs(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

/// Credentials presented with a retrieval request.
#[derive(Debug, Clone, Default)]
pub struct PresentedCredentials {
    /// Value of the file's password cookie.
    pub file_password: Option<String>,
    /// Value of the file's session cookie.
    pub file_session: Option<String>,
    /// Value of the global session cookie.
    pub global_session: Option<String>,
}

fn password_fingerprint(file: &FileRecord) -> String {
    fingerprint(&[
        "file-password",
        &file.id,
        file.password.as_deref().unwrap_or_default(),
    ])
}

/// Split `{exp}:{rest}` and reject expired values.
fn split_unexpired(value: &str, now: i64) -> Option<&str> {
    let (exp, rest) = value.split_once(':')?;
    let exp: i64 = exp.parse().ok()?;
    (now <= exp).then_some(rest)
}

/// Issue a "password verified" credential for `file`.
///
/// Bound to the stored password, so changing the password invalidates it.
pub fn issue_file_password(file: &FileRecord, now: i64, ttl_secs: i64) -> IssuedCredential {
    let expires_at = now + ttl_secs;
    IssuedCredential {
        kind: CredentialKind::FilePassword,
        file_id: Some(file.id.clone()),
        value: format!("{expires_at}:{}", password_fingerprint(file)),
        expires_at,
    }
}

/// Whether `value` is a live "password verified" credential for `file`.
pub fn verify_file_password(file: &FileRecord, value: &str, now: i64) -> bool {
    split_unexpired(value, now).is_some_and(|fp| {
        crate::auth::constant_time_eq(fp.as_bytes(), password_fingerprint(file).as_bytes())
    })
}

/// Issue a per-file download session for `email`.
pub fn issue_file_session(file_id: &str, email: &str, now: i64, ttl_secs: i64) -> IssuedCredential {
    let expires_at = now + ttl_secs;
    IssuedCredential {
        kind: CredentialKind::FileSession,
        file_id: Some(file_id.to_string()),
        value: format!("{expires_at}:{file_id}:{email}"),
        expires_at,
    }
}

/// Email held by a live per-file session for `file_id`.
pub fn file_session_email(value: &str, file_id: &str, now: i64) -> Option<String> {
    let rest = split_unexpired(value, now)?;
    let (scope, email) = rest.split_once(':')?;
    (scope == file_id && !email.is_empty()).then(|| email.to_string())
}

/// Issue a global download-account session for `email`.
pub fn issue_global_session(email: &str, now: i64, ttl_secs: i64) -> IssuedCredential {
    let expires_at = now + ttl_secs;
    IssuedCredential {
        kind: CredentialKind::GlobalSession,
        file_id: None,
        value: format!("{expires_at}:{email}"),
        expires_at,
    }
}

/// Email held by a live global session.
pub fn global_session_email(value: &str, now: i64) -> Option<String> {
    split_unexpired(value, now)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
}
