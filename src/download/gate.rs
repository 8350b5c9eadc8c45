//! Gate chain executor.
//!
//! Decides whether a retrieval request may receive a file's bytes:
//!
//! ```text
//! Start -> PasswordPending -> AuthPending -> Granted
//! ```
//!
//! Availability is checked first and is terminal. The password gate only runs
//! for files with a password, the auth gate only for files with
//! `require_auth`. Quota is consumed in [`GateChain::deliver`], never while
//! walking the gates.

use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use super::credential::{
    file_session_email, global_session_email, issue_file_password, issue_file_session,
    issue_global_session, verify_file_password, IssuedCredential, PresentedCredentials,
};
use super::log::{DownloadLogRepository, NewDownloadLog};
use crate::account::{DownloadAccount, DownloadAccountDirectory};
use crate::audit::{AuditAction, AuditEmitter, ClientInfo, EntityType, NewAuditEntry};
use crate::auth::SecretBox;
use crate::db::User;
use crate::file::{
    evaluate, Availability, DownloadCounters, FileRecord, FileRepository, QuotaError, QuotaLedger,
};
use crate::notify::{Notification, NotificationPool};
use crate::team::TeamAccessResolver;
use crate::{DropgateError, Result};

/// Credential lifetimes, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// "Password verified" credential.
    pub password_ttl_secs: i64,
    /// Per-file download session.
    pub session_ttl_secs: i64,
    /// Global download-account session.
    pub account_ttl_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            password_ttl_secs: 24 * 3600,
            session_ttl_secs: 24 * 3600,
            account_ttl_secs: 30 * 24 * 3600,
        }
    }
}

/// Form fields submitted to a gate.
#[derive(Debug, Clone, Default)]
pub struct CredentialSubmission {
    /// File password.
    pub password: Option<String>,
    /// Download account email.
    pub email: Option<String>,
    /// Display name, required to register.
    pub name: Option<String>,
    /// Download account password.
    pub account_password: Option<String>,
}

impl CredentialSubmission {
    fn field(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn file_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    fn email(&self) -> Option<&str> {
        Self::field(&self.email)
    }
}

/// One retrieval attempt.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// Requested file.
    pub file_id: String,
    /// Credentials the client presented.
    pub credentials: PresentedCredentials,
    /// Form submission, for POST requests.
    pub submission: Option<CredentialSubmission>,
    /// Whether the global session may stand in for a per-file session.
    pub direct: bool,
    /// Signed-in system user, if any.
    pub user: Option<User>,
    /// Client information for logging.
    pub client: ClientInfo,
    /// Request time (unix seconds).
    pub now: i64,
}

/// Position in the gate chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Availability check.
    Start,
    /// Waiting for the file password.
    PasswordPending,
    /// Waiting for a download account.
    AuthPending,
    /// All gates passed.
    Granted,
}

impl GateState {
    /// Name used in audit details.
    pub fn as_str(self) -> &'static str {
        match self {
            GateState::Start => "start",
            GateState::PasswordPending => "password_pending",
            GateState::AuthPending => "auth_pending",
            GateState::Granted => "granted",
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Unknown or trashed file.
    NotFound,
    /// Past its expiry time.
    ExpiredByTime,
    /// No downloads left.
    ExpiredByQuota,
}

impl DenyReason {
    /// Human readable reason.
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NotFound => "file not found",
            DenyReason::ExpiredByTime => "file has expired",
            DenyReason::ExpiredByQuota => "download limit reached",
        }
    }

    /// Terminal reason for an unavailable file.
    pub fn for_availability(availability: Availability) -> Option<Self> {
        match availability {
            Availability::Active => None,
            Availability::ExpiredByTime => Some(DenyReason::ExpiredByTime),
            Availability::ExpiredByQuota => Some(DenyReason::ExpiredByQuota),
        }
    }
}

/// What the client has to supply next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// The file password.
    Password,
    /// A download account sign-in or registration.
    Login,
}

impl Prompt {
    /// Status name returned to clients.
    pub fn as_str(self) -> &'static str {
        match self {
            Prompt::Password => "password_required",
            Prompt::Login => "login_required",
        }
    }
}

/// Proof that every gate passed. Redeemed by [`GateChain::deliver`].
#[derive(Debug, Clone)]
pub struct DeliveryTicket {
    /// File to deliver, as seen when the gates passed.
    pub file: FileRecord,
    /// Signed-in download account, when the auth gate ran.
    pub account: Option<DownloadAccount>,
    /// System user who bypassed the gates.
    pub user: Option<User>,
}

/// Result of walking the gates.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Terminal refusal.
    Denied(DenyReason),
    /// More credentials needed.
    PromptCredentials {
        /// Which form to show.
        prompt: Prompt,
        /// Inline error from the previous submission.
        error: Option<String>,
    },
    /// Ready to stream.
    Cleared(DeliveryTicket),
}

/// Outcome plus the credentials to hand back regardless of outcome.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Outcome.
    pub outcome: GateOutcome,
    /// Credentials issued while walking the gates.
    pub issued: Vec<IssuedCredential>,
}

/// A recorded delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Delivered file.
    pub file: FileRecord,
    /// Counters after the delivery.
    pub counters: DownloadCounters,
}

enum AuthStep {
    Passed(DownloadAccount),
    Stop(GateOutcome),
}

/// Walks the gate chain and records deliveries.
#[derive(Debug, Clone)]
pub struct GateChain {
    pool: SqlitePool,
    teams: TeamAccessResolver,
    accounts: DownloadAccountDirectory,
    audit: AuditEmitter,
    notifications: NotificationPool,
    secrets: SecretBox,
    config: GateConfig,
}

impl GateChain {
    /// Wire a gate chain over the given pool.
    pub fn new(
        pool: SqlitePool,
        secrets: SecretBox,
        notifications: NotificationPool,
        config: GateConfig,
    ) -> Self {
        Self {
            teams: TeamAccessResolver::new(pool.clone()),
            accounts: DownloadAccountDirectory::new(pool.clone()),
            audit: AuditEmitter::new(pool.clone()),
            pool,
            notifications,
            secrets,
            config,
        }
    }

    /// Availability of a file without walking any gate.
    ///
    /// Returns `None` for unknown or trashed files.
    pub async fn availability(
        &self,
        file_id: &str,
        now: i64,
    ) -> Result<Option<(FileRecord, Availability)>> {
        let file = FileRepository::new(&self.pool).get(file_id).await?;
        Ok(file.map(|f| {
            let availability = evaluate(&f, now);
            (f, availability)
        }))
    }

    fn entry(
        &self,
        action: AuditAction,
        file_id: &str,
        request: &RetrievalRequest,
        state: GateState,
    ) -> NewAuditEntry {
        let entry = NewAuditEntry::new(action, EntityType::File)
            .entity(file_id)
            .client(&request.client)
            .details(json!({ "state": state.as_str() }));
        match &request.user {
            Some(user) => entry.actor(Some(user.id), Some(&user.username)),
            None => entry,
        }
    }

    async fn deny(
        &self,
        file_id: &str,
        request: &RetrievalRequest,
        state: GateState,
        reason: DenyReason,
    ) -> GateOutcome {
        self.audit
            .record(
                self.entry(AuditAction::FileDownload, file_id, request, state)
                    .failed(reason.message()),
            )
            .await;
        GateOutcome::Denied(reason)
    }

    /// Walk the gates for one request.
    pub async fn evaluate(&self, request: &RetrievalRequest) -> Result<GateDecision> {
        let mut issued = Vec::new();
        let file_id = request.file_id.as_str();

        // Start
        let Some((file, availability)) = self.availability(file_id, request.now).await? else {
            let outcome = self
                .deny(file_id, request, GateState::Start, DenyReason::NotFound)
                .await;
            return Ok(GateDecision { outcome, issued });
        };
        if let Some(reason) = DenyReason::for_availability(availability) {
            debug!(file_id, availability = availability.as_str(), "File not available");
            let outcome = self.deny(file_id, request, GateState::Start, reason).await;
            return Ok(GateDecision { outcome, issued });
        }

        if let Some(user) = &request.user {
            if self.teams.can_access(file_id, user.id).await? {
                debug!(file_id, user_id = user.id, "System user bypasses gates");
                let outcome = GateOutcome::Cleared(DeliveryTicket {
                    file,
                    account: None,
                    user: Some(user.clone()),
                });
                return Ok(GateDecision { outcome, issued });
            }
        }

        // PasswordPending
        if file.has_password() {
            let verified = request
                .credentials
                .file_password
                .as_deref()
                .is_some_and(|v| verify_file_password(&file, v, request.now));

            if !verified {
                let submitted = request
                    .submission
                    .as_ref()
                    .and_then(CredentialSubmission::file_password);
                let sealed = file.password.as_deref().unwrap_or_default();

                match submitted {
                    Some(password) if self.secrets.matches(sealed, password) => {
                        self.audit
                            .record(self.entry(
                                AuditAction::FilePasswordCheck,
                                file_id,
                                request,
                                GateState::PasswordPending,
                            ))
                            .await;
                        issued.push(issue_file_password(
                            &file,
                            request.now,
                            self.config.password_ttl_secs,
                        ));
                    }
                    Some(_) => {
                        self.audit
                            .record(
                                self.entry(
                                    AuditAction::FilePasswordCheck,
                                    file_id,
                                    request,
                                    GateState::PasswordPending,
                                )
                                .failed("incorrect password"),
                            )
                            .await;
                        let outcome = GateOutcome::PromptCredentials {
                            prompt: Prompt::Password,
                            error: Some("Incorrect password".to_string()),
                        };
                        return Ok(GateDecision { outcome, issued });
                    }
                    None => {
                        self.audit
                            .record(
                                self.entry(
                                    AuditAction::FileDownload,
                                    file_id,
                                    request,
                                    GateState::PasswordPending,
                                )
                                .failed("password required"),
                            )
                            .await;
                        let outcome = GateOutcome::PromptCredentials {
                            prompt: Prompt::Password,
                            error: None,
                        };
                        return Ok(GateDecision { outcome, issued });
                    }
                }
            }
        }

        // AuthPending
        let account = if file.require_auth {
            match self.auth_gate(&file, request, &mut issued).await? {
                AuthStep::Passed(account) => Some(account),
                AuthStep::Stop(outcome) => return Ok(GateDecision { outcome, issued }),
            }
        } else {
            None
        };

        let outcome = GateOutcome::Cleared(DeliveryTicket {
            file,
            account,
            user: None,
        });
        Ok(GateDecision { outcome, issued })
    }

    async fn auth_gate(
        &self,
        file: &FileRecord,
        request: &RetrievalRequest,
        issued: &mut Vec<IssuedCredential>,
    ) -> Result<AuthStep> {
        let file_id = file.id.as_str();
        let now = request.now;

        let session_email = request
            .credentials
            .file_session
            .as_deref()
            .and_then(|v| file_session_email(v, file_id, now))
            .or_else(|| {
                request
                    .direct
                    .then_some(request.credentials.global_session.as_deref())
                    .flatten()
                    .and_then(|v| global_session_email(v, now))
            });
        if let Some(email) = session_email {
            // Anonymized or deactivated accounts fall through to the prompt.
            if let Some(account) = self.accounts.find_active_by_email(&email).await? {
                return Ok(AuthStep::Passed(account));
            }
        }

        let Some(submission) = request.submission.as_ref() else {
            return Ok(AuthStep::Stop(self.login_prompt(file_id, request, None).await));
        };
        let Some(email) = submission.email() else {
            return Ok(AuthStep::Stop(self.login_prompt(file_id, request, None).await));
        };
        let password = submission.account_password.as_deref().unwrap_or_default();

        let account_entry = |action: AuditAction| {
            NewAuditEntry::new(action, EntityType::DownloadAccount)
                .client(&request.client)
                .details(json!({ "file_id": file_id, "state": GateState::AuthPending.as_str() }))
        };

        if self.accounts.email_registered(email).await? {
            return match self.accounts.authenticate(email, password).await {
                Ok(account) => {
                    self.audit
                        .record(
                            account_entry(AuditAction::AccountLogin)
                                .entity(account.id)
                                .actor(Some(account.id), Some(&account.email)),
                        )
                        .await;
                    issued.push(issue_file_session(
                        file_id,
                        &account.email,
                        now,
                        self.config.session_ttl_secs,
                    ));
                    Ok(AuthStep::Passed(account))
                }
                Err(DropgateError::InvalidCredentials) => {
                    self.audit
                        .record(
                            account_entry(AuditAction::AccountLogin)
                                .actor(None, Some(email))
                                .failed("invalid credentials"),
                        )
                        .await;
                    Ok(AuthStep::Stop(GateOutcome::PromptCredentials {
                        prompt: Prompt::Login,
                        error: Some("Invalid email or password".to_string()),
                    }))
                }
                Err(e) => Err(e),
            };
        }

        let name = CredentialSubmission::field(&submission.name);
        let (Some(name), false) = (name, password.is_empty()) else {
            let outcome = self
                .login_prompt(
                    file_id,
                    request,
                    Some("Name and password are required to create an account".to_string()),
                )
                .await;
            return Ok(AuthStep::Stop(outcome));
        };

        match self.accounts.create_account(name, email, password).await {
            Ok(account) => {
                self.audit
                    .record(
                        account_entry(AuditAction::AccountCreate)
                            .entity(account.id)
                            .actor(Some(account.id), Some(&account.email)),
                    )
                    .await;
                info!(file_id, account_id = account.id, "Download account registered at gate");
                issued.push(issue_file_session(
                    file_id,
                    &account.email,
                    now,
                    self.config.session_ttl_secs,
                ));
                issued.push(issue_global_session(
                    &account.email,
                    now,
                    self.config.account_ttl_secs,
                ));
                Ok(AuthStep::Passed(account))
            }
            Err(DropgateError::Validation(msg)) | Err(DropgateError::Conflict(msg)) => {
                self.audit
                    .record(
                        account_entry(AuditAction::AccountCreate)
                            .actor(None, Some(email))
                            .failed(msg.clone()),
                    )
                    .await;
                let outcome = GateOutcome::PromptCredentials {
                    prompt: Prompt::Login,
                    error: Some(msg),
                };
                Ok(AuthStep::Stop(outcome))
            }
            Err(e) => Err(e),
        }
    }

    async fn login_prompt(
        &self,
        file_id: &str,
        request: &RetrievalRequest,
        error: Option<String>,
    ) -> GateOutcome {
        let reason = error.as_deref().unwrap_or("login required");
        self.audit
            .record(
                self.entry(AuditAction::FileDownload, file_id, request, GateState::AuthPending)
                    .failed(reason),
            )
            .await;
        GateOutcome::PromptCredentials {
            prompt: Prompt::Login,
            error,
        }
    }

    /// Consume the quota and append the log row in one transaction.
    ///
    /// Either both are committed or neither is.
    async fn record_delivery(
        &self,
        log: &NewDownloadLog<'_>,
    ) -> std::result::Result<DownloadCounters, QuotaError> {
        let database = |e: sqlx::Error| QuotaError::Database(e.to_string());

        let mut tx = self.pool.begin().await.map_err(database)?;
        let counters = QuotaLedger::consume(&mut tx, log.file_id).await?;
        if let Err(e) = DownloadLogRepository::insert_on(&mut tx, log).await {
            tx.rollback().await.map_err(database)?;
            return Err(QuotaError::Database(e.to_string()));
        }
        tx.commit().await.map_err(database)?;
        Ok(counters)
    }

    /// Consume one download and record it.
    ///
    /// Call immediately before streaming. Fails with `Gone` when another
    /// request took the last download first.
    pub async fn deliver(
        &self,
        ticket: DeliveryTicket,
        client: &ClientInfo,
        now: i64,
    ) -> Result<Delivery> {
        let DeliveryTicket {
            mut file,
            account,
            user,
        } = ticket;

        let mut entry = NewAuditEntry::new(AuditAction::FileDownload, EntityType::File)
            .entity(&file.id)
            .client(client);
        entry = match (&account, &user) {
            (Some(a), _) => entry.actor(Some(a.id), Some(&a.email)),
            (None, Some(u)) => entry.actor(Some(u.id), Some(&u.username)),
            (None, None) => entry,
        };

        let log = NewDownloadLog {
            file_id: &file.id,
            account_id: account.as_ref().map(|a| a.id),
            ip: &client.ip,
            user_agent: &client.user_agent,
            downloaded_at: now,
        };
        let counters = match self.record_delivery(&log).await {
            Ok(counters) => counters,
            Err(e) => {
                let state = GateState::Granted.as_str();
                self.audit
                    .record(
                        entry
                            .details(json!({ "state": state }))
                            .failed(e.to_string()),
                    )
                    .await;
                return Err(match e {
                    QuotaError::AlreadyExhausted => {
                        DropgateError::Gone(DenyReason::ExpiredByQuota.message().to_string())
                    }
                    other => {
                        error!(file_id = %file.id, error = %other, "Failed to record delivery");
                        other.into()
                    }
                });
            }
        };

        file.downloads_remaining = counters.downloads_remaining;
        file.download_count = counters.download_count;

        self.audit
            .record(entry.details(json!({
                "state": GateState::Granted.as_str(),
                "download_count": counters.download_count,
                "downloads_remaining": counters.downloads_remaining,
                "unlimited_downloads": counters.unlimited_downloads,
                "authenticated": account.is_some(),
                "system_user": user.is_some(),
            })))
            .await;

        info!(
            file_id = %file.id,
            download_count = counters.download_count,
            "File delivered"
        );

        if file.notify_on_download {
            self.notifications.dispatch(Notification::FileDownloaded {
                file_id: file.id.clone(),
                file_name: file.name.clone(),
                owner_id: file.owner_id,
                account_email: account.map(|a| a.email),
                ip: client.ip.clone(),
                downloaded_at: now,
            });
        }

        Ok(Delivery { file, counters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLogRepository, AuditQuery};
    use crate::db::{NewUser, UserRepository};
    use crate::download::credential::CredentialKind;
    use crate::file::{FileSettings, NewFileRecord};
    use crate::team::TeamRole;
    use crate::Database;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        db: Database,
        gate: GateChain,
        secrets: SecretBox,
        owner_id: i64,
    }

    async fn setup() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let owner = UserRepository::new(db.pool())
            .create(&NewUser::new("owner", "hash"))
            .await
            .unwrap();
        let secrets = SecretBox::from_secret(SECRET);
        let gate = GateChain::new(
            db.pool().clone(),
            secrets.clone(),
            NotificationPool::disabled(),
            GateConfig::default(),
        );
        Fixture {
            db,
            gate,
            secrets,
            owner_id: owner.id,
        }
    }

    async fn add_file(fx: &Fixture, id: &str, settings: FileSettings) -> FileRecord {
        let mut settings = settings;
        settings.password = settings
            .password
            .as_deref()
            .map(|p| fx.secrets.seal(p).unwrap());
        FileRepository::new(fx.db.pool())
            .create(&NewFileRecord {
                id: id.to_string(),
                name: "report.pdf".to_string(),
                stored_name: "x.pdf".to_string(),
                size: 3,
                content_type: None,
                owner_id: fx.owner_id,
                settings,
            })
            .await
            .unwrap()
    }

    fn limited(downloads: i64) -> FileSettings {
        FileSettings {
            unlimited_time: true,
            downloads,
            ..Default::default()
        }
    }

    fn request(file_id: &str) -> RetrievalRequest {
        RetrievalRequest {
            file_id: file_id.to_string(),
            credentials: PresentedCredentials::default(),
            submission: None,
            direct: false,
            user: None,
            client: ClientInfo::new("10.0.0.1", "test"),
            now: NOW,
        }
    }

    fn submit(file_id: &str, submission: CredentialSubmission) -> RetrievalRequest {
        RetrievalRequest {
            submission: Some(submission),
            ..request(file_id)
        }
    }

    fn cleared(decision: GateDecision) -> DeliveryTicket {
        match decision.outcome {
            GateOutcome::Cleared(ticket) => ticket,
            other => panic!("expected Cleared, got {other:?}"),
        }
    }

    async fn remaining(fx: &Fixture, id: &str) -> i64 {
        FileRepository::new(fx.db.pool())
            .get(id)
            .await
            .unwrap()
            .unwrap()
            .downloads_remaining
    }

    #[tokio::test]
    async fn test_unknown_file_is_denied() {
        let fx = setup().await;
        let decision = fx.gate.evaluate(&request("missing")).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::Denied(DenyReason::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_open_file_goes_straight_to_granted() {
        let fx = setup().await;
        add_file(&fx, "open", limited(2)).await;

        let ticket = cleared(fx.gate.evaluate(&request("open")).await.unwrap());
        assert!(ticket.account.is_none());
        assert_eq!(remaining(&fx, "open").await, 2);

        let delivery = fx
            .gate
            .deliver(ticket, &ClientInfo::default(), NOW)
            .await
            .unwrap();
        assert_eq!(delivery.counters.downloads_remaining, 1);
        assert_eq!(delivery.file.download_count, 1);

        let logs = DownloadLogRepository::new(fx.db.pool())
            .list_for_file("open")
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].authenticated);
    }

    #[tokio::test]
    async fn test_quota_sequence_then_denied() {
        let fx = setup().await;
        add_file(&fx, "q", limited(3)).await;

        for _ in 0..3 {
            let ticket = cleared(fx.gate.evaluate(&request("q")).await.unwrap());
            fx.gate
                .deliver(ticket, &ClientInfo::default(), NOW)
                .await
                .unwrap();
        }
        let decision = fx.gate.evaluate(&request("q")).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::Denied(DenyReason::ExpiredByQuota)
        ));
    }

    #[tokio::test]
    async fn test_time_expiry_beats_quota() {
        let fx = setup().await;
        add_file(
            &fx,
            "t",
            FileSettings {
                expire_at: NOW - 1,
                downloads: 0,
                ..Default::default()
            },
        )
        .await;

        let decision = fx.gate.evaluate(&request("t")).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::Denied(DenyReason::ExpiredByTime)
        ));
    }

    #[tokio::test]
    async fn test_stale_ticket_is_gone() {
        let fx = setup().await;
        add_file(&fx, "last", limited(1)).await;

        let first = cleared(fx.gate.evaluate(&request("last")).await.unwrap());
        let second = cleared(fx.gate.evaluate(&request("last")).await.unwrap());

        fx.gate
            .deliver(first, &ClientInfo::default(), NOW)
            .await
            .unwrap();
        assert!(matches!(
            fx.gate.deliver(second, &ClientInfo::default(), NOW).await,
            Err(DropgateError::Gone(_))
        ));

        let logs = DownloadLogRepository::new(fx.db.pool())
            .list_for_file("last")
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_without_log_row_is_rolled_back() {
        let fx = setup().await;
        add_file(&fx, "nolog", limited(2)).await;
        let ticket = cleared(fx.gate.evaluate(&request("nolog")).await.unwrap());

        sqlx::query("DROP TABLE download_logs")
            .execute(fx.db.pool())
            .await
            .unwrap();

        assert!(matches!(
            fx.gate.deliver(ticket, &ClientInfo::default(), NOW).await,
            Err(DropgateError::Database(_))
        ));
        let file = FileRepository::new(fx.db.pool())
            .get("nolog")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(file.downloads_remaining, 2);
        assert_eq!(file.download_count, 0);
    }

    #[tokio::test]
    async fn test_password_gate() {
        let fx = setup().await;
        add_file(
            &fx,
            "pw",
            FileSettings {
                password: Some("hunter22".to_string()),
                ..limited(5)
            },
        )
        .await;

        let decision = fx.gate.evaluate(&request("pw")).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Password,
                error: None
            }
        ));

        let wrong = CredentialSubmission {
            password: Some("nope".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("pw", wrong)).await.unwrap();
        assert!(decision.issued.is_empty());
        assert!(matches!(
            decision.outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Password,
                error: Some(_)
            }
        ));
        assert_eq!(remaining(&fx, "pw").await, 5);

        let right = CredentialSubmission {
            password: Some("hunter22".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("pw", right)).await.unwrap();
        assert_eq!(decision.issued.len(), 1);
        assert_eq!(decision.issued[0].kind, CredentialKind::FilePassword);
        let cookie = decision.issued[0].value.clone();
        cleared(decision);

        // The issued credential alone is enough afterwards.
        let mut again = request("pw");
        again.credentials.file_password = Some(cookie);
        cleared(fx.gate.evaluate(&again).await.unwrap());
        assert_eq!(remaining(&fx, "pw").await, 5);
    }

    #[tokio::test]
    async fn test_auth_gate_registration_then_login() {
        let fx = setup().await;
        add_file(
            &fx,
            "auth",
            FileSettings {
                require_auth: true,
                ..limited(5)
            },
        )
        .await;

        let decision = fx.gate.evaluate(&request("auth")).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Login,
                error: None
            }
        ));

        // Unknown email without a name is prompted again.
        let incomplete = CredentialSubmission {
            email: Some("jane@example.com".to_string()),
            account_password: Some("password1".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("auth", incomplete)).await.unwrap();
        assert!(matches!(
            decision.outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Login,
                error: Some(_)
            }
        ));

        let register = CredentialSubmission {
            email: Some("jane@example.com".to_string()),
            name: Some("Jane".to_string()),
            account_password: Some("password1".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("auth", register)).await.unwrap();
        let kinds: Vec<_> = decision.issued.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![CredentialKind::FileSession, CredentialKind::GlobalSession]
        );
        let global = decision.issued[1].value.clone();
        let ticket = cleared(decision);
        assert_eq!(ticket.account.unwrap().email, "jane@example.com");

        // Existing account: per-file session only.
        let login = CredentialSubmission {
            email: Some("JANE@example.com".to_string()),
            account_password: Some("password1".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("auth", login)).await.unwrap();
        let kinds: Vec<_> = decision.issued.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CredentialKind::FileSession]);
        cleared(decision);

        // Wrong password re-prompts and nothing is issued.
        let wrong = CredentialSubmission {
            email: Some("jane@example.com".to_string()),
            account_password: Some("wrong-password".to_string()),
            ..Default::default()
        };
        let decision = fx.gate.evaluate(&submit("auth", wrong)).await.unwrap();
        assert!(decision.issued.is_empty());
        match decision.outcome {
            GateOutcome::PromptCredentials { prompt, error } => {
                assert_eq!(prompt, Prompt::Login);
                assert_eq!(error.as_deref(), Some("Invalid email or password"));
            }
            other => panic!("expected login prompt, got {other:?}"),
        }

        // The global session only counts for direct requests.
        let mut via_global = request("auth");
        via_global.credentials.global_session = Some(global);
        assert!(matches!(
            fx.gate.evaluate(&via_global).await.unwrap().outcome,
            GateOutcome::PromptCredentials { .. }
        ));
        via_global.direct = true;
        cleared(fx.gate.evaluate(&via_global).await.unwrap());

        assert_eq!(remaining(&fx, "auth").await, 5);
    }

    #[tokio::test]
    async fn test_anonymized_account_session_no_longer_passes() {
        let fx = setup().await;
        add_file(
            &fx,
            "auth",
            FileSettings {
                require_auth: true,
                ..limited(5)
            },
        )
        .await;
        let accounts = DownloadAccountDirectory::new(fx.db.pool().clone());
        let account = accounts
            .create_account("Jane", "jane@example.com", "password1")
            .await
            .unwrap();
        let session = issue_file_session("auth", &account.email, NOW, 3600);

        accounts.anonymize(account.id).await.unwrap();

        let mut req = request("auth");
        req.credentials.file_session = Some(session.value);
        assert!(matches!(
            fx.gate.evaluate(&req).await.unwrap().outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Login,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_password_then_auth_keeps_password_credential() {
        let fx = setup().await;
        add_file(
            &fx,
            "both",
            FileSettings {
                password: Some("hunter22".to_string()),
                require_auth: true,
                ..limited(5)
            },
        )
        .await;

        let decision = fx
            .gate
            .evaluate(&submit(
                "both",
                CredentialSubmission {
                    password: Some("hunter22".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        assert_eq!(decision.issued.len(), 1);
        assert!(matches!(
            decision.outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Login,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_team_member_bypasses_gates() {
        let fx = setup().await;
        add_file(
            &fx,
            "team",
            FileSettings {
                password: Some("hunter22".to_string()),
                require_auth: true,
                ..limited(5)
            },
        )
        .await;

        let users = UserRepository::new(fx.db.pool());
        let member = users.create(&NewUser::new("member", "hash")).await.unwrap();
        let teams = TeamAccessResolver::new(fx.db.pool().clone());
        let team = teams.create_team("Ops", fx.owner_id).await.unwrap();
        teams
            .add_member(team.id, fx.owner_id, member.id, TeamRole::Member)
            .await
            .unwrap();
        teams
            .share_file_to_team("team", team.id, fx.owner_id)
            .await
            .unwrap();

        let mut req = request("team");
        req.user = Some(member.clone());
        let ticket = cleared(fx.gate.evaluate(&req).await.unwrap());
        assert_eq!(ticket.user.as_ref().map(|u| u.id), Some(member.id));

        // Logged as unauthenticated; the audit entry names the user.
        fx.gate
            .deliver(ticket, &ClientInfo::default(), NOW)
            .await
            .unwrap();
        let logs = DownloadLogRepository::new(fx.db.pool())
            .list_for_file("team")
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].authenticated);

        let query = AuditQuery {
            action: Some(AuditAction::FileDownload),
            entity_id: Some("team".to_string()),
            success: Some(true),
            ..Default::default()
        };
        let rows = AuditLogRepository::new(fx.db.pool())
            .list(&query)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actor_id, Some(member.id));
        let details: serde_json::Value =
            serde_json::from_str(rows[0].details.as_deref().unwrap()).unwrap();
        assert_eq!(details["authenticated"], false);
        assert_eq!(details["system_user"], true);

        teams
            .remove_member(team.id, fx.owner_id, member.id)
            .await
            .unwrap();
        assert!(matches!(
            fx.gate.evaluate(&req).await.unwrap().outcome,
            GateOutcome::PromptCredentials {
                prompt: Prompt::Password,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failures_are_audited() {
        let fx = setup().await;
        add_file(
            &fx,
            "pw",
            FileSettings {
                password: Some("hunter22".to_string()),
                ..limited(5)
            },
        )
        .await;

        fx.gate.evaluate(&request("missing")).await.unwrap();
        fx.gate.evaluate(&request("pw")).await.unwrap();

        let query = AuditQuery {
            success: Some(false),
            ..Default::default()
        };
        let rows = AuditLogRepository::new(fx.db.pool())
            .list(&query)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.error_message.is_some()));
    }
}
