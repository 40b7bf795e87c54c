use super::Error;
use crate::model::{Api, Credentials, Session};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    TokenExpired,
}

/// Owns the session token and secret and decides when to (re-)authenticate.
///
/// Created either with credentials (logs in lazily, renews after expiry) or with a static,
/// operator-supplied session (never renews).
#[derive(Debug)]
pub struct SessionManager {
    credentials: Option<Credentials>,
    login_policy: RetryPolicy,
    session: Option<Session>,
    state: SessionState,
    transitions: Vec<SessionState>,
    logins: u32,
}

impl SessionManager {
    pub fn with_credentials(credentials: Credentials, login_policy: RetryPolicy) -> Self {
        SessionManager {
            credentials: Some(credentials),
            login_policy,
            session: None,
            state: SessionState::LoggedOut,
            transitions: vec![SessionState::LoggedOut],
            logins: 0,
        }
    }

    pub fn with_static_token(session: Session) -> Self {
        SessionManager {
            credentials: None,
            login_policy: RetryPolicy::once(),
            session: Some(session),
            state: SessionState::LoggedIn,
            transitions: vec![SessionState::LoggedIn],
            logins: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with the initial one.
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    /// Number of successful logins.
    pub fn logins(&self) -> u32 {
        self.logins
    }

    pub fn can_renew(&self) -> bool {
        self.credentials.is_some()
    }

    fn transition(&mut self, state: SessionState) {
        log::trace!("session {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    async fn login_once(&mut self, api: &Api, credentials: &Credentials) -> Result<(), Error> {
        self.transition(SessionState::LoggingIn);
        match super::login(api, credentials).await {
            Ok(session) => {
                self.session = Some(session);
                self.logins += 1;
                self.transition(SessionState::LoggedIn);
                log::info!("Login successful. Session token and secret obtained.");
                Ok(())
            }
            Err(e) => {
                self.session = None;
                self.transition(SessionState::LoggedOut);
                Err(e)
            }
        }
    }

    /// Log in, re-attempting transient failures as the login policy allows.
    pub async fn login(&mut self, api: &Api) -> Result<&Session, Error> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            Error::Authentication(
                "session token rejected and no credentials configured to renew it".to_string(),
            )
        })?;

        log::info!(
            "Attempting to log in to DESS Monitor as '{}'...",
            credentials.username
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.login_once(api, &credentials).await {
                Ok(()) => break,
                Err(e) => match self.login_policy.retry_delay(attempt, &e) {
                    Some(delay) => {
                        log::warn!(
                            "Login failed (attempt {}): {}. Retrying in {:?}",
                            attempt,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        log::error!("Login failed: {}", e);
                        return Err(e);
                    }
                },
            }
        }

        self.session
            .as_ref()
            .ok_or_else(|| Error::Authentication("login produced no session".to_string()))
    }

    /// Current session, logging in first when there is none.
    pub async fn ensure_session(&mut self, api: &Api) -> Result<Session, Error> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        self.login(api).await.map(Session::clone)
    }

    /// Drop the session after the API rejected its token.
    pub fn invalidate(&mut self, reason: &str) {
        log::warn!("Session token rejected ({}), invalidating session", reason);
        self.session = None;
        self.transition(SessionState::TokenExpired);
    }
}
