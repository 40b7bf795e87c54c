use super::session::{SessionManager, SessionState};
use super::Error;
use crate::model::{Action, ActionClass, ActionResult, Api, CommandRequest, OutputPriority};
use crate::retry::RetryConfig;
use tokio::sync::Mutex;

/// Sends signed device commands, keeping the session alive and applying the retry policy of
/// the action's class.
///
/// The session manager sits behind one mutex, held for a whole attempt, so a dispatcher shared
/// between tasks never signs with a session another task is replacing.
#[derive(Debug)]
pub struct Dispatcher {
    api: Api,
    retry: RetryConfig,
    session: Mutex<SessionManager>,
}

impl Dispatcher {
    pub fn new(api: Api, session: SessionManager, retry: RetryConfig) -> Dispatcher {
        Dispatcher {
            api,
            retry,
            session: Mutex::new(session),
        }
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn session_transitions(&self) -> Vec<SessionState> {
        self.session.lock().await.transitions().to_vec()
    }

    /// Number of successful logins performed so far.
    pub async fn logins(&self) -> u32 {
        self.session.lock().await.logins()
    }

    /// Run a process-level action.
    pub async fn run(&self, action: Action) -> Result<ActionResult, Error> {
        log::info!("Executing job: {}", action.description());
        self.dispatch(action.class(), action.priority()).await
    }

    pub async fn read_status(&self) -> Result<ActionResult, Error> {
        self.dispatch(ActionClass::Read, None).await
    }

    pub async fn set_priority(&self, priority: OutputPriority) -> Result<ActionResult, Error> {
        self.dispatch(ActionClass::Write, Some(priority)).await
    }

    async fn dispatch(
        &self,
        class: ActionClass,
        value: Option<OutputPriority>,
    ) -> Result<ActionResult, Error> {
        let what = match value {
            None => "read-status".to_string(),
            Some(priority) => format!("set-priority {}", priority),
        };
        self.retry
            .for_class(class)
            .run(&what, move || self.dispatch_once(value))
            .await
    }

    /// One attempt: a command, plus at most one re-login and resend when the token was rejected.
    async fn dispatch_once(&self, value: Option<OutputPriority>) -> Result<ActionResult, Error> {
        let mut manager = self.session.lock().await;

        match self.send(&mut manager, value).await {
            Err(Error::TokenExpired(reason)) => {
                manager.invalidate(&reason);
                log::info!("Re-authenticating and retrying command once");
                let result = self.send(&mut manager, value).await;
                if let Err(Error::TokenExpired(reason)) = &result {
                    manager.invalidate(reason);
                }
                result
            }
            other => other,
        }
    }

    async fn send(
        &self,
        manager: &mut SessionManager,
        value: Option<OutputPriority>,
    ) -> Result<ActionResult, Error> {
        let session = manager.ensure_session(&self.api).await?;
        let request = CommandRequest::for_value(value);
        super::send_command(&self.api, &session, &request).await
    }
}
