use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::domain::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub anonymous: bool,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current identity now, and every later sign-in or sign-out.
    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in_anonymously(&self) -> Result<Identity, StoreError>;

    fn current_user(&self) -> Option<Identity> {
        self.on_auth_state_changed().borrow().clone()
    }
}

/// In-process provider that mints a random uid per sign-in.
pub struct AnonymousAuth {
    state: watch::Sender<Option<Identity>>,
}

impl AnonymousAuth {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }
}

impl Default for AnonymousAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for AnonymousAuth {
    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, StoreError> {
        let current = self.state.borrow().clone();
        if let Some(existing) = current {
            return Ok(existing);
        }
        let identity = Identity {
            uid: Uuid::new_v4().simple().to_string(),
            anonymous: true,
        };
        info!(uid = %identity.uid, "signed in anonymously");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_is_observed_and_stable() {
        let auth = AnonymousAuth::new();
        let mut changes = auth.on_auth_state_changed();
        assert!(auth.current_user().is_none());

        let first = auth.sign_in_anonymously().await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().as_ref(), Some(&first));

        let again = auth.sign_in_anonymously().await.unwrap();
        assert_eq!(first, again);

        auth.sign_out();
        assert!(auth.current_user().is_none());
    }
}
