//! In-process identity directory for tests and local development.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::ports::{Identity, IdentityDirectory, IdentityError, RecoveryLink};

#[derive(Debug, Default)]
struct Inner {
    identities: Vec<Identity>,
    unreachable: HashSet<String>,
    recovery_links: Vec<(String, Duration)>,
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    inner: Mutex<Inner>,
}

impl InMemoryIdentityDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity and returns its id.
    pub fn insert(&self, email: &str) -> String {
        let identity = Identity {
            id: Uuid::now_v7().to_string(),
            email: email.to_owned(),
        };
        let id = identity.id.clone();
        self.inner.lock().identities.push(identity);
        id
    }

    /// Makes `get` fail for `id` with a transport error.
    pub fn make_unreachable(&self, id: &str) {
        self.inner.lock().unreachable.insert(id.to_owned());
    }

    #[must_use]
    pub fn identities(&self) -> Vec<Identity> {
        self.inner.lock().identities.clone()
    }

    /// Identity ids and lifetimes of every recovery link issued so far.
    #[must_use]
    pub fn recovery_links(&self) -> Vec<(String, Duration)> {
        self.inner.lock().recovery_links.clone()
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        Ok(self
            .inner
            .lock()
            .identities
            .iter()
            .find(|i| i.email == email)
            .cloned())
    }

    async fn create(&self, email: &str) -> Result<Identity, IdentityError> {
        let id = self.insert(email);
        Ok(Identity {
            id,
            email: email.to_owned(),
        })
    }

    async fn get(&self, id: &str) -> Result<Identity, IdentityError> {
        let inner = self.inner.lock();
        if inner.unreachable.contains(id) {
            return Err(IdentityError::Transport(format!("identity {id} unreachable")));
        }
        inner
            .identities
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(id.to_owned()))
    }

    async fn issue_recovery_link(
        &self,
        id: &str,
        ttl: Duration,
    ) -> Result<RecoveryLink, IdentityError> {
        let mut inner = self.inner.lock();
        if !inner.identities.iter().any(|i| i.id == id) {
            return Err(IdentityError::NotFound(id.to_owned()));
        }
        inner.recovery_links.push((id.to_owned(), ttl));
        let code = format!("{:06}", inner.recovery_links.len());
        Ok(RecoveryLink {
            link: format!("http://localhost/self-service/recovery?flow={id}"),
            code,
        })
    }
}
