use crate::models::AccountId;
use async_trait::async_trait;

/// Source of the authenticated account and its provider-supplied avatar
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Account of the current session, if authenticated
    async fn current_account(&self) -> Option<AccountId>;

    /// Avatar image of the current account as reported by the provider
    /// right now. Accounts created without a third-party provider have none.
    async fn provider_avatar_url(&self) -> Option<String>;
}

/// Identity fixed at construction, for tools and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    account: Option<AccountId>,
    avatar_url: Option<String>,
}

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(account: AccountId) -> Self {
        Self {
            account: Some(account),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_account(&self) -> Option<AccountId> {
        self.account.clone().filter(|account| !account.is_blank())
    }

    async fn provider_avatar_url(&self) -> Option<String> {
        self.avatar_url.clone()
    }
}
