mod client;
pub mod provider;
pub mod state;

pub use provider::{
    ExternalIdentity, ProviderConfig, ProviderError, ProviderKind, ProviderRegistry,
};
pub use state::{StateError, StateSigner};

#[cfg(test)]
pub(crate) use client::tests::{GOOD_CODE, mock_google, spawn_mock_provider};
