//! Network environments and their endpoint triples.

use serde::{Deserialize, Serialize};

/// A deployment of the Self network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    /// The sandbox network for development and testing
    #[default]
    Sandbox,
    /// The production network
    Production,
}

impl Environment {
    /// The RPC endpoint.
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://rpc-sandbox.joinself.com/",
            Environment::Production => "https://rpc.joinself.com/",
        }
    }

    /// The object store endpoint.
    pub fn object_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://object-sandbox.joinself.com/",
            Environment::Production => "https://object.joinself.com/",
        }
    }

    /// The messaging endpoint.
    pub fn message_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "wss://message-sandbox.joinself.com/",
            Environment::Production => "wss://message.joinself.com/",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_triples_are_exact() {
        assert_eq!(
            Environment::Sandbox.rpc_url(),
            "https://rpc-sandbox.joinself.com/"
        );
        assert_eq!(
            Environment::Sandbox.object_url(),
            "https://object-sandbox.joinself.com/"
        );
        assert_eq!(
            Environment::Sandbox.message_url(),
            "wss://message-sandbox.joinself.com/"
        );
        assert_eq!(Environment::Production.rpc_url(), "https://rpc.joinself.com/");
        assert_eq!(
            Environment::Production.object_url(),
            "https://object.joinself.com/"
        );
        assert_eq!(
            Environment::Production.message_url(),
            "wss://message.joinself.com/"
        );
    }

    #[test]
    fn sandbox_is_default() {
        assert_eq!(Environment::default(), Environment::Sandbox);
    }
}
