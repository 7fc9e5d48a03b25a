//! Shared setup for the integration suites: clients wired over one
//! in-process network.

use self_account::AccountPrimitive;
use self_sdk::{Client, ClientConfig};
use self_testkit::{MemoryAccount, MemoryNetwork};
use std::sync::Arc;

/// A client plus the memory account backing it.
pub struct TestPeer {
    pub client: Client,
    pub account: Arc<MemoryAccount>,
}

impl TestPeer {
    pub fn did(&self) -> String {
        self.client.did()
    }
}

/// Install a test subscriber once so `RUST_LOG` controls SDK tracing.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Construct a client on `network` with a valid default configuration.
pub async fn peer_on(network: &Arc<MemoryNetwork>) -> TestPeer {
    init_tracing();
    let account = MemoryAccount::new(Arc::clone(network));
    let config = ClientConfig::new(
        self_testkit::fixtures::storage_key(),
        "/tmp/self-sdk-tests",
    );

    let client = Client::new(config, Arc::clone(&account) as Arc<dyn AccountPrimitive>)
        .await
        .expect("client construction");

    TestPeer { client, account }
}

/// Two connected peers on a fresh network.
pub async fn peer_pair() -> (TestPeer, TestPeer) {
    let network = MemoryNetwork::new();
    let alice = peer_on(&network).await;
    let bob = peer_on(&network).await;
    (alice, bob)
}
