//! Key role bit-flags.
//!
//! A key carries a mask of roles describing what it may do on behalf of
//! the identity. Values are stable wire constants.

/// May sign credential assertions.
pub const ROLE_ASSERTION: u64 = 1 << 0;

/// May authenticate as the identity.
pub const ROLE_AUTHENTICATION: u64 = 1 << 1;

/// May produce verification proofs.
pub const ROLE_VERIFICATION: u64 = 1 << 2;

/// May sign identity operations.
pub const ROLE_INVOCATION: u64 = 1 << 3;

/// May delegate capabilities to other keys.
pub const ROLE_DELEGATION: u64 = 1 << 4;

/// May send and receive end-to-end encrypted messages.
pub const ROLE_MESSAGING: u64 = 1 << 5;

const ROLE_TABLE: &[(u64, &str)] = &[
    (ROLE_ASSERTION, "assertion"),
    (ROLE_AUTHENTICATION, "authentication"),
    (ROLE_VERIFICATION, "verification"),
    (ROLE_INVOCATION, "invocation"),
    (ROLE_DELEGATION, "delegation"),
    (ROLE_MESSAGING, "messaging"),
];

/// Names of the roles present in `mask`, in stable order.
pub fn role_names(mask: u64) -> Vec<&'static str> {
    ROLE_TABLE
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}
