//! Introduction payload: bearer tokens for future messaging.

use crate::content::{ContentType, MessageContent};
use serde::{Deserialize, Serialize};

/// Introduction tokens from a peer.
///
/// Tokens are opaque to the SDK; they are stored through the account
/// primitive and interpreted by it alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionContent {
    /// The bearer tokens, in the order the peer issued them
    pub tokens: Vec<Vec<u8>>,
}

impl IntroductionContent {
    /// Wrap a token list.
    pub fn new(tokens: Vec<Vec<u8>>) -> Self {
        Self { tokens }
    }

    /// The carried tokens.
    pub fn tokens(&self) -> &[Vec<u8>] {
        &self.tokens
    }
}

impl MessageContent for IntroductionContent {
    const CONTENT_TYPE: ContentType = ContentType::Introduction;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introduction_round_trip() {
        let intro = IntroductionContent::new(vec![vec![1, 2], vec![3, 4, 5]]);
        let content = intro.clone().into_content().unwrap();

        let decoded = IntroductionContent::from_content(&content).unwrap();
        assert_eq!(decoded, intro);
        assert_eq!(decoded.tokens().len(), 2);
    }
}
