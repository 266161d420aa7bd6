//! Connection identity.

use std::fmt;

/// Identifier of one accepted connection.
///
/// Ids are handed out in ascending order, so they double as the service order
/// inside a readiness round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out strictly increasing [`ConnectionId`]s.
#[derive(Debug, Default)]
pub struct ConnectionIdFactory {
    next: u64,
}

impl ConnectionIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_generates_ascending_ids() {
        // テスト項目: 払い出される ID が単調増加する
        // given (前提条件):
        let mut factory = ConnectionIdFactory::new();

        // when (操作):
        let first = factory.generate();
        let second = factory.generate();
        let third = factory.generate();

        // then (期待する結果):
        assert!(first < second && second < third);
        assert_eq!(first.value(), 0);
        assert_eq!(third.to_string(), "#2");
    }
}
