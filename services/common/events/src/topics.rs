/// Base stream feeding the search-snapshot projector.
pub const SNAPSHOT_STREAM: &str = "hotel-search-snapshot-events";

/// Companion retry and dead-letter destinations are derived from the base
/// name so every transport (Kafka topics, in-process queues) agrees on the
/// naming without per-transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNames {
    base: String,
}

impl StreamNames {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn main(&self) -> &str {
        &self.base
    }

    pub fn retry(&self) -> String {
        format!("{}.retry", self.base)
    }

    pub fn dead_letter(&self) -> String {
        format!("{}.dlq", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_names_derive_from_base() {
        let names = StreamNames::new(SNAPSHOT_STREAM);
        assert_eq!(names.main(), "hotel-search-snapshot-events");
        assert_eq!(names.retry(), "hotel-search-snapshot-events.retry");
        assert_eq!(names.dead_letter(), "hotel-search-snapshot-events.dlq");
    }
}
