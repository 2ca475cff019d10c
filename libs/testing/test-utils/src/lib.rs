//! Shared test utilities
//!
//! - `TestDataBuilder`: deterministic identifiers for entity-graph fixtures (always available)
//! - `TestRabbitMq`: RabbitMQ container with automatic cleanup (feature: "rabbitmq")
//! - `assertions`: assertion helpers (always available)
//!
//! # RabbitMQ Testing
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["rabbitmq"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::TestRabbitMq;
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_broker_test() {
//!     let rabbit = TestRabbitMq::new().await;
//!     let broker = AmqpBroker::connect(&BusConfig::new(rabbit.amqp_url())).await.unwrap();
//! }
//! ```

#[cfg(feature = "rabbitmq")]
mod rabbitmq;

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::TestRabbitMq;

/// Builder for deterministic test identifiers
///
/// Identifiers embed a seed derived from the test name, so fixtures from
/// different tests never collide while staying reproducible run to run.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (seed is a hash of the name)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("task_completed_fans_out");
    /// assert!(builder.employee_id("creator").starts_with("emp-"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    fn id(&self, kind: &str, label: &str) -> String {
        format!("{}-{:x}-{}", kind, self.seed, label)
    }

    /// Internal employee primary key
    pub fn employee_id(&self, label: &str) -> String {
        self.id("emp", label)
    }

    /// External business employee code (distinct from the primary key)
    pub fn employee_code(&self, label: &str) -> String {
        format!("E{:04}-{}", self.seed % 10_000, label)
    }

    pub fn email(&self, label: &str) -> String {
        format!("{}.{:x}@example.test", label, self.seed % 0xffff)
    }

    pub fn task_id(&self, label: &str) -> String {
        self.id("task", label)
    }

    pub fn node_id(&self, label: &str) -> String {
        self.id("node", label)
    }

    pub fn handover_id(&self, label: &str) -> String {
        self.id("handover", label)
    }

    pub fn department_id(&self, label: &str) -> String {
        self.id("dept", label)
    }

    pub fn company_id(&self, label: &str) -> String {
        self.id("company", label)
    }
}

/// Test assertion helpers
pub mod assertions {
    use std::collections::BTreeSet;
    use std::fmt::Debug;

    /// Assert two collections hold the same elements, ignoring order and duplicates
    pub fn assert_set_eq<T, A, B>(actual: A, expected: B, context: &str)
    where
        T: Ord + Debug,
        A: IntoIterator<Item = T>,
        B: IntoIterator<Item = T>,
    {
        let actual: BTreeSet<T> = actual.into_iter().collect();
        let expected: BTreeSet<T> = expected.into_iter().collect();
        assert_eq!(actual, expected, "{}: sets differ", context);
    }
}
