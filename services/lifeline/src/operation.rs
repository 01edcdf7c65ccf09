//! Operation identifiers and the application's operation catalogue

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a logical RPC operation, e.g. `content.list`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the last dot (`content` in `content.list`)
    pub fn namespace(&self) -> &str {
        self.0.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
    }

    /// The part after the last dot (`list` in `content.list`)
    pub fn method(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(_, method)| method)
            .unwrap_or(&self.0)
    }

    /// Derive the operation key from an RPC request URL.
    ///
    /// `/api/trpc/content.list?batch=1` and `/api/content/list` both yield
    /// `content.list`. Returns `None` when the path has no `/api/` section or
    /// nothing after it.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            // Relative URLs are matched on their path alone
            Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
        };

        let (_, rest) = path.split_once("/api/")?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let last = *segments.last()?;

        if last.contains('.') {
            // Batched calls carry a comma separated list; the first one names the request
            let first = last.split(',').next().unwrap_or(last);
            return Some(Self::new(first));
        }

        match segments.as_slice() {
            [.., namespace, method] => Some(Self::new(format!("{}.{}", namespace, method))),
            [single] => Some(Self::new(*single)),
            [] => None,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for OperationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<Operation> for OperationKey {
    fn from(operation: Operation) -> Self {
        Self::new(operation.key())
    }
}

impl Borrow<str> for OperationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for OperationKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Whether an operation reads or changes backend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// The closed set of operations the application can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ContentList,
    ContentGet,
    ContentCreate,
    ContentDelete,
    MetricsSummary,
    BillingPlans,
    BillingSubscribe,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::ContentList,
        Operation::ContentGet,
        Operation::ContentCreate,
        Operation::ContentDelete,
        Operation::MetricsSummary,
        Operation::BillingPlans,
        Operation::BillingSubscribe,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Operation::ContentList => "content.list",
            Operation::ContentGet => "content.get",
            Operation::ContentCreate => "content.create",
            Operation::ContentDelete => "content.delete",
            Operation::MetricsSummary => "metrics.summary",
            Operation::BillingPlans => "billing.plans",
            Operation::BillingSubscribe => "billing.subscribe",
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ContentList
            | Operation::ContentGet
            | Operation::MetricsSummary
            | Operation::BillingPlans => OperationKind::Query,
            Operation::ContentCreate | Operation::ContentDelete | Operation::BillingSubscribe => {
                OperationKind::Mutation
            }
        }
    }

    pub fn from_key(key: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.key() == key)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
