//! Job identities, ID sets and records.

use crate::index::ContinuationToken;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Minimal identity of a job: the `(id, namespace)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,
    pub namespace: String,
}

impl JobRef {
    /// Creates a job reference.
    pub fn new(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
        }
    }

    /// The continuation token that resumes a listing at this job.
    ///
    /// Listing tokens are `namespace.id`, the same form [`Display`](fmt::Display)
    /// produces.
    #[must_use]
    pub fn to_token(&self) -> ContinuationToken {
        ContinuationToken::new(self.to_string())
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.id)
    }
}

impl FromStr for JobRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Namespaces cannot contain dots; job IDs can.
        match s.split_once('.') {
            Some((namespace, id)) if !namespace.is_empty() && !id.is_empty() => {
                Ok(Self::new(id, namespace))
            }
            _ => Err(Error::InvalidJobRef(s.to_string())),
        }
    }
}

/// Ordered membership of one page, in server order.
///
/// Replaced wholesale on every listing cycle; never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdSet(Vec<JobRef>);

impl JobIdSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds the set from listing records, preserving their order.
    #[must_use]
    pub fn from_records(records: &[JobRecord]) -> Self {
        Self(records.iter().map(JobRecord::job_ref).collect())
    }

    /// Number of jobs on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates refs in server order.
    pub fn iter(&self) -> std::slice::Iter<'_, JobRef> {
        self.0.iter()
    }

    /// The first ref on the page.
    #[must_use]
    pub fn first(&self) -> Option<&JobRef> {
        self.0.first()
    }

    /// The last ref on the page.
    #[must_use]
    pub fn last(&self) -> Option<&JobRef> {
        self.0.last()
    }

    /// Compares page membership by identity and order only.
    #[must_use]
    pub fn same_members(&self, other: &JobIdSet) -> bool {
        self.0 == other.0
    }

    /// Returns the refs as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[JobRef] {
        &self.0
    }
}

impl From<Vec<JobRef>> for JobIdSet {
    fn from(refs: Vec<JobRef>) -> Self {
        Self(refs)
    }
}

impl FromIterator<JobRef> for JobIdSet {
    fn from_iter<I: IntoIterator<Item = JobRef>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a JobIdSet {
    type Item = &'a JobRef;
    type IntoIter = std::slice::Iter<'a, JobRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One job row as returned by the listing or details query.
///
/// The well-known columns are typed; everything else the server sends
/// (allocation summaries, child statuses, ...) is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "Type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub node_pool: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobRecord {
    /// Creates a record carrying only identity and name.
    pub fn new(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            namespace: namespace.into(),
            status: None,
            job_type: None,
            priority: None,
            node_pool: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Sets the status column.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Identity of this record.
    #[must_use]
    pub fn job_ref(&self) -> JobRef {
        JobRef::new(self.id.clone(), self.namespace.clone())
    }

    /// Parses a JSON array of records.
    pub fn parse_list(json: &str) -> crate::Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Full records for the current page, keyed by identity.
///
/// Replaced wholesale on every successful details cycle. Serializes as a plain
/// list of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<JobRecord>", into = "Vec<JobRecord>")]
pub struct DetailSnapshot {
    records: BTreeMap<JobRef, JobRecord>,
}

impl DetailSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a details response.
    #[must_use]
    pub fn from_records(records: Vec<JobRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.job_ref(), r)).collect(),
        }
    }

    /// Looks up the record for a job.
    #[must_use]
    pub fn get(&self, job: &JobRef) -> Option<&JobRecord> {
        self.records.get(job)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&JobRef, &JobRecord)> {
        self.records.iter()
    }
}

impl From<Vec<JobRecord>> for DetailSnapshot {
    fn from(records: Vec<JobRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<DetailSnapshot> for Vec<JobRecord> {
    fn from(snapshot: DetailSnapshot) -> Self {
        snapshot.records.into_values().collect()
    }
}
