//! Time sources and the hybrid logical clock.
//!
//! The [`Clock`] trait abstracts the wall-clock source so production code uses
//! real system time while tests drive a controllable [`FixedClock`]. On top of
//! it, [`Hlc`] issues [`Timestamp`]s: strings whose lexical order equals their
//! temporal order. Each stamp encodes the wall-clock milliseconds (fixed
//! width), a counter that increments whenever the wall clock did not advance,
//! the replica id, and the current schema version.
//!
//! The clock is a single-writer resource: the metadata façade owns it and
//! `now()` is the only mutator.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

/// Fixed width of the wall-clock milliseconds field. 13 decimal digits carry
/// Unix time well past the year 2200.
const MILLIS_WIDTH: usize = 13;
/// Fixed width of the hex counter field.
const COUNTER_WIDTH: usize = 4;

/// A time provider for the hybrid logical clock.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Test clock with manually controlled time.
///
/// Unlike a wall clock it never advances on its own, which is exactly what HLC
/// tests need: repeated `now()` calls at a frozen instant must exercise the
/// counter component.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: Mutex<u64>,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a new fixed clock at the given time in milliseconds.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Mutex::new(millis),
        }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, ms: u64) {
        *self.millis.lock().unwrap() += ms;
    }

    /// Set the clock to a specific time in milliseconds.
    pub fn set(&self, ms: u64) {
        *self.millis.lock().unwrap() = ms;
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        *self.millis.lock().unwrap()
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1_704_067_200_000)
    }
}

/// Durable identifier of one replica (one participating client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(Arc<str>);

impl ReplicaId {
    /// Creates a ReplicaId from any string-like input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().into())
    }

    /// Generates a fresh random replica id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReplicaId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for ReplicaId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ReplicaId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for ReplicaId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReplicaId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ReplicaId(Arc::from(s)))
    }
}

/// A hybrid-logical-clock stamp.
///
/// Encoded as `MMMMMMMMMMMMM-CCCC-replica-V`: zero-padded millis, zero-padded
/// hex counter, replica id, schema version. The fixed-width leading fields make
/// plain string comparison equal temporal comparison; the replica id breaks
/// ties between stamps from different replicas; the schema version trails as
/// metadata for migration consumers and never perturbs the order of stamps
/// that differ in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(Arc<str>);

/// The decoded components of a [`Timestamp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParts {
    pub millis: u64,
    pub counter: u16,
    pub replica: ReplicaId,
    pub schema_version: u32,
}

impl Timestamp {
    /// Creates a Timestamp from any string-like input without validating it.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().into())
    }

    /// Encodes a stamp from its components.
    pub fn encode(millis: u64, counter: u16, replica: &ReplicaId, schema_version: u32) -> Self {
        Self::new(format!(
            "{millis:0mw$}-{counter:0cw$x}-{replica}-{schema_version}",
            mw = MILLIS_WIDTH,
            cw = COUNTER_WIDTH,
        ))
    }

    /// Decodes the stamp back into its components.
    ///
    /// Returns `None` for stamps that were not produced by [`Timestamp::encode`].
    pub fn parts(&self) -> Option<TimestampParts> {
        let (millis, rest) = self.0.split_once('-')?;
        if millis.len() != MILLIS_WIDTH {
            return None;
        }
        let (counter, rest) = rest.split_once('-')?;
        if counter.len() != COUNTER_WIDTH {
            return None;
        }
        let (replica, version) = rest.rsplit_once('-')?;
        if replica.is_empty() {
            return None;
        }
        Some(TimestampParts {
            millis: millis.parse().ok()?,
            counter: u16::from_str_radix(counter, 16).ok()?,
            replica: ReplicaId::new(replica),
            schema_version: version.parse().ok()?,
        })
    }

    /// Returns the stamp as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Timestamp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Timestamp {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Timestamp {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Timestamp(Arc::from(s)))
    }
}

/// The hybrid logical clock.
///
/// Combines a wall-clock source with a logical counter so that `now()` is
/// strictly monotone even when the wall clock stalls or runs backwards, and so
/// that every issued stamp exceeds every stamp previously observed through
/// acknowledgments.
pub struct Hlc {
    clock: Box<dyn Clock>,
    replica: ReplicaId,
    schema_version: u32,
    wall: u64,
    counter: u16,
}

impl Debug for Hlc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hlc")
            .field("replica", &self.replica)
            .field("schema_version", &self.schema_version)
            .field("wall", &self.wall)
            .field("counter", &self.counter)
            .finish()
    }
}

impl Hlc {
    /// Creates a clock for `replica` at `schema_version` over the given source.
    pub fn new(clock: Box<dyn Clock>, replica: ReplicaId, schema_version: u32) -> Self {
        Self {
            clock,
            replica,
            schema_version,
            wall: 0,
            counter: 0,
        }
    }

    /// The replica this clock stamps for.
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Rebinds the clock to a restored replica identity.
    pub fn set_replica(&mut self, replica: ReplicaId) {
        self.replica = replica;
    }

    /// The schema version currently encoded into stamps.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Raises the schema version encoded into subsequent stamps.
    pub fn set_schema_version(&mut self, version: u32) {
        self.schema_version = version;
    }

    /// Issues the next timestamp, strictly greater than anything issued or
    /// observed before.
    pub fn now(&mut self) -> Timestamp {
        let millis = self.clock.now_millis();
        if millis > self.wall {
            self.wall = millis;
            self.counter = 0;
        } else if self.counter == u16::MAX {
            // Counter exhausted within one wall tick: borrow from the wall.
            self.wall += 1;
            self.counter = 0;
        } else {
            self.counter += 1;
        }
        Timestamp::encode(self.wall, self.counter, &self.replica, self.schema_version)
    }

    /// Observes a foreign stamp, raising the local floor so that subsequent
    /// `now()` calls exceed it.
    ///
    /// Stamps that do not decode (foreign test fixtures, corrupt input) are
    /// ignored; they cannot carry a wall component to raise.
    pub fn observe(&mut self, timestamp: &Timestamp) {
        let Some(parts) = timestamp.parts() else {
            tracing::trace!(timestamp = %timestamp, "ignoring undecodable stamp");
            return;
        };
        if (parts.millis, parts.counter) > (self.wall, self.counter) {
            self.wall = parts.millis;
            self.counter = parts.counter;
        }
    }
}
