//! Locator bookkeeping behind `--wait-for-state`.
//!
//! Every decoded response passes through [`WaitInfo::observe`]: the body
//! becomes the last-response snapshot and its top-level `href`, if there is
//! one, becomes the tracked locator. Mutating commands that come back without
//! a body (most deletes) fall back to [`WaitInfo::resolve_and_run`], which
//! runs the sibling `get` command in-process and harvests the locator from
//! its output instead.
//!
//! Key items:
//!   ResponseCache   last decoded body (ordered JSON object)
//!   LocatorTracker  last seen `href`
//!   CommandHost     what the resolver needs from the command tree
//!   WaitInfo        the three above plus the single-flight guard

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::cmd::flags::{self, FlagAssignment};
use crate::cmd::path::CommandPath;

/// Top-level response field carrying the resource locator.
pub const LOCATOR_FIELD: &str = "href";

/// Verb of the command that reads a single resource.
pub const READ_VERB: &str = "get";

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("failed to serialize response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error(
        "cannot deduce a get command for '{original}': the command path needs at least two segments"
    )]
    PathTooShort { original: CommandPath },

    #[error(
        "no equivalent get command '{attempted}' exists for '{original}', and there is no known href to fall back on"
    )]
    NoEquivalentCommand {
        original: CommandPath,
        attempted: CommandPath,
    },

    #[error("failed to execute equivalent get command '{attempted}' for '{original}'")]
    ExecutionFailed {
        original: CommandPath,
        attempted: CommandPath,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not deduce an href for '{original}', even from the output of '{attempted}'")]
    NoLocator {
        original: CommandPath,
        attempted: CommandPath,
    },
}

/// What the resolver needs from the command tree.
pub trait CommandHost {
    /// Long names of every flag `path` accepts, own and inherited.
    /// `None` when no such command is registered.
    fn declared_flags(&self, path: &CommandPath) -> Option<BTreeSet<String>>;

    /// Run `path` in-process with exactly `flags` and return its decoded body.
    fn execute(&self, path: &CommandPath, flags: &[FlagAssignment]) -> anyhow::Result<Option<Value>>;
}

/// Most recently decoded response body.
#[derive(Debug, Default)]
pub struct ResponseCache {
    snapshot: RwLock<Map<String, Value>>,
}

impl ResponseCache {
    /// Serialize `value` into the canonical mapping and replace the snapshot.
    pub fn record_raw<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), SerializationError> {
        let mapping = to_mapping(value)?;
        self.record_mapping(mapping);
        Ok(())
    }

    pub fn record_mapping(&self, mapping: Map<String, Value>) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mapping;
    }

    /// Copy of the current snapshot; empty until something is recorded.
    pub fn current(&self) -> Map<String, Value> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Last known resource locator. Empty means unknown.
#[derive(Debug, Default)]
pub struct LocatorTracker {
    href: RwLock<String>,
}

impl LocatorTracker {
    /// Store the top-level `href` of `value` if it has a non-empty string one.
    /// Anything else leaves the tracked locator untouched.
    pub fn extract_and_record<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<(), SerializationError> {
        let value = serde_json::to_value(value)?;
        if let Some(href) = locator_of(&value) {
            trace!(href, "tracked locator");
            *self.href.write().unwrap_or_else(PoisonError::into_inner) = href.to_string();
        }
        Ok(())
    }

    pub fn current(&self) -> String {
        self.href
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.href
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Per-invocation wait state, owned by the command context.
#[derive(Debug, Default)]
pub struct WaitInfo {
    pub last_response: ResponseCache,
    pub locator: LocatorTracker,
    // One nested resolution at a time.
    in_flight: Mutex<()>,
}

impl WaitInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded response body: snapshot first, then locator.
    pub fn observe(&self, body: &Value) -> Result<(), SerializationError> {
        match body {
            Value::Object(mapping) => self.last_response.record_mapping(mapping.clone()),
            other => self.last_response.record_raw(other)?,
        }
        self.locator.extract_and_record(body)
    }

    /// Find the `get` command next to `path`, run it with the subset of `flags`
    /// it understands, and return the locator it produced.
    ///
    /// Blocks until the nested command finishes. Concurrent callers on the same
    /// `WaitInfo` are serialized. Every error is terminal.
    pub fn resolve_and_run<H: CommandHost + ?Sized>(
        &self,
        host: &H,
        path: &CommandPath,
        flags: &[FlagAssignment],
    ) -> Result<String, ResolutionError> {
        let attempted = equivalent_read(path).ok_or_else(|| ResolutionError::PathTooShort {
            original: path.clone(),
        })?;

        let Some(declared) = host.declared_flags(&attempted) else {
            return Err(ResolutionError::NoEquivalentCommand {
                original: path.clone(),
                attempted,
            });
        };
        let retained = flags::project(flags, &declared);
        debug!(
            command = %attempted,
            forwarded = retained.len(),
            dropped = flags.len() - retained.len(),
            "running equivalent get command"
        );

        let _guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let response = host
            .execute(&attempted, &retained)
            .map_err(|source| ResolutionError::ExecutionFailed {
                original: path.clone(),
                attempted: attempted.clone(),
                source,
            })?;

        if let Some(body) = &response {
            self.locator
                .extract_and_record(body)
                .map_err(|err| ResolutionError::ExecutionFailed {
                    original: path.clone(),
                    attempted: attempted.clone(),
                    source: err.into(),
                })?;
        }

        if self.locator.is_empty() {
            return Err(ResolutionError::NoLocator {
                original: path.clone(),
                attempted,
            });
        }
        Ok(self.locator.current())
    }
}

/// `["datacenter","server","create"]` -> `["datacenter","server","get"]`.
pub fn equivalent_read(path: &CommandPath) -> Option<CommandPath> {
    path.sibling(READ_VERB)
}

/// Top-level, non-empty string `href` of a decoded body.
pub fn locator_of(value: &Value) -> Option<&str> {
    value
        .as_object()?
        .get(LOCATOR_FIELD)?
        .as_str()
        .filter(|href| !href.is_empty())
}

fn to_mapping<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>, SerializationError> {
    match serde_json::to_value(value)? {
        Value::Object(mapping) => Ok(mapping),
        other => Err(SerializationError::NotAnObject(kind_of(&other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory command tree: declared flags and a canned response per path.
    #[derive(Default)]
    struct FakeHost {
        commands: HashMap<CommandPath, (BTreeSet<String>, Result<Option<Value>, String>)>,
        calls: Mutex<Vec<(CommandPath, Vec<FlagAssignment>)>>,
    }

    impl FakeHost {
        fn with_command(
            mut self,
            path: &[&str],
            flags: &[&str],
            response: Result<Option<Value>, &str>,
        ) -> Self {
            self.commands.insert(
                CommandPath::new(path.iter().copied()),
                (
                    flags.iter().map(|f| f.to_string()).collect(),
                    response.map_err(str::to_string),
                ),
            );
            self
        }

        fn calls(&self) -> Vec<(CommandPath, Vec<FlagAssignment>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandHost for FakeHost {
        fn declared_flags(&self, path: &CommandPath) -> Option<BTreeSet<String>> {
            self.commands.get(path).map(|(flags, _)| flags.clone())
        }

        fn execute(
            &self,
            path: &CommandPath,
            flags: &[FlagAssignment],
        ) -> anyhow::Result<Option<Value>> {
            self.calls
                .lock()
                .unwrap()
                .push((path.clone(), flags.to_vec()));
            match &self.commands.get(path).expect("unknown command").1 {
                Ok(body) => Ok(body.clone()),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        }
    }

    const SERVER_HREF: &str = "https://api.example/datacenters/123/servers/456";

    fn delete_flags() -> Vec<FlagAssignment> {
        vec![
            FlagAssignment::new("datacenter-id", "123"),
            FlagAssignment::new("server-id", "456"),
        ]
    }

    #[test]
    fn extract_records_string_href() {
        let tracker = LocatorTracker::default();
        tracker
            .extract_and_record(&json!({"id": "1", "href": "https://x/1"}))
            .unwrap();
        assert_eq!(tracker.current(), "https://x/1");
        assert!(!tracker.is_empty());
    }

    #[test]
    fn extract_keeps_previous_locator_when_href_missing_or_not_a_string() {
        let tracker = LocatorTracker::default();
        tracker.extract_and_record(&json!({"id": "1"})).unwrap();
        assert!(tracker.is_empty());

        tracker.extract_and_record(&json!({"href": "https://x/1"})).unwrap();
        tracker.extract_and_record(&json!({"id": "2"})).unwrap();
        tracker.extract_and_record(&json!({"href": 42})).unwrap();
        tracker.extract_and_record(&json!({"href": null})).unwrap();
        tracker.extract_and_record(&json!({"href": ""})).unwrap();
        tracker.extract_and_record(&json!([{"href": "nested"}])).unwrap();
        tracker
            .extract_and_record(&json!({"metadata": {"href": "nested"}}))
            .unwrap();
        assert_eq!(tracker.current(), "https://x/1");
    }

    #[test]
    fn extract_accepts_typed_values() {
        #[derive(Serialize)]
        struct Server<'a> {
            id: &'a str,
            href: &'a str,
        }
        let tracker = LocatorTracker::default();
        tracker
            .extract_and_record(&Server { id: "7", href: "https://x/7" })
            .unwrap();
        assert_eq!(tracker.current(), "https://x/7");
    }

    #[test]
    fn record_raw_replaces_snapshot_wholesale() {
        let cache = ResponseCache::default();
        assert!(cache.current().is_empty());

        cache.record_raw(&json!({"a": 1, "b": {"c": [1, 2]}})).unwrap();
        cache.record_raw(&json!({"z": true})).unwrap();
        let current = cache.current();
        assert_eq!(current.len(), 1);
        assert_eq!(current.get("z"), Some(&json!(true)));
    }

    #[test]
    fn record_raw_rejects_non_objects() {
        let cache = ResponseCache::default();
        cache.record_raw(&json!({"keep": 1})).unwrap();
        let err = cache.record_raw(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, SerializationError::NotAnObject("an array")));
        assert_eq!(cache.current().get("keep"), Some(&json!(1)));
    }

    #[test]
    fn snapshot_keeps_key_order() {
        let cache = ResponseCache::default();
        cache.record_raw(&json!({"zeta": 1, "alpha": 2, "mid": 3})).unwrap();
        let keys: Vec<_> = cache.current().keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn concurrent_readers_never_see_torn_snapshots() {
        let cache = ResponseCache::default();
        cache.record_raw(&json!({"a": 0, "b": 0})).unwrap();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..2000 {
                    cache.record_raw(&json!({"a": i, "b": i})).unwrap();
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..2000 {
                        let snapshot = cache.current();
                        assert_eq!(snapshot.get("a"), snapshot.get("b"));
                    }
                });
            }
        });
    }

    #[test]
    fn observe_updates_snapshot_and_locator() {
        let info = WaitInfo::new();
        info.observe(&json!({"id": "1", "href": "https://x/1"})).unwrap();
        info.observe(&json!({"id": "2"})).unwrap();
        assert_eq!(info.last_response.current().get("id"), Some(&json!("2")));
        assert_eq!(info.locator.current(), "https://x/1");
    }

    #[test]
    fn one_segment_path_is_too_short() {
        let host = FakeHost::default().with_command(&["get"], &[], Ok(None));
        let info = WaitInfo::new();
        let err = info
            .resolve_and_run(&host, &CommandPath::new(["datacenter"]), &delete_flags())
            .unwrap_err();
        assert!(matches!(err, ResolutionError::PathTooShort { .. }));
        assert!(err.to_string().contains("'datacenter'"));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn equivalent_read_swaps_the_verb() {
        assert_eq!(
            equivalent_read(&CommandPath::new(["datacenter", "server", "create"])),
            Some(CommandPath::new(["datacenter", "server", "get"]))
        );
    }

    #[test]
    fn resolves_locator_from_get_output() {
        let host = FakeHost::default().with_command(
            &["datacenter", "server", "get"],
            &["datacenter-id", "server-id", "depth"],
            Ok(Some(json!({"id": "456", "href": SERVER_HREF}))),
        );
        let info = WaitInfo::new();
        let mut flags = delete_flags();
        flags.push(FlagAssignment::new("wait-for-state", "true"));

        let href = info
            .resolve_and_run(
                &host,
                &CommandPath::new(["datacenter", "server", "delete"]),
                &flags,
            )
            .unwrap();

        assert_eq!(href, SERVER_HREF);
        assert_eq!(info.locator.current(), SERVER_HREF);
        assert_eq!(
            host.calls(),
            vec![(
                CommandPath::new(["datacenter", "server", "get"]),
                delete_flags()
            )]
        );
    }

    #[test]
    fn missing_get_command_leaves_locator_alone() {
        let host = FakeHost::default();
        let info = WaitInfo::new();
        info.locator
            .extract_and_record(&json!({"href": "https://x/previous"}))
            .unwrap();

        let err = info
            .resolve_and_run(
                &host,
                &CommandPath::new(["datacenter", "server", "delete"]),
                &delete_flags(),
            )
            .unwrap_err();

        match &err {
            ResolutionError::NoEquivalentCommand { original, attempted } => {
                assert_eq!(original.to_string(), "datacenter server delete");
                assert_eq!(attempted.to_string(), "datacenter server get");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(info.locator.current(), "https://x/previous");
    }

    #[test]
    fn failing_get_is_reported_as_execution_failure() {
        let host = FakeHost::default().with_command(
            &["dns", "zone", "get"],
            &["zone-id"],
            Err("API returned 404: zone not found"),
        );
        let info = WaitInfo::new();
        let err = info
            .resolve_and_run(
                &host,
                &CommandPath::new(["dns", "zone", "delete"]),
                &[FlagAssignment::new("zone-id", "z1")],
            )
            .unwrap_err();

        assert!(matches!(err, ResolutionError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("failed to execute equivalent get command"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("API returned 404: zone not found"));
    }

    #[test]
    fn get_without_href_is_terminal() {
        let host = FakeHost::default().with_command(
            &["certificate", "get"],
            &["certificate-id"],
            Ok(Some(json!({"id": "c1"}))),
        );
        let info = WaitInfo::new();
        let err = info
            .resolve_and_run(
                &host,
                &CommandPath::new(["certificate", "delete"]),
                &[FlagAssignment::new("certificate-id", "c1")],
            )
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NoLocator { .. }));
        assert!(info.locator.is_empty());
    }
}
