//! Poll a resource href until a mutating command has taken effect.
//!
//! create / update : `metadata.state` (or `metadata.status`) becomes ready
//! delete          : the href answers 404

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result, bail};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::ApiRequest;
use crate::cmd::catalog::Verb;
use crate::context::Context;

const READY_STATES: &[&str] = &["AVAILABLE", "ACTIVE", "RUNNING", "ENABLED", "DEPLOYED"];
const FAILED_STATES: &[&str] = &["FAILED", "ERROR", "FAILED_CREATING", "FAILED_UPDATING"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Ready,
    Gone,
}

impl WaitTarget {
    pub fn for_verb(verb: Verb) -> Option<Self> {
        match verb {
            Verb::Create | Verb::Update => Some(WaitTarget::Ready),
            Verb::Delete => Some(WaitTarget::Gone),
            Verb::Get | Verb::List => None,
        }
    }
}

/// Lifecycle state of a decoded resource body.
pub fn resource_state(body: &Value) -> Option<&str> {
    let metadata = body.get("metadata")?;
    metadata
        .get("state")
        .or_else(|| metadata.get("status"))?
        .as_str()
}

fn state_in(state: &str, set: &[&str]) -> bool {
    set.iter().any(|s| s.eq_ignore_ascii_case(state))
}

/// Block until `href` reaches `target` or `timeout` elapses.
pub fn wait_for(ctx: &Context, href: &str, target: WaitTarget, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    let request = ApiRequest::href(Method::GET, href);
    info!(href, ?target, timeout_secs = timeout.as_secs(), "waiting for resource");

    loop {
        match (target, ctx.send(&request)) {
            (WaitTarget::Gone, Err(err)) if err.status() == Some(404) => {
                info!(href, elapsed_ms = started.elapsed().as_millis() as u64, "resource is gone");
                return Ok(());
            }
            (_, Err(err)) => {
                return Err(err).with_context(|| format!("Failed to poll {href}"));
            }
            (WaitTarget::Ready, Ok(response)) => {
                match response.body.as_ref().and_then(resource_state) {
                    Some(state) if state_in(state, READY_STATES) => {
                        info!(href, state, elapsed_ms = started.elapsed().as_millis() as u64, "resource is ready");
                        return Ok(());
                    }
                    Some(state) if state_in(state, FAILED_STATES) => {
                        bail!("Resource {href} entered state {state}");
                    }
                    state => debug!(?state, "not ready yet"),
                }
            }
            (WaitTarget::Gone, Ok(_)) => debug!("still present"),
        }

        if started.elapsed() >= timeout {
            bail!("Timed out after {}s waiting for {href}", timeout.as_secs());
        }
        std::thread::sleep(ctx.settings.poll_interval);
    }
}
