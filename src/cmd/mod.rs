/*!
Command dispatcher.

Ties the command tree to the REST transport:

  run(matches, argv)
    -> leaf command + (resource, verb)
    -> invoke: build request, send, observe body
    -> print (text table or JSON)
    -> --wait-for-state: locate href, poll until ready / gone

Module Layout:
  src/cmd/
    mod.rs       (this file: Dispatcher)
    catalog.rs   (resources, verbs, fields, routes)
    registry.rs  (clap command tree built from the catalog)
    path.rs      (CommandPath)
    flags.rs     (FlagAssignment collect / project / to_args)
    request.rs   (leaf matches -> ApiRequest)
    format.rs    (text rendering)

The dispatcher is also the `CommandHost` the locator resolver runs nested
`get` commands through, so a nested invocation shares the context (and the
wait state) of the command that triggered it.
*/

pub mod catalog;
pub mod flags;
pub mod format;
pub mod path;
pub mod registry;
pub mod request;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::ArgMatches;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{Context, OutputFormat};
use crate::wait::{self, WaitTarget};
use crate::waitinfo::{CommandHost, ResolutionError};
use catalog::{Resource, Verb};
use flags::FlagAssignment;
use format::StyleOptions;
use path::CommandPath;
use registry::{CommandRegistry, DEFAULT_TIMEOUT_SECS};

pub struct Dispatcher {
    registry: CommandRegistry,
    ctx: Context,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, ctx: Context) -> Self {
        Self { registry, ctx }
    }

    #[cfg(test)]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Execute a parsed top-level invocation. `argv` is what `matches` was
    /// parsed from, binary name included.
    pub fn run(&self, matches: &ArgMatches, argv: &[OsString]) -> Result<()> {
        let (path, leaf) = self.registry.leaf(matches);
        let (resource, verb) = self
            .registry
            .target(&path)
            .ok_or_else(|| anyhow!("'{path}' is not a runnable command"))?;

        let body = self
            .invoke(resource, verb, leaf)
            .with_context(|| format!("'{path}' failed"))?;
        self.print(resource, verb, body.as_ref())?;

        if verb.is_mutating() && leaf.get_flag("wait-for-state") {
            let timeout = leaf
                .get_one::<u64>("timeout")
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
            let Some(target) = WaitTarget::for_verb(verb) else {
                return Ok(());
            };
            match self.locate(&path, leaf, argv) {
                Ok(href) => wait::wait_for(&self.ctx, &href, target, Duration::from_secs(timeout))?,
                Err(err) => {
                    let err = anyhow::Error::new(err);
                    warn!("not waiting for state: {err:#}");
                }
            }
        }
        Ok(())
    }

    /// Build, send and record one leaf command.
    fn invoke(&self, resource: &Resource, verb: Verb, matches: &ArgMatches) -> Result<Option<Value>> {
        let request = request::build(resource, verb, matches)?;
        let response = self.ctx.send(&request)?;
        if let Some(body) = &response.body
            && let Err(err) = self.ctx.waitinfo.observe(body)
        {
            warn!(%request, "response not recorded: {err}");
        }
        debug!(%request, status = response.status, "done");
        Ok(response.body)
    }

    /// Locator of the resource `path` just touched: the tracked href, or the
    /// one the sibling `get` command reports.
    fn locate(
        &self,
        path: &CommandPath,
        leaf: &ArgMatches,
        argv: &[OsString],
    ) -> Result<String, ResolutionError> {
        let waitinfo = &self.ctx.waitinfo;
        if !waitinfo.locator.is_empty() {
            return Ok(waitinfo.locator.current());
        }
        info!(command = %path, "response carried no href; asking the get command");
        let flags = self.registry.set_flags(path, leaf, argv);
        waitinfo.resolve_and_run(self, path, &flags)
    }

    fn print(&self, resource: &Resource, verb: Verb, body: Option<&Value>) -> Result<()> {
        match self.ctx.output {
            OutputFormat::Json => {
                if let Some(body) = body {
                    println!("{}", serde_json::to_string_pretty(body)?);
                }
            }
            OutputFormat::Text => {
                println!("{}", format::render(resource, verb, body, &StyleOptions::detect()));
            }
        }
        Ok(())
    }
}

impl CommandHost for Dispatcher {
    fn declared_flags(&self, path: &CommandPath) -> Option<BTreeSet<String>> {
        self.registry.declared_flags(path)
    }

    fn execute(&self, path: &CommandPath, flags: &[FlagAssignment]) -> Result<Option<Value>> {
        let node = self
            .registry
            .find(path)
            .ok_or_else(|| anyhow!("unknown command '{path}'"))?;
        let (resource, verb) = self
            .registry
            .target(path)
            .ok_or_else(|| anyhow!("'{path}' is not a runnable command"))?;

        let args = flags::to_args(node, flags);
        debug!(command = %path, ?args, "nested invocation");
        let matches = node
            .clone()
            .no_binary_name(true)
            .try_get_matches_from(args)
            .with_context(|| format!("invalid flags for '{path}'"))?;
        self.invoke(resource, verb, &matches)
    }
}
