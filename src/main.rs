use std::ffi::OsString;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};

mod api;
mod cmd;
mod config;
mod context;
mod utils;
mod wait;
mod waitinfo;

use api::HttpTransport;
use cmd::Dispatcher;
use cmd::registry::CommandRegistry;
use config::{Overrides, Settings};
use context::{Context, OutputFormat};

/// cloudctl - command-line client for cloud provider REST APIs
///
/// Command layout (generated from the resource catalog in cmd/catalog.rs):
///   cloudctl <resource> [<child> ...] <list|get|create|update|delete> [flags]
///
/// Examples:
///   cloudctl datacenter list
///   cloudctl datacenter server get --datacenter-id DC --server-id SRV -o json
///   cloudctl datacenter server create --datacenter-id DC --name web --cores 2 --ram 2048 -w
///   cloudctl dns zone record delete --zone-id Z --record-id R --wait-for-state
///
/// Global flags / env:
///   -v / -vv        Increase verbosity
///   -q / --quiet    Errors only
///   -o / --output   text | json
///   --api-url       CLOUDCTL_API_URL
///   --token         CLOUDCTL_TOKEN (or --username / --password)
///   --config        CLOUDCTL_CONFIG, default <config dir>/cloudctl/config.yaml
///
/// --wait-for-state (-w) on create / update / delete polls the resource's
/// href until it is ready (or gone). When the response carried no href the
/// matching `get` command is run first to find it.
fn main() -> Result<()> {
    let registry = CommandRegistry::new();
    let argv: Vec<OsString> = std::env::args_os().collect();
    let matches = registry.command().clone().get_matches_from(&argv);

    // Initialize logging
    let level = utils::derive_level(matches.get_count("verbose"), matches.get_flag("quiet"));
    utils::init_logging(level);

    let settings = Settings::load(&Overrides::from_matches(&matches))?;
    let output = matches
        .get_one::<String>("output")
        .and_then(|s| OutputFormat::from_str_ci(s))
        .ok_or_else(|| anyhow!("unsupported output format"))?;

    let transport = HttpTransport::new(settings.api_url.clone(), settings.auth.clone())
        .with_context(|| format!("Failed to set up HTTP client for {}", settings.api_url))?;
    let ctx = Context::new(settings, Arc::new(transport), output);

    Dispatcher::new(registry, ctx).run(&matches, &argv)
}
