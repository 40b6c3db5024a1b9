/*!
`registry.rs`

The command tree, built from the resource catalog with clap's builder API.

  CommandRegistry::new()            build + finalize the tree
  find(path)                        node lookup
  declared_flags(path)              own + inherited long flag names
  leaf(matches)                     (CommandPath, leaf ArgMatches)
  set_flags(path, matches, argv)    FlagAssignments typed by the user
  target(path)                      (Resource, Verb) behind a leaf

Root-level ("session") flags configure the context once per process and
are never forwarded to nested invocations.
*/

use std::collections::BTreeSet;
use std::ffi::OsString;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::cmd::catalog::{self, Resource, Verb};
use crate::cmd::flags::{self, FlagAssignment};
use crate::cmd::path::CommandPath;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub struct CommandRegistry {
    root: Command,
    catalog: &'static [Resource],
    session_flags: BTreeSet<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::from_catalog(catalog::CATALOG)
    }

    pub fn from_catalog(resources: &'static [Resource]) -> Self {
        let mut root = root_command();
        for resource in resources {
            root = root.subcommand(resource_command(resource));
        }
        // Propagates global flags into every node so introspection sees them.
        root.build();

        let mut session_flags: BTreeSet<String> = root
            .get_arguments()
            .filter_map(Arg::get_long)
            .map(str::to_string)
            .collect();
        session_flags.extend(["help".to_string(), "version".to_string()]);

        Self {
            root,
            catalog: resources,
            session_flags,
        }
    }

    /// The root command, ready for parsing.
    pub fn command(&self) -> &Command {
        &self.root
    }

    pub fn find(&self, path: &CommandPath) -> Option<&Command> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.find_subcommand(segment)?;
        }
        Some(node)
    }

    /// Long names of every flag the command at `path` accepts, including the
    /// ones inherited from its ancestors.
    pub fn declared_flags(&self, path: &CommandPath) -> Option<BTreeSet<String>> {
        let mut declared = BTreeSet::new();
        let mut node = &self.root;
        for segment in path.segments() {
            declared.extend(
                node.get_arguments()
                    .filter(|arg| arg.is_global_set())
                    .filter_map(Arg::get_long)
                    .map(str::to_string),
            );
            node = node.find_subcommand(segment)?;
        }
        declared.extend(
            node.get_arguments()
                .filter_map(Arg::get_long)
                .map(str::to_string),
        );
        declared.remove("help");
        declared.remove("version");
        Some(declared)
    }

    /// Descend to the innermost subcommand of a parsed invocation.
    pub fn leaf<'m>(&self, matches: &'m ArgMatches) -> (CommandPath, &'m ArgMatches) {
        let mut segments = Vec::new();
        let mut current = matches;
        while let Some((name, sub)) = current.subcommand() {
            segments.push(name.to_string());
            current = sub;
        }
        (CommandPath::new(segments), current)
    }

    /// Flags the user typed for the leaf at `path`, minus session flags, in
    /// the order they appear in `argv`.
    pub fn set_flags(
        &self,
        path: &CommandPath,
        matches: &ArgMatches,
        argv: &[OsString],
    ) -> Vec<FlagAssignment> {
        match self.find(path) {
            Some(node) => flags::collect(node, matches, &self.session_flags, argv),
            None => Vec::new(),
        }
    }

    /// Resource and verb a leaf command operates on.
    pub fn target(&self, path: &CommandPath) -> Option<(&'static Resource, Verb)> {
        let verb = Verb::from_name(path.verb()?)?;
        let resource = catalog::find(self.catalog, path.namespace())?;
        resource.supports(verb).then_some((resource, verb))
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/* -------------------------------------------------------------------------- */
/* Tree construction                                                          */
/* -------------------------------------------------------------------------- */

fn root_command() -> Command {
    Command::new("cloudctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("cloudctl - command-line client for cloud provider REST APIs")
        .long_about(
            "Manage compute, DNS, database, container registry and certificate resources.\n\n\
             Examples:\n  \
             cloudctl datacenter list\n  \
             cloudctl datacenter server create --datacenter-id DC --name web --cores 2 --ram 2048 -w\n  \
             cloudctl dns zone delete --zone-id ZONE --wait-for-state",
        )
        .propagate_version(true)
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args_override_self(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase verbosity (-v, -vv)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only log errors"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .value_parser(["text", "json"])
                .default_value("text")
                .global(true)
                .help("Output format"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .value_name("URL")
                .env("CLOUDCTL_API_URL")
                .global(true)
                .help("API base URL"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .env("CLOUDCTL_TOKEN")
                .hide_env_values(true)
                .global(true)
                .help("Bearer token"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .value_name("USER")
                .env("CLOUDCTL_USERNAME")
                .global(true)
                .help("Username for basic authentication"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .env("CLOUDCTL_PASSWORD")
                .hide_env_values(true)
                .global(true)
                .help("Password for basic authentication"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .env("CLOUDCTL_CONFIG")
                .global(true)
                .help("Configuration file (YAML)"),
        )
}

fn resource_command(resource: &'static Resource) -> Command {
    let mut cmd = Command::new(resource.name)
        .about(resource.about)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true)
        .args_override_self(true);

    if let Some(id) = resource.id_flag {
        cmd = cmd.arg(
            Arg::new(id)
                .long(id)
                .value_name("ID")
                .global(true)
                .help(format!("Id of the {}", resource.name)),
        );
    }
    if resource.collection.is_some() {
        for verb in resource.verbs {
            cmd = cmd.subcommand(verb_command(resource, *verb));
        }
    }
    for child in resource.children {
        cmd = cmd.subcommand(resource_command(child));
    }
    cmd
}

fn verb_command(resource: &'static Resource, verb: Verb) -> Command {
    let cmd = Command::new(verb.name())
        .about(verb.about(resource.name))
        .args_override_self(true);

    match verb {
        Verb::List => cmd.arg(depth_arg()).arg(
            Arg::new("max-results")
                .long("max-results")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .help("Maximum number of items to return"),
        ),
        Verb::Get => cmd.arg(depth_arg()),
        Verb::Create | Verb::Update => {
            let required = verb == Verb::Create;
            let cmd = resource.fields.iter().fold(cmd, |cmd, field| {
                cmd.arg(
                    Arg::new(field.flag)
                        .long(field.flag)
                        .value_name(value_name(field.kind))
                        .required(required && field.required)
                        .help(field.help),
                )
            });
            with_wait_args(cmd)
        }
        Verb::Delete => with_wait_args(cmd),
    }
}

fn depth_arg() -> Arg {
    Arg::new("depth")
        .long("depth")
        .value_name("LEVEL")
        .value_parser(value_parser!(u32))
        .help("Level of detail of nested resources")
}

fn with_wait_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("wait-for-state")
            .short('w')
            .long("wait-for-state")
            .action(ArgAction::SetTrue)
            .help("Wait until the resource is ready (or gone, for deletes)"),
    )
    .arg(
        Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .value_parser(value_parser!(u64))
            .default_value("60")
            .help("Seconds to wait with --wait-for-state"),
    )
}

fn value_name(kind: &str) -> &'static str {
    match kind {
        "integer" => "INT",
        "number" => "NUMBER",
        "boolean" => "BOOL",
        "array" => "LIST",
        _ => "STRING",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> CommandPath {
        CommandPath::new(segments.iter().copied())
    }

    fn argv(args: &[&str]) -> Vec<OsString> {
        std::iter::once("cloudctl")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn parse(registry: &CommandRegistry, args: &[&str]) -> ArgMatches {
        registry
            .command()
            .clone()
            .try_get_matches_from(argv(args))
            .unwrap()
    }

    #[test]
    fn finds_nested_commands() {
        let registry = CommandRegistry::new();
        assert!(registry.find(&path(&["datacenter", "server", "get"])).is_some());
        assert!(registry.find(&path(&["dbaas", "postgres", "cluster", "delete"])).is_some());
        assert!(registry.find(&path(&["dns", "get"])).is_none());
        assert!(registry.find(&path(&["nope"])).is_none());
    }

    #[test]
    fn declared_flags_include_inherited_ids() {
        let registry = CommandRegistry::new();
        let declared = registry
            .declared_flags(&path(&["datacenter", "server", "get"]))
            .unwrap();
        for flag in ["datacenter-id", "server-id", "depth", "output"] {
            assert!(declared.contains(flag), "missing {flag}");
        }
        assert!(!declared.contains("name"));
        assert!(!declared.contains("wait-for-state"));
        assert!(!declared.contains("help"));

        let nic = registry
            .declared_flags(&path(&["datacenter", "server", "nic", "get"]))
            .unwrap();
        assert!(nic.contains("datacenter-id") && nic.contains("server-id") && nic.contains("nic-id"));
        assert!(registry.declared_flags(&path(&["datacenter", "disk", "get"])).is_none());
    }

    #[test]
    fn leaf_reports_full_path() {
        let registry = CommandRegistry::new();
        let matches = parse(&registry, &["dns", "zone", "record", "list", "--zone-id", "z"]);
        let (leaf_path, leaf) = registry.leaf(&matches);
        assert_eq!(leaf_path, path(&["dns", "zone", "record", "list"]));
        assert_eq!(leaf.get_one::<String>("zone-id").map(String::as_str), Some("z"));
    }

    #[test]
    fn set_flags_skip_session_flags_and_keep_order() {
        let registry = CommandRegistry::new();
        let args = [
            "-o",
            "json",
            "datacenter",
            "server",
            "create",
            "--name",
            "web",
            "--datacenter-id",
            "dc1",
            "--cores",
            "2",
            "--ram",
            "1024",
            "-w",
        ];
        let matches = parse(&registry, &args);
        let (leaf_path, leaf) = registry.leaf(&matches);
        let flags = registry.set_flags(&leaf_path, leaf, &argv(&args));
        let names: Vec<_> = flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "datacenter-id", "cores", "ram", "wait-for-state"]);
    }

    #[test]
    fn set_flags_order_group_level_ids_by_position() {
        let registry = CommandRegistry::new();
        let args = [
            "datacenter",
            "--datacenter-id",
            "123",
            "server",
            "delete",
            "--server-id",
            "456",
            "-w",
        ];
        let matches = parse(&registry, &args);
        let (leaf_path, leaf) = registry.leaf(&matches);
        let flags = registry.set_flags(&leaf_path, leaf, &argv(&args));
        assert_eq!(
            flags,
            vec![
                FlagAssignment::new("datacenter-id", "123"),
                FlagAssignment::new("server-id", "456"),
                FlagAssignment::new("wait-for-state", "true"),
            ]
        );
    }

    #[test]
    fn create_requires_required_fields() {
        let registry = CommandRegistry::new();
        let err = registry
            .command()
            .clone()
            .try_get_matches_from(["cloudctl", "datacenter", "create", "--name", "x"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn target_maps_leaf_to_resource() {
        let registry = CommandRegistry::new();
        let (resource, verb) = registry.target(&path(&["dns", "zone", "update"])).unwrap();
        assert_eq!(resource.name, "zone");
        assert_eq!(verb, Verb::Update);
        assert!(registry.target(&path(&["dns", "list"])).is_none());
    }

    #[test]
    fn tree_passes_clap_debug_asserts() {
        CommandRegistry::new().command().clone().debug_assert();
    }
}
