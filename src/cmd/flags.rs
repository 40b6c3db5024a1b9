/*!
`flags.rs`

Flag assignments as the user typed them: long name (no dashes) plus the
literal value, in command-line order, duplicates kept.

  collect  : ArgMatches + argv -> Vec<FlagAssignment>   (top-level invocation)
  project  : keep only the names another command declares
  to_args  : Vec<FlagAssignment> -> argv for a nested parse
*/

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;

use clap::parser::ValueSource;
use clap::{ArgMatches, Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagAssignment {
    pub name: String,
    pub value: String,
}

impl FlagAssignment {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FlagAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}={}", self.name, self.value)
    }
}

/// Flags explicitly given on the command line for `node`, in `argv` order.
///
/// Defaults and environment-provided values are not assignments and are
/// skipped, as is every name in `skip`. clap numbers arguments per
/// subcommand level, so positions come from scanning `argv` instead.
pub fn collect(
    node: &Command,
    matches: &ArgMatches,
    skip: &BTreeSet<String>,
    argv: &[OsString],
) -> Vec<FlagAssignment> {
    let seen = occurrences(node, argv);
    let mut positioned: Vec<(usize, FlagAssignment)> = Vec::new();
    for arg in node.get_arguments() {
        let Some(long) = arg.get_long() else {
            continue;
        };
        let id = arg.get_id().as_str();
        if skip.contains(long) || matches.value_source(id) != Some(ValueSource::CommandLine) {
            continue;
        }
        let values: Vec<String> = if arg.get_action().takes_values() {
            match matches.get_raw(id) {
                Some(raw) => raw.map(|v| v.to_string_lossy().into_owned()).collect(),
                None => continue,
            }
        } else {
            vec!["true".to_string()]
        };

        // Overridden occurrences are gone from `matches`; the survivors are the last ones.
        let positions: Vec<usize> = seen
            .iter()
            .filter(|(_, name)| name == long)
            .map(|(pos, _)| *pos)
            .collect();
        let offset = positions.len().saturating_sub(values.len());
        for (k, value) in values.into_iter().enumerate() {
            let pos = positions.get(offset + k).copied().unwrap_or(usize::MAX);
            positioned.push((pos, FlagAssignment::new(long, value)));
        }
    }
    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.into_iter().map(|(_, flag)| flag).collect()
}

/// `(argv position, long name)` of every flag of `node` in `argv`.
/// `argv[0]` is the binary name; scanning stops at `--`.
fn occurrences(node: &Command, argv: &[OsString]) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    let mut tokens = argv.iter().map(|a| a.to_string_lossy()).enumerate().skip(1);
    while let Some((pos, token)) = tokens.next() {
        if token == "--" {
            break;
        }
        if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, _)) => (name, true),
                None => (body, false),
            };
            let Some(arg) = node.get_arguments().find(|a| a.get_long() == Some(name)) else {
                continue;
            };
            found.push((pos, name.to_string()));
            if arg.get_action().takes_values() && !inline {
                tokens.next();
            }
        } else if let Some(shorts) = token.strip_prefix('-') {
            for (i, c) in shorts.char_indices() {
                let Some(arg) = node.get_arguments().find(|a| a.get_short() == Some(c)) else {
                    break;
                };
                if let Some(long) = arg.get_long() {
                    found.push((pos, long.to_string()));
                }
                if arg.get_action().takes_values() {
                    // `-o json` consumes the next token, `-ojson` does not.
                    if i + c.len_utf8() == shorts.len() {
                        tokens.next();
                    }
                    break;
                }
            }
        }
    }
    found
}

/// Keep the assignments whose name is in `declared`. Order and duplicates survive.
pub fn project(flags: &[FlagAssignment], declared: &BTreeSet<String>) -> Vec<FlagAssignment> {
    flags
        .iter()
        .filter(|flag| declared.contains(&flag.name))
        .cloned()
        .collect()
}

/// Render assignments as arguments `node` can parse (no binary name).
///
/// Value-taking flags use `--name=value` so values starting with `-` survive;
/// switches are emitted bare when truthy and dropped otherwise.
pub fn to_args(node: &Command, flags: &[FlagAssignment]) -> Vec<String> {
    let mut args = Vec::with_capacity(flags.len());
    for flag in flags {
        let takes_values = node
            .get_arguments()
            .find(|arg| arg.get_long() == Some(flag.name.as_str()))
            .map(|arg| arg.get_action().takes_values())
            .unwrap_or(true);
        if takes_values {
            args.push(flag.to_string());
        } else if is_truthy(&flag.value) {
            args.push(format!("--{}", flag.name));
        }
    }
    args
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};

    fn command() -> Command {
        Command::new("probe")
            .arg(Arg::new("datacenter-id").long("datacenter-id").action(ArgAction::Append))
            .arg(Arg::new("name").long("name"))
            .arg(Arg::new("wait").long("wait").action(ArgAction::SetTrue))
            .arg(Arg::new("output").long("output").default_value("text"))
    }

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn declared(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn projection_keeps_order_and_duplicates() {
        let flags = vec![
            FlagAssignment::new("datacenter-id", "X"),
            FlagAssignment::new("name", "Y"),
            FlagAssignment::new("datacenter-id", "Z"),
        ];
        let projected = project(&flags, &declared(&["datacenter-id"]));
        assert_eq!(
            projected,
            vec![
                FlagAssignment::new("datacenter-id", "X"),
                FlagAssignment::new("datacenter-id", "Z"),
            ]
        );
        assert_eq!(project(&projected, &declared(&["datacenter-id"])), projected);
    }

    #[test]
    fn collect_orders_by_position() {
        let cmd = command();
        let args = argv(&[
            "probe",
            "--datacenter-id",
            "1",
            "--wait",
            "--name",
            "web",
            "--datacenter-id",
            "2",
        ]);
        let matches = cmd.clone().try_get_matches_from(&args).unwrap();
        let flags = collect(&cmd, &matches, &BTreeSet::new(), &args);
        assert_eq!(
            flags,
            vec![
                FlagAssignment::new("datacenter-id", "1"),
                FlagAssignment::new("wait", "true"),
                FlagAssignment::new("name", "web"),
                FlagAssignment::new("datacenter-id", "2"),
            ]
        );
    }

    #[test]
    fn collect_keeps_last_override_and_reads_short_flags() {
        let cmd = Command::new("probe")
            .args_override_self(true)
            .arg(Arg::new("name").short('n').long("name"))
            .arg(Arg::new("wait").short('w').long("wait").action(ArgAction::SetTrue))
            .arg(Arg::new("zone").long("zone"));
        let args = argv(&["probe", "--zone=z", "-n", "a", "-w", "--name", "b", "--", "--zone"]);
        let matches = cmd.clone().try_get_matches_from(&args[..7]).unwrap();
        let flags = collect(&cmd, &matches, &BTreeSet::new(), &args);
        assert_eq!(
            flags,
            vec![
                FlagAssignment::new("zone", "z"),
                FlagAssignment::new("wait", "true"),
                FlagAssignment::new("name", "b"),
            ]
        );
    }

    #[test]
    fn collect_skips_defaults_and_skipped_names() {
        let cmd = command();
        let args = argv(&["probe", "--name", "web"]);
        let matches = cmd.clone().try_get_matches_from(&args).unwrap();
        assert!(collect(&cmd, &matches, &declared(&["name"]), &args).is_empty());
        assert_eq!(
            collect(&cmd, &matches, &BTreeSet::new(), &args),
            vec![FlagAssignment::new("name", "web")]
        );
    }

    #[test]
    fn to_args_round_trips_through_parser() {
        let cmd = command();
        let flags = vec![
            FlagAssignment::new("name", "-dash"),
            FlagAssignment::new("wait", "true"),
        ];
        let args = to_args(&cmd, &flags);
        assert_eq!(args, vec!["--name=-dash", "--wait"]);

        let matches = cmd
            .clone()
            .no_binary_name(true)
            .try_get_matches_from(&args)
            .unwrap();
        assert_eq!(matches.get_one::<String>("name").map(String::as_str), Some("-dash"));
        assert!(matches.get_flag("wait"));
    }

    #[test]
    fn falsy_switch_is_dropped() {
        let args = to_args(&command(), &[FlagAssignment::new("wait", "false")]);
        assert!(args.is_empty());
    }
}
