/*!
`path.rs`

`CommandPath`: the chain of subcommand names that identifies one node of
the command tree, without the program name.

  cloudctl datacenter server create ...  ->  ["datacenter", "server", "create"]
*/

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandPath(Vec<String>);

impl CommandPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment (the verb for leaf commands).
    pub fn verb(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Everything but the last segment (the resource namespace for leaf commands).
    pub fn namespace(&self) -> &[String] {
        match self.0.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Same namespace, different verb. `None` when there is no namespace to
    /// stay in (paths shorter than two segments).
    pub fn sibling(&self, verb: &str) -> Option<CommandPath> {
        if self.0.len() < 2 {
            return None;
        }
        let mut segments = self.namespace().to_vec();
        segments.push(verb.to_string());
        Some(Self(segments))
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}
