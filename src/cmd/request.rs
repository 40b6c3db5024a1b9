/*!
request.rs - turn a parsed leaf command into an `ApiRequest`.

  list    GET    collection        ?depth ?maxResults
  get     GET    collection/{id}   ?depth
  create  POST   collection        {"properties": {...}}
  update  PATCH / PUT collection/{id}  (see UpdateStyle)
  delete  DELETE collection/{id}

Route placeholders (`{datacenter-id}`) are filled from flag values. Body
field values are coerced with the field's type hint.
*/

use anyhow::{Result, anyhow, bail};
use clap::ArgMatches;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::api::ApiRequest;
use crate::cmd::catalog::{Resource, UpdateStyle, Verb};

pub fn build(resource: &Resource, verb: Verb, matches: &ArgMatches) -> Result<ApiRequest> {
    let collection = resource
        .collection
        .ok_or_else(|| anyhow!("'{}' is a command group, not a resource", resource.name))?;
    let lookup = |name: &str| flag_value(matches, name);

    let request = match verb {
        Verb::List => {
            let mut request = ApiRequest::new(Method::GET, fill_route(collection, lookup)?);
            if let Some(depth) = number_flag(matches, "depth") {
                request = request.with_query("depth", depth);
            }
            if let Some(max) = number_flag(matches, "max-results") {
                request = request.with_query("maxResults", max);
            }
            request
        }
        Verb::Get => {
            let mut request = ApiRequest::new(Method::GET, fill_route(&item_route(resource)?, lookup)?);
            if let Some(depth) = number_flag(matches, "depth") {
                request = request.with_query("depth", depth);
            }
            request
        }
        Verb::Create => ApiRequest::new(Method::POST, fill_route(collection, lookup)?)
            .with_body(json!({ "properties": properties(resource, matches) })),
        Verb::Update => {
            let props = properties(resource, matches);
            if props.is_empty() {
                let names: Vec<String> = resource.fields.iter().map(|f| format!("--{}", f.flag)).collect();
                bail!("nothing to update; pass at least one of {}", names.join(", "));
            }
            let route = fill_route(&item_route(resource)?, lookup)?;
            match resource.update {
                UpdateStyle::PatchProperties => {
                    ApiRequest::new(Method::PATCH, route).with_body(Value::Object(props))
                }
                UpdateStyle::PatchEnvelope => {
                    ApiRequest::new(Method::PATCH, route).with_body(json!({ "properties": props }))
                }
                UpdateStyle::PutEnvelope => {
                    ApiRequest::new(Method::PUT, route).with_body(json!({ "properties": props }))
                }
            }
        }
        Verb::Delete => ApiRequest::new(Method::DELETE, fill_route(&item_route(resource)?, lookup)?),
    };
    Ok(request)
}

fn item_route(resource: &Resource) -> Result<String> {
    resource
        .item_route()
        .ok_or_else(|| anyhow!("'{}' has no single-item route", resource.name))
}

/// Split `template` into path segments, replacing `{flag}` with the flag's value.
pub fn fill_route<'a>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Result<Vec<String>> {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                Some(flag) => lookup(flag)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| value.trim().to_string())
                    .ok_or_else(|| anyhow!("missing required flag --{flag}")),
                None => Ok(segment.to_string()),
            }
        })
        .collect()
}

/// Body properties from the resource fields present on the command line.
fn properties(resource: &Resource, matches: &ArgMatches) -> Map<String, Value> {
    let mut props = Map::new();
    for field in resource.fields {
        if let Some(raw) = flag_value(matches, field.flag) {
            props.insert(field.key.to_string(), coerce_value(raw, field.kind));
        }
    }
    props
}

fn flag_value<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a str> {
    matches
        .try_get_one::<String>(name)
        .ok()
        .flatten()
        .map(String::as_str)
}

fn number_flag(matches: &ArgMatches, name: &str) -> Option<u32> {
    matches.try_get_one::<u32>(name).ok().flatten().copied()
}

/// Attempt to coerce a raw string into a JSON value using a primitive type hint.
pub fn coerce_value(raw: &str, type_hint: &str) -> Value {
    match type_hint {
        "integer" => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "number" => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        "boolean" => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Value::Bool(true),
            "false" | "0" | "no" | "n" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        "array" => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::registry::CommandRegistry;

    fn build_from(args: &[&str]) -> Result<ApiRequest> {
        let registry = CommandRegistry::new();
        let mut argv = vec!["cloudctl"];
        argv.extend_from_slice(args);
        let matches = registry
            .command()
            .clone()
            .try_get_matches_from(argv)
            .unwrap();
        let (path, leaf) = registry.leaf(&matches);
        let (resource, verb) = registry.target(&path).unwrap();
        build(resource, verb, leaf)
    }

    #[test]
    fn coerce_integer() {
        assert_eq!(coerce_value("42", "integer"), json!(42));
        assert_eq!(
            coerce_value("x42", "integer"),
            json!("x42"),
            "invalid integer remains string"
        );
    }

    #[test]
    fn coerce_boolean_and_number() {
        assert_eq!(coerce_value("Yes", "boolean"), json!(true));
        assert_eq!(coerce_value("0", "boolean"), json!(false));
        assert_eq!(coerce_value("maybe", "boolean"), json!("maybe"));
        assert_eq!(coerce_value("10.5", "number"), json!(10.5));
    }

    #[test]
    fn coerce_array() {
        assert_eq!(
            coerce_value("10.0.0.1, 10.0.0.2,", "array"),
            json!(["10.0.0.1", "10.0.0.2"])
        );
    }

    #[test]
    fn fill_route_substitutes_flags() {
        let route = fill_route("/cloudapi/v6/datacenters/{datacenter-id}/servers", |name| {
            (name == "datacenter-id").then_some("dc1")
        })
        .unwrap();
        assert_eq!(route, ["cloudapi", "v6", "datacenters", "dc1", "servers"]);

        let err = fill_route("/dns/v1/zones/{zone-id}", |_| Some("  ")).unwrap_err();
        assert_eq!(err.to_string(), "missing required flag --zone-id");
    }

    #[test]
    fn create_posts_properties_envelope() {
        let request = build_from(&[
            "datacenter", "server", "create", "--datacenter-id", "dc1", "--name", "web",
            "--cores", "2", "--ram", "2048",
        ])
        .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path(), "/cloudapi/v6/datacenters/dc1/servers");
        assert_eq!(
            request.body,
            Some(json!({"properties": {"name": "web", "cores": 2, "ram": 2048}}))
        );
    }

    #[test]
    fn postgres_create_maps_version_flag() {
        let request = build_from(&[
            "dbaas", "postgres", "cluster", "create", "--name", "db", "--postgres-version", "15",
            "--instances", "1", "--cores", "2", "--ram", "4096", "--storage-size", "20480",
            "--location", "de/fra",
        ])
        .unwrap();
        assert_eq!(request.path(), "/databases/postgresql/clusters");
        let props = &request.body.unwrap()["properties"];
        assert_eq!(props["postgresVersion"], json!("15"));
        assert_eq!(props["storageSize"], json!(20480));
    }

    #[test]
    fn get_uses_item_route_and_depth() {
        let request = build_from(&[
            "datacenter", "server", "nic", "get", "--datacenter-id", "a", "--server-id", "b",
            "--nic-id", "c", "--depth", "2",
        ])
        .unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path(), "/cloudapi/v6/datacenters/a/servers/b/nics/c");
        assert_eq!(request.query, vec![("depth".to_string(), "2".to_string())]);
        assert!(request.body.is_none());
    }

    #[test]
    fn missing_parent_id_is_reported() {
        let err = build_from(&["datacenter", "server", "get", "--server-id", "s"]).unwrap_err();
        assert_eq!(err.to_string(), "missing required flag --datacenter-id");
    }

    #[test]
    fn update_styles() {
        let patch = build_from(&["datacenter", "update", "--datacenter-id", "dc", "--name", "n"]).unwrap();
        assert_eq!(patch.method, Method::PATCH);
        assert_eq!(patch.body, Some(json!({"name": "n"})));

        let put = build_from(&["dns", "zone", "update", "--zone-id", "z", "--enabled", "false"]).unwrap();
        assert_eq!(put.method, Method::PUT);
        assert_eq!(put.path(), "/dns/v1/zones/z");
        assert_eq!(put.body, Some(json!({"properties": {"enabled": false}})));

        let envelope = build_from(&["certificate", "update", "--certificate-id", "c", "--name", "n"]).unwrap();
        assert_eq!(envelope.method, Method::PATCH);
        assert_eq!(envelope.body, Some(json!({"properties": {"name": "n"}})));
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = build_from(&["datacenter", "lan", "update", "--datacenter-id", "d", "--lan-id", "1"])
            .unwrap_err();
        assert!(err.to_string().contains("nothing to update"));
        assert!(err.to_string().contains("--public"));
    }

    #[test]
    fn list_and_delete() {
        let list = build_from(&["dns", "zone", "list", "--max-results", "10"]).unwrap();
        assert_eq!(list.path(), "/dns/v1/zones");
        assert_eq!(list.query, vec![("maxResults".to_string(), "10".to_string())]);

        let delete = build_from(&["container-registry", "delete", "--registry-id", "r1"]).unwrap();
        assert_eq!(delete.method, Method::DELETE);
        assert_eq!(delete.path(), "/containerregistries/registries/r1");
    }
}
