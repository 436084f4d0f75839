//! Loads the static service-name → endpoint-list table consumed by
//! `gateway_dispatch::StaticServiceDiscovery`.
//!
//! Format: `GATEWAY_SERVICE_{NAME}=http://host-a:8080,http://host-b:8080`,
//! one environment variable per logical service. `{NAME}` is
//! lower-cased and underscores become dashes to recover the logical
//! service name used elsewhere (`business-service`, not `BUSINESS_SERVICE`).

use std::collections::HashMap;
use std::env;

/// Scan the environment for `{prefix}{NAME}` variables and build a
/// logical-name → endpoint-URL-list table.
pub fn load_service_table_from_env(prefix: &str) -> HashMap<String, Vec<String>> {
    let mut table = HashMap::new();
    for (key, value) in env::vars() {
        let Some(suffix) = key.strip_prefix(prefix) else {
            continue;
        };
        let service_name = suffix.to_lowercase().replace('_', "-");
        let endpoints: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !endpoints.is_empty() {
            table.insert(service_name, endpoints);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_vars_into_dash_cased_names() {
        env::set_var("GATEWAY_SERVICE_BUSINESS_SERVICE", "http://a:8080, http://b:8080");
        let table = load_service_table_from_env("GATEWAY_SERVICE_");
        assert_eq!(
            table.get("business-service"),
            Some(&vec!["http://a:8080".to_string(), "http://b:8080".to_string()])
        );
        env::remove_var("GATEWAY_SERVICE_BUSINESS_SERVICE");
    }
}
