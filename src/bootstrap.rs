//! Provider naming
//!
//! The provider is named after its binary so one build can be installed under
//! several names, each exposing its own set of resource types.

/// Name used when nothing else names the provider
pub const DEFAULT_NAME: &str = "multiverse";

/// Environment variable that overrides the provider name
pub const NAME_VAR: &str = "MULTIVERSE_PROVIDER_NAME";

const BINARY_PREFIX: &str = "terraform-provider-";

/// Resolve the provider name from an explicit override or the binary name.
pub fn provider_name(override_name: Option<&str>, argv0: Option<&str>) -> String {
    if let Some(name) = override_name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    argv0
        .and_then(|arg| std::path::Path::new(arg).file_stem())
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(BINARY_PREFIX))
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_NAME)
        .to_string()
}

/// Name of the variable listing extra resource types for `provider`
pub fn resource_types_var(provider: &str) -> String {
    format!("TERRAFORM_{}_RESOURCETYPES", provider.to_uppercase())
}

/// Resource type names for `provider`.
///
/// The provider name itself always comes first. Each listed type is prefixed
/// with `<provider>_` unless it already is.
pub fn resource_types(provider: &str, listed: Option<&str>) -> Vec<String> {
    let prefix = format!("{provider}_");
    let mut types = vec![provider.to_string()];

    for name in listed.unwrap_or_default().split_whitespace() {
        let name = if name.starts_with(&prefix) {
            name.to_string()
        } else {
            format!("{prefix}{name}")
        };
        if !types.contains(&name) {
            types.push(name);
        }
    }

    types
}

/// Provider name for the running process
pub fn current_name() -> String {
    let override_name = std::env::var(NAME_VAR).ok();
    let argv0 = std::env::args().next();
    provider_name(override_name.as_deref(), argv0.as_deref())
}

/// Resource type names for the running process
pub fn current_resource_types(provider: &str) -> Vec<String> {
    let listed = std::env::var(resource_types_var(provider)).ok();
    resource_types(provider, listed.as_deref())
}
