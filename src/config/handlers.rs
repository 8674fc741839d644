//! Handler definitions: the built-in table and `[[handler]]` entries.
use serde::Deserialize;

use crate::formatters::{HandlerDescriptor, IoMode};

/// A handler as written in `cfgctl.toml` (or the built-in table).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerSpec {
    /// Display name; a config entry with a built-in's name replaces it.
    pub name: String,
    /// Executable looked up on `PATH`.
    pub program: String,
    /// Arguments placed before the file path(s).
    #[serde(default)]
    pub args: Vec<String>,
    /// I/O mode, `batch` unless stated.
    #[serde(default)]
    pub mode: IoMode,
    /// Regular expressions matched against the full path.
    pub rules: Vec<String>,
}

impl HandlerSpec {
    fn new(name: &str, program: &str, args: &[&str], mode: IoMode, rules: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            mode,
            rules: rules.iter().map(ToString::to_string).collect(),
        }
    }

    /// The invocation half of this spec.
    #[must_use]
    pub fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor {
            name: self.name.clone(),
            program: self.program.clone(),
            args: self.args.clone(),
            mode: self.mode,
        }
    }
}

/// yamlfmt configuration, relative to the repository root handlers run from.
pub const YAMLFMT_CONFIG: &str = ".yamlfmt";

/// The built-in handler table, in registration order.
#[must_use]
pub fn builtin() -> Vec<HandlerSpec> {
    use IoMode::{Batch, RewriteInPlace};
    vec![
        HandlerSpec::new("JSON", "jq", &["."], RewriteInPlace, &[r".*\.json$"]),
        HandlerSpec::new("Lua", "stylua", &[], Batch, &[r".*\.lua$"]),
        HandlerSpec::new("Python", "black", &[], Batch, &[r".*\.py$"]),
        HandlerSpec::new(
            "Shell",
            "shfmt",
            &["-i=2", "-w"],
            Batch,
            &[r".*\.(ba|z)?sh(env|rc)?$"],
        ),
        HandlerSpec::new("TOML", "tomll", &[], Batch, &[r".*\.toml$"]),
        HandlerSpec::new("XML", "xmllint", &[], RewriteInPlace, &[r".*\.plist$"]),
        HandlerSpec::new(
            "YAML",
            "yamlfmt",
            &["-conf", YAMLFMT_CONFIG],
            Batch,
            &[r".*\.ya?ml$"],
        ),
    ]
}

/// Merge `extra` into `base`: a same-named entry replaces the existing one in
/// place, anything else is appended.
#[must_use]
pub fn merge(mut base: Vec<HandlerSpec>, extra: Vec<HandlerSpec>) -> Vec<HandlerSpec> {
    for spec in extra {
        if let Some(slot) = base.iter_mut().find(|s| s.name == spec.name) {
            *slot = spec;
        } else {
            base.push(spec);
        }
    }
    base
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_stable() {
        let names: Vec<_> = builtin().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["JSON", "Lua", "Python", "Shell", "TOML", "XML", "YAML"]
        );
    }

    #[test]
    fn builtin_rewrite_handlers() {
        let rewrite: Vec<_> = builtin()
            .into_iter()
            .filter(|s| s.mode == IoMode::RewriteInPlace)
            .map(|s| s.program)
            .collect();
        assert_eq!(rewrite, vec!["jq", "xmllint"]);
    }

    #[test]
    fn yaml_uses_repository_config_without_formatting_it() {
        let yaml = builtin().into_iter().find(|s| s.name == "YAML").unwrap();
        assert_eq!(yaml.args, vec!["-conf", ".yamlfmt"]);
        let registry = crate::formatters::registry::PatternRegistry::from_specs(&builtin()).unwrap();
        for name in ["ci.yml", "a/b.yaml"] {
            assert_eq!(registry.resolve(std::path::Path::new(name)).unwrap().name, "YAML");
        }
        assert!(registry.resolve(std::path::Path::new(".yamlfmt")).is_none());
    }

    #[test]
    fn merge_replaces_by_name_in_place() {
        let custom = HandlerSpec::new("Lua", "lua-format", &["-i"], IoMode::Batch, &[r"\.lua$"]);
        let merged = merge(builtin(), vec![custom.clone()]);
        assert_eq!(merged.len(), 7);
        assert_eq!(merged[1], custom);
    }

    #[test]
    fn merge_appends_new_names() {
        let md = HandlerSpec::new("Markdown", "mdformat", &[], IoMode::Batch, &[r"\.md$"]);
        let merged = merge(builtin(), vec![md]);
        assert_eq!(merged.last().unwrap().name, "Markdown");
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: HandlerSpec =
            toml::from_str("name = \"Md\"\nprogram = \"mdformat\"\nrules = ['\\.md$']").unwrap();
        assert!(spec.args.is_empty());
        assert_eq!(spec.mode, IoMode::Batch);
        assert_eq!(spec.descriptor().program, "mdformat");
    }
}
