//! Translation of opaque option declarations into `clap` arguments.
//!
//! The keys understood here mirror the familiar `add_argument` vocabulary:
//! `help`, `required`, `default`, `nargs`, `action`, `choices`, `metavar`
//! and `dest`. Anything else is rejected so typos surface at build time.

use std::collections::HashSet;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction};
use mlbase_common::OptionSpec;
use serde_json::Value;

const KNOWN_KWARGS: &[&str] = &[
    "help", "required", "default", "nargs", "action", "choices", "metavar", "dest",
];

/// How parsed values of an argument are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgKind {
    /// At most one value.
    Single,
    /// Zero or more values.
    Many,
    /// Boolean switch.
    Flag,
    /// Occurrence counter.
    Count,
}

/// An argument id together with the way to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArgBinding {
    pub id: String,
    pub kind: ArgKind,
}

/// Build the `clap` argument for `spec`. Errors are human-readable reasons.
pub(super) fn to_arg(spec: &OptionSpec) -> Result<(Arg, ArgBinding), String> {
    let Some(first) = spec.names.first() else {
        return Err("option declares no names".to_string());
    };
    let positional = !first.starts_with('-');
    if positional && spec.names.len() > 1 {
        return Err("a positional takes exactly one name".to_string());
    }
    if !positional && !spec.is_flag() {
        return Err("flag and positional names cannot be mixed".to_string());
    }
    if let Some(key) = spec
        .kwargs
        .keys()
        .find(|k| !KNOWN_KWARGS.contains(&k.as_str()))
    {
        return Err(format!("unsupported keyword '{}'", key));
    }

    let id = match spec.kwargs.get("dest") {
        Some(Value::String(dest)) if !dest.is_empty() => dest.clone(),
        Some(_) => return Err("'dest' must be a non-empty string".to_string()),
        None => derive_id(&spec.names)?,
    };

    let mut arg = Arg::new(id.clone());
    if !positional {
        arg = apply_flag_names(arg, &spec.names)?;
    }

    let action = string_kwarg(spec, "action")?.unwrap_or("store");
    let nargs = spec.kwargs.get("nargs");
    let (mut arg, kind) = match action {
        "store_true" | "count" if positional => {
            return Err(format!("action '{}' requires a flag name", action));
        }
        "store_true" | "count" if nargs.is_some() => {
            return Err(format!("action '{}' does not take 'nargs'", action));
        }
        "store_true" => (arg.action(ArgAction::SetTrue), ArgKind::Flag),
        "count" => (arg.action(ArgAction::Count), ArgKind::Count),
        "append" => (arg.action(ArgAction::Append), ArgKind::Many),
        "store" => apply_nargs(arg.action(ArgAction::Set), nargs)?,
        other => return Err(format!("unsupported action '{}'", other)),
    };

    if let Some(help) = string_kwarg(spec, "help")? {
        arg = arg.help(help.to_string());
    }
    if let Some(metavar) = string_kwarg(spec, "metavar")? {
        arg = arg.value_name(metavar.to_string());
    }

    let takes_values = matches!(kind, ArgKind::Single | ArgKind::Many);
    let has_default = spec.kwargs.contains_key("default");
    if let Some(default) = spec.kwargs.get("default") {
        if !takes_values {
            return Err(format!("action '{}' does not take a default", action));
        }
        arg = match default {
            Value::Array(items) => {
                let values = items.iter().map(scalar_text).collect::<Result<Vec<_>, _>>()?;
                arg.default_values(values)
            }
            other => arg.default_value(scalar_text(other)?),
        };
    }

    if let Some(choices) = spec.kwargs.get("choices") {
        let Value::Array(items) = choices else {
            return Err("'choices' must be a list".to_string());
        };
        if !takes_values {
            return Err(format!("action '{}' does not take choices", action));
        }
        let values = items.iter().map(scalar_text).collect::<Result<Vec<_>, _>>()?;
        arg = arg.value_parser(PossibleValuesParser::new(values));
    }

    // Positionals are required unless they may be empty or have a default.
    let optional_nargs = matches!(nargs, Some(Value::String(n)) if n == "?" || n == "*");
    let required = match spec.kwargs.get("required") {
        Some(Value::Bool(required)) => *required,
        Some(_) => return Err("'required' must be a boolean".to_string()),
        None => positional && !optional_nargs && !has_default,
    };
    arg = arg.required(required);

    Ok((arg, ArgBinding { id, kind }))
}

/// Names already taken on one command. Clap panics at parse time on
/// duplicates, so they are rejected while building instead.
#[derive(Debug, Default)]
pub(super) struct UsedNames {
    ids: HashSet<String>,
    longs: HashSet<String>,
    shorts: HashSet<char>,
    last_positional: Option<(bool, ArgKind)>,
}

impl UsedNames {
    /// Start with the automatic `-h/--help`, plus `-V/--version` on the root.
    pub(super) fn for_command(is_root: bool) -> Self {
        let mut used = Self::default();
        used.ids.insert("help".to_string());
        used.longs.insert("help".to_string());
        used.shorts.insert('h');
        if is_root {
            used.ids.insert("version".to_string());
            used.longs.insert("version".to_string());
            used.shorts.insert('V');
        }
        used
    }

    /// Record the names of `spec`, compiled as `arg` / `binding`.
    pub(super) fn claim(
        &mut self,
        spec: &OptionSpec,
        arg: &Arg,
        binding: &ArgBinding,
    ) -> Result<(), String> {
        if !self.ids.insert(binding.id.clone()) {
            return Err(format!("id '{}' is already in use", binding.id));
        }
        for name in &spec.names {
            if let Some(long) = name.strip_prefix("--") {
                if !self.longs.insert(long.to_string()) {
                    return Err(format!("'{}' is already in use", name));
                }
            } else if let Some(short) = name.strip_prefix('-') {
                let taken = short.chars().any(|c| !self.shorts.insert(c));
                if taken {
                    return Err(format!("'{}' is already in use", name));
                }
            }
        }

        if arg.is_positional() {
            let required = arg.is_required_set();
            if let Some((previous_required, previous_kind)) = self.last_positional {
                if previous_kind == ArgKind::Many {
                    return Err("only the last positional may take several values".to_string());
                }
                if required && !previous_required {
                    return Err(
                        "a required positional cannot follow an optional one".to_string()
                    );
                }
            }
            self.last_positional = Some((required, binding.kind));
        }
        Ok(())
    }
}

fn derive_id(names: &[String]) -> Result<String, String> {
    let long = names.iter().find_map(|n| n.strip_prefix("--"));
    if let Some(long) = long {
        return Ok(long.replace('-', "_"));
    }
    let short = names.iter().find_map(|n| n.strip_prefix('-'));
    match short {
        Some(short) => Ok(short.to_string()),
        None => Ok(names[0].clone()),
    }
}

fn apply_flag_names(mut arg: Arg, names: &[String]) -> Result<Arg, String> {
    let mut has_long = false;
    let mut has_short = false;
    for name in names {
        if let Some(long) = name.strip_prefix("--") {
            if long.is_empty() {
                return Err("'--' is not a valid flag name".to_string());
            }
            arg = if has_long {
                arg.visible_alias(long.to_string())
            } else {
                arg.long(long.to_string())
            };
            has_long = true;
        } else if let Some(short) = name.strip_prefix('-') {
            let mut chars = short.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(format!(
                    "single-dash name '{}' must be exactly one character",
                    name
                ));
            };
            arg = if has_short {
                arg.visible_short_alias(c)
            } else {
                arg.short(c)
            };
            has_short = true;
        }
    }
    Ok(arg)
}

fn apply_nargs(arg: Arg, nargs: Option<&Value>) -> Result<(Arg, ArgKind), String> {
    match nargs {
        None => Ok((arg, ArgKind::Single)),
        Some(Value::String(n)) => match n.as_str() {
            "?" => Ok((arg.num_args(0..=1), ArgKind::Single)),
            "*" => Ok((arg.num_args(0..), ArgKind::Many)),
            "+" => Ok((arg.num_args(1..), ArgKind::Many)),
            other => Err(format!("unsupported nargs '{}'", other)),
        },
        Some(Value::Number(n)) => match n.as_u64() {
            Some(1) => Ok((arg.num_args(1), ArgKind::Single)),
            Some(count) if count > 1 => Ok((arg.num_args(count as usize), ArgKind::Many)),
            _ => Err(format!("nargs must be a positive count, got {}", n)),
        },
        Some(other) => Err(format!("unsupported nargs {}", other)),
    }
}

fn string_kwarg<'a>(spec: &'a OptionSpec, key: &str) -> Result<Option<&'a str>, String> {
    match spec.kwargs.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar value, got {}", other)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(spec: OptionSpec) -> ArgBinding {
        to_arg(&spec).map(|(_, b)| b).unwrap()
    }

    #[test]
    fn test_ids_follow_first_long_name() {
        assert_eq!(binding(OptionSpec::new(["-i", "--input-file"])).id, "input_file");
        assert_eq!(binding(OptionSpec::new(["-v"])).id, "v");
        assert_eq!(binding(OptionSpec::new(["name"])).id, "name");
        assert_eq!(
            binding(OptionSpec::new(["--input"]).kwarg("dest", "source")).id,
            "source"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(binding(OptionSpec::new(["--input"])).kind, ArgKind::Single);
        assert_eq!(
            binding(OptionSpec::new(["--tags"]).nargs("*")).kind,
            ArgKind::Many
        );
        assert_eq!(
            binding(OptionSpec::new(["--dry-run"]).action("store_true")).kind,
            ArgKind::Flag
        );
        assert_eq!(
            binding(OptionSpec::new(["-v"]).action("count")).kind,
            ArgKind::Count
        );
        assert_eq!(
            binding(OptionSpec::new(["--path"]).action("append")).kind,
            ArgKind::Many
        );
        assert_eq!(binding(OptionSpec::new(["pair"]).nargs(2)).kind, ArgKind::Many);
    }

    #[test]
    fn test_positional_required_by_default() {
        let (arg, _) = to_arg(&OptionSpec::new(["name"])).unwrap();
        assert!(arg.is_required_set());
        let (arg, _) = to_arg(&OptionSpec::new(["name"]).nargs("?")).unwrap();
        assert!(!arg.is_required_set());
        let (arg, _) = to_arg(&OptionSpec::new(["--name"])).unwrap();
        assert!(!arg.is_required_set());
        let (arg, _) = to_arg(&OptionSpec::new(["--name"]).required(true)).unwrap();
        assert!(arg.is_required_set());
    }

    #[test]
    fn test_rejects_bad_declarations() {
        assert!(to_arg(&OptionSpec::default()).is_err());
        assert!(to_arg(&OptionSpec::new(["a", "b"])).is_err());
        assert!(to_arg(&OptionSpec::new(["--a", "b"])).is_err());
        assert!(to_arg(&OptionSpec::new(["-abc"])).is_err());
        assert!(to_arg(&OptionSpec::new(["--x"]).kwarg("typo", true)).is_err());
        assert!(to_arg(&OptionSpec::new(["--x"]).action("store_const")).is_err());
        assert!(to_arg(&OptionSpec::new(["x"]).action("store_true")).is_err());
        assert!(to_arg(&OptionSpec::new(["--x"]).nargs("many")).is_err());
        assert!(to_arg(&OptionSpec::new(["--x"]).nargs(0)).is_err());
        assert!(
            to_arg(
                &OptionSpec::new(["--x"])
                    .action("store_true")
                    .default_value(true)
            )
            .is_err()
        );
        assert!(to_arg(&OptionSpec::new(["--x"]).kwarg("choices", "abc")).is_err());
    }

    fn claim_all(is_root: bool, specs: &[OptionSpec]) -> Result<(), String> {
        let mut used = UsedNames::for_command(is_root);
        for spec in specs {
            let (arg, binding) = to_arg(spec)?;
            used.claim(spec, &arg, &binding)?;
        }
        Ok(())
    }

    #[test]
    fn test_used_names_reject_collisions() {
        assert!(claim_all(false, &[OptionSpec::new(["--input"]), OptionSpec::new(["--output"])]).is_ok());
        assert!(claim_all(false, &[OptionSpec::new(["--input"]), OptionSpec::new(["--input"])]).is_err());
        assert!(
            claim_all(
                false,
                &[
                    OptionSpec::new(["--input"]),
                    OptionSpec::new(["--source"]).kwarg("dest", "input"),
                ]
            )
            .is_err()
        );
        assert!(claim_all(false, &[OptionSpec::new(["-i", "--in"]), OptionSpec::new(["-i", "--out"])]).is_err());
        assert!(claim_all(false, &[OptionSpec::new(["--in", "--alias"]), OptionSpec::new(["--alias"])]).is_err());
    }

    #[test]
    fn test_used_names_reserve_help_and_version() {
        assert!(claim_all(false, &[OptionSpec::new(["-h"])]).is_err());
        assert!(claim_all(false, &[OptionSpec::new(["--help"])]).is_err());
        assert!(claim_all(false, &[OptionSpec::new(["help"])]).is_err());
        assert!(claim_all(false, &[OptionSpec::new(["-V"])]).is_ok());
        assert!(claim_all(true, &[OptionSpec::new(["-V"])]).is_err());
        assert!(claim_all(true, &[OptionSpec::new(["--version"])]).is_err());
    }

    #[test]
    fn test_used_names_order_positionals() {
        assert!(claim_all(false, &[OptionSpec::new(["src"]), OptionSpec::new(["dst"]).nargs("?")]).is_ok());
        assert!(claim_all(false, &[OptionSpec::new(["src"]).nargs("?"), OptionSpec::new(["dst"])]).is_err());
        assert!(claim_all(false, &[OptionSpec::new(["files"]).nargs("*"), OptionSpec::new(["out"]).nargs("?")]).is_err());
    }

    #[test]
    fn test_error_names_the_keyword() {
        let err = to_arg(&OptionSpec::new(["--x"]).kwarg("nargz", "*")).unwrap_err();
        assert!(err.contains("nargz"));
    }
}
