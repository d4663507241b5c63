//! Unit naming at the wire boundary and unit file parsing.
//!
//! Inside admiral unit names are canonical: templates are `{id}@` and
//! instances `{id}@{instance}`. fleet always uses the full systemd name with
//! a `.service` suffix, which is added and removed here.

use crate::error::{FleetError, Result};
use crate::types::UnitOption;

/// Suffix fleet appends to every unit name.
pub const SERVICE_SUFFIX: &str = ".service";

/// Convert a canonical unit name to its fleet name.
#[must_use]
pub fn to_wire(name: &str) -> String {
    if name.ends_with(SERVICE_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{SERVICE_SUFFIX}")
    }
}

/// Convert a fleet unit name to its canonical name.
#[must_use]
pub fn from_wire(name: &str) -> String {
    name.strip_suffix(SERVICE_SUFFIX).unwrap_or(name).to_string()
}

/// Returns true if the canonical name is a template (`{id}@`).
#[must_use]
pub fn is_template(name: &str) -> bool {
    name.ends_with('@')
}

/// The template an instance was created from: `a@b` gives `a@`.
///
/// Returns `None` for templates and for names without an `@`.
#[must_use]
pub fn template_of(name: &str) -> Option<String> {
    let (prefix, instance) = name.split_once('@')?;
    if instance.is_empty() {
        None
    } else {
        Some(format!("{prefix}@"))
    }
}

/// Parse systemd unit file text into options.
///
/// Blank lines and `#`/`;` comments are skipped, and a trailing `\` joins a
/// line with the next one.
///
/// # Errors
///
/// Returns `FleetError::InvalidUnit` for an option outside any section or a
/// line that is neither a section header nor `Name=Value`.
pub fn parse_unit_file(content: &str) -> Result<Vec<UnitOption>> {
    let mut options = Vec::new();
    let mut section: Option<String> = None;
    let mut pending = String::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();

        if let Some(continued) = line.strip_suffix('\\') {
            pending.push_str(continued.trim_end());
            pending.push(' ');
            continue;
        }

        let line = if pending.is_empty() {
            line.to_string()
        } else {
            let mut joined = std::mem::take(&mut pending);
            joined.push_str(line);
            joined
        };

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = Some(header.trim().to_string());
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            return Err(FleetError::InvalidUnit(format!(
                "line {}: expected Name=Value",
                index + 1
            )));
        };
        let Some(section) = section.clone() else {
            return Err(FleetError::InvalidUnit(format!(
                "line {}: option outside of a section",
                index + 1
            )));
        };

        options.push(UnitOption {
            section,
            name: name.trim().to_string(),
            value: value.trim().to_string(),
        });
    }

    if !pending.is_empty() {
        return Err(FleetError::InvalidUnit(
            "unit file ends with a line continuation".to_string(),
        ));
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(to_wire("a@d-0"), "a@d-0.service");
        assert_eq!(to_wire("a@d-0.service"), "a@d-0.service");
        assert_eq!(from_wire("a@.service"), "a@");
        assert_eq!(from_wire("plain"), "plain");
    }

    #[test]
    fn template_names() {
        assert!(is_template("a@"));
        assert!(!is_template("a@d-0"));
        assert_eq!(template_of("a@d-0"), Some("a@".to_string()));
        assert_eq!(template_of("a@"), None);
        assert_eq!(template_of("plain"), None);
    }

    #[test]
    fn parses_sections_and_options() {
        let content = "\
# web server
[Unit]
Description=Web %i
After=docker.service

[Service]
ExecStart=/usr/bin/docker run \\
  --rm nginx
; trailing comment

[X-Fleet]
Conflicts=web@*.service
";
        let options = parse_unit_file(content).unwrap();
        assert_eq!(options.len(), 4);
        assert_eq!(options[0].section, "Unit");
        assert_eq!(options[0].name, "Description");
        assert_eq!(options[0].value, "Web %i");
        assert_eq!(options[2].section, "Service");
        assert_eq!(options[2].value, "/usr/bin/docker run --rm nginx");
        assert_eq!(options[3].section, "X-Fleet");
    }

    #[test]
    fn value_may_contain_equals() {
        let options = parse_unit_file("[Service]\nEnvironment=A=b").unwrap();
        assert_eq!(options[0].name, "Environment");
        assert_eq!(options[0].value, "A=b");
    }

    #[test]
    fn rejects_option_without_section() {
        let result = parse_unit_file("ExecStart=/bin/true");
        assert!(matches!(result, Err(FleetError::InvalidUnit(_))));
    }

    #[test]
    fn rejects_garbage_line() {
        let result = parse_unit_file("[Service]\nnot an option");
        assert!(matches!(result, Err(FleetError::InvalidUnit(_))));
    }
}
