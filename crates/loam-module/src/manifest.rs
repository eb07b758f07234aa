//! Manifest header parsing.
//!
//! Module descriptors are declared as colon-delimited text headers
//! with semicolon-separated attribute clauses:
//!
//! ```text
//! Module-SymbolicName: org.loam.http
//! Module-Version: 1.4.0
//! Module-Activator: http-server
//! Export-Package: pkg.http;version:="1.4";uses:="pkg.io", pkg.http.auth;version:="1.0"
//! Import-Package: pkg.io;version:="[1.0,2.0)", pkg.metrics;resolution:="optional"
//! Provide-Capability: svc.codec;codec=json;version:="2.0"
//! Require-Capability: svc.codec;filter:="(codec=json)"
//! ```
//!
//! Grammar notes:
//!
//! - a header line is `Name: value`; lines starting with a space
//!   continue the previous header's value
//! - clauses are comma-separated at the top level; commas inside
//!   quoted strings do not split
//! - within a clause, `key:="value"` is a directive, `key=value` an
//!   attribute; the first bare token is the namespace
//! - attribute values parse as version / integer / boolean when they
//!   look like one, string otherwise; the `version` attribute is
//!   always version-typed
//! - `#` at line start is a comment

use crate::{
    Capability, Cardinality, Directives, ModuleError, Requirement, VERSION_ATTR,
};
use loam_types::{AttrValue, Filter, Version, VersionRange};
use std::collections::BTreeMap;

/// Header naming the module's symbolic name. Mandatory.
pub const HEADER_SYMBOLIC_NAME: &str = "Module-SymbolicName";
/// Header naming the module's version. Defaults to `0.0.0`.
pub const HEADER_VERSION: &str = "Module-Version";
/// Header naming the registered activator factory. Optional.
pub const HEADER_ACTIVATOR: &str = "Module-Activator";
/// Package-export sugar for `Provide-Capability`.
pub const HEADER_EXPORT_PACKAGE: &str = "Export-Package";
/// Package-import sugar for `Require-Capability`.
pub const HEADER_IMPORT_PACKAGE: &str = "Import-Package";
/// Generic capability declaration.
pub const HEADER_PROVIDE_CAPABILITY: &str = "Provide-Capability";
/// Generic requirement declaration.
pub const HEADER_REQUIRE_CAPABILITY: &str = "Require-Capability";

/// Raw parsed headers: name → value, logical lines joined.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    headers: BTreeMap<String, String>,
}

impl Manifest {
    /// Parses manifest text into logical headers.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidDescriptor`] on a line with no
    /// colon, a continuation with no preceding header, or a duplicate
    /// header name.
    pub fn parse(text: &str) -> Result<Self, ModuleError> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (line_no, raw) in text.lines().enumerate() {
            if raw.starts_with('#') {
                continue;
            }
            if raw.trim().is_empty() {
                current = None;
                continue;
            }

            if raw.starts_with(' ') || raw.starts_with('\t') {
                // Continuation of the previous header value.
                let Some(name) = &current else {
                    return Err(ModuleError::InvalidDescriptor(format!(
                        "line {}: continuation without a header",
                        line_no + 1
                    )));
                };
                let value = headers.get_mut(name).expect("current header exists");
                value.push_str(raw.trim());
                continue;
            }

            let Some((name, value)) = raw.split_once(':') else {
                return Err(ModuleError::InvalidDescriptor(format!(
                    "line {}: expected 'Name: value', got '{}'",
                    line_no + 1,
                    raw
                )));
            };
            let name = name.trim().to_string();
            if headers.contains_key(&name) {
                return Err(ModuleError::InvalidDescriptor(format!(
                    "duplicate header '{name}'"
                )));
            }
            headers.insert(name.clone(), value.trim().to_string());
            current = Some(name);
        }

        Ok(Self { headers })
    }

    /// Returns a header value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the mandatory symbolic name.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingHeader`] when absent or empty.
    pub fn symbolic_name(&self) -> Result<&str, ModuleError> {
        match self.get(HEADER_SYMBOLIC_NAME) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ModuleError::MissingHeader(HEADER_SYMBOLIC_NAME.to_string())),
        }
    }

    /// Returns the declared version, `0.0.0` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Version`] on an unparsable value.
    pub fn version(&self) -> Result<Version, ModuleError> {
        match self.get(HEADER_VERSION) {
            None => Ok(Version::ZERO),
            Some(text) => Ok(Version::parse(text)?),
        }
    }

    /// Parses the capability headers (`Export-Package` +
    /// `Provide-Capability`).
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] on malformed clauses.
    pub fn capabilities(&self) -> Result<Vec<Capability>, ModuleError> {
        let mut caps = Vec::new();
        for header in [HEADER_EXPORT_PACKAGE, HEADER_PROVIDE_CAPABILITY] {
            if let Some(value) = self.get(header) {
                for clause in split_clauses(value) {
                    caps.push(parse_capability(&clause)?);
                }
            }
        }
        Ok(caps)
    }

    /// Parses the requirement headers (`Import-Package` +
    /// `Require-Capability`).
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] on malformed clauses.
    pub fn requirements(&self) -> Result<Vec<Requirement>, ModuleError> {
        let mut reqs = Vec::new();
        for header in [HEADER_IMPORT_PACKAGE, HEADER_REQUIRE_CAPABILITY] {
            if let Some(value) = self.get(header) {
                for clause in split_clauses(value) {
                    reqs.push(parse_requirement(&clause)?);
                }
            }
        }
        Ok(reqs)
    }
}

/// Splits a header value into clauses on top-level commas, ignoring
/// commas inside double quotes.
fn split_clauses(value: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                buf.push(c);
            }
            ',' if !in_quotes => {
                if !buf.trim().is_empty() {
                    clauses.push(buf.trim().to_string());
                }
                buf.clear();
            }
            _ => buf.push(c),
        }
    }
    if !buf.trim().is_empty() {
        clauses.push(buf.trim().to_string());
    }
    clauses
}

/// Splits one clause into segments on top-level semicolons.
fn split_segments(clause: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    for c in clause.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                buf.push(c);
            }
            ';' if !in_quotes => {
                segments.push(buf.trim().to_string());
                buf.clear();
            }
            _ => buf.push(c),
        }
    }
    segments.push(buf.trim().to_string());
    segments.retain(|s| !s.is_empty());
    segments
}

/// One parsed clause: namespace + attributes + directives.
struct Clause {
    namespace: String,
    attrs: Vec<(String, String)>,
    directives: Directives,
}

fn parse_clause(clause: &str) -> Result<Clause, ModuleError> {
    let segments = split_segments(clause);
    let Some((namespace, rest)) = segments.split_first() else {
        return Err(ModuleError::InvalidClause(clause.to_string()));
    };
    if namespace.is_empty() || namespace.contains('=') {
        return Err(ModuleError::InvalidClause(clause.to_string()));
    }

    let mut attrs = Vec::new();
    let mut directives = Directives::new();
    for segment in rest {
        if let Some((key, value)) = segment.split_once(":=") {
            directives.insert(key.trim().to_string(), unquote(value));
        } else if let Some((key, value)) = segment.split_once('=') {
            attrs.push((key.trim().to_string(), unquote(value)));
        } else {
            return Err(ModuleError::InvalidClause(clause.to_string()));
        }
    }

    Ok(Clause {
        namespace: namespace.clone(),
        attrs,
        directives,
    })
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Types an attribute value: `version` is always a version; otherwise
/// try integer, boolean, version-shaped, then string.
fn type_attr(key: &str, value: &str) -> Result<AttrValue, ModuleError> {
    if key == VERSION_ATTR {
        return Ok(AttrValue::Version(Version::parse(value)?));
    }
    if let Ok(i) = value.parse::<i64>() {
        return Ok(AttrValue::Int(i));
    }
    match value {
        "true" => Ok(AttrValue::Bool(true)),
        "false" => Ok(AttrValue::Bool(false)),
        _ => Ok(AttrValue::Str(value.to_string())),
    }
}

fn parse_capability(clause: &str) -> Result<Capability, ModuleError> {
    let parsed = parse_clause(clause)?;
    let mut cap = Capability::new(parsed.namespace);
    for (key, value) in parsed.attrs {
        let typed = type_attr(&key, &value)?;
        cap.attrs.insert(key, typed);
    }
    // A version directive on an export is shorthand for the attribute.
    if let Some(version) = parsed.directives.get(VERSION_ATTR) {
        cap.attrs.insert(
            VERSION_ATTR.to_string(),
            AttrValue::Version(Version::parse(version)?),
        );
    }
    cap.directives = parsed
        .directives
        .into_iter()
        .filter(|(k, _)| k != VERSION_ATTR)
        .collect();
    Ok(cap)
}

fn parse_requirement(clause: &str) -> Result<Requirement, ModuleError> {
    let parsed = parse_clause(clause)?;
    let mut req = Requirement::new(parsed.namespace);

    for (key, value) in &parsed.directives {
        match key.as_str() {
            VERSION_ATTR => {
                req.version_range = Some(VersionRange::parse(value)?);
            }
            "filter" => {
                req.filter = Some(Filter::parse(value)?);
            }
            "resolution" => {
                req.cardinality = match value.as_str() {
                    "optional" => Cardinality::Optional,
                    "mandatory" => Cardinality::Mandatory,
                    other => {
                        return Err(ModuleError::InvalidClause(format!(
                            "unknown resolution '{other}' in '{clause}'"
                        )))
                    }
                };
            }
            _ => {
                req.directives.insert(key.clone(), value.clone());
            }
        }
    }

    // Attribute-form constraints become an implicit conjunction filter.
    for (key, value) in parsed.attrs {
        if key == VERSION_ATTR {
            req.version_range = Some(VersionRange::parse(&value)?);
        } else {
            let clause_filter = Filter::parse(&format!("({key}={value})"))?;
            req.filter = Some(match req.filter.take() {
                None => clause_filter,
                Some(existing) => Filter::And(vec![existing, clause_filter]),
            });
        }
    }

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Module-SymbolicName: org.loam.http
Module-Version: 1.4.0
Module-Activator: http-server
# exports
Export-Package: pkg.http;version:=\"1.4\";uses:=\"pkg.io\", pkg.http.auth;version:=\"1.0\"
Import-Package: pkg.io;version:=\"[1.0,2.0)\", pkg.metrics;resolution:=\"optional\"
";

    #[test]
    fn parse_headers() {
        let m = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(m.symbolic_name().unwrap(), "org.loam.http");
        assert_eq!(m.version().unwrap(), Version::new(1, 4, 0));
        assert_eq!(m.get(HEADER_ACTIVATOR), Some("http-server"));
    }

    #[test]
    fn parse_capabilities() {
        let m = Manifest::parse(SAMPLE).unwrap();
        let caps = m.capabilities().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].namespace, "pkg.http");
        assert_eq!(caps[0].version(), Version::new(1, 4, 0));
        assert_eq!(caps[0].uses(), vec!["pkg.io"]);
        assert_eq!(caps[1].namespace, "pkg.http.auth");
    }

    #[test]
    fn parse_requirements() {
        let m = Manifest::parse(SAMPLE).unwrap();
        let reqs = m.requirements().unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].namespace, "pkg.io");
        assert_eq!(
            reqs[0].version_range,
            Some(VersionRange::parse("[1.0,2.0)").unwrap())
        );
        assert!(reqs[0].is_mandatory());
        assert_eq!(reqs[1].namespace, "pkg.metrics");
        assert!(!reqs[1].is_mandatory());
    }

    #[test]
    fn missing_symbolic_name() {
        let m = Manifest::parse("Module-Version: 1.0\n").unwrap();
        assert!(matches!(
            m.symbolic_name(),
            Err(ModuleError::MissingHeader(_))
        ));
    }

    #[test]
    fn version_defaults_to_zero() {
        let m = Manifest::parse("Module-SymbolicName: a\n").unwrap();
        assert_eq!(m.version().unwrap(), Version::ZERO);
    }

    #[test]
    fn duplicate_header_rejected() {
        let text = "Module-Version: 1.0\nModule-Version: 2.0\n";
        assert!(matches!(
            Manifest::parse(text),
            Err(ModuleError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn line_without_colon_rejected() {
        assert!(matches!(
            Manifest::parse("not a header\n"),
            Err(ModuleError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn continuation_lines_join() {
        let text = "Module-SymbolicName: a\nExport-Package: pkg.a,\n pkg.b\n";
        let m = Manifest::parse(text).unwrap();
        let caps = m.capabilities().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[1].namespace, "pkg.b");
    }

    #[test]
    fn quoted_commas_do_not_split() {
        let text = "Module-SymbolicName: a\nRequire-Capability: svc;filter:=\"(&(a=1)(b=2))\"\n";
        let m = Manifest::parse(text).unwrap();
        let reqs = m.requirements().unwrap();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].filter.is_some());
    }

    #[test]
    fn generic_capability_attrs_typed() {
        let text = "Module-SymbolicName: a\nProvide-Capability: svc.codec;codec=json;level=3;fast=true\n";
        let m = Manifest::parse(text).unwrap();
        let caps = m.capabilities().unwrap();
        assert_eq!(caps[0].attrs.get("codec"), Some(&AttrValue::from("json")));
        assert_eq!(caps[0].attrs.get("level"), Some(&AttrValue::Int(3)));
        assert_eq!(caps[0].attrs.get("fast"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn requirement_attr_becomes_filter() {
        let text = "Module-SymbolicName: a\nRequire-Capability: svc.codec;codec=json\n";
        let m = Manifest::parse(text).unwrap();
        let reqs = m.requirements().unwrap();
        let cap = Capability::new("svc.codec").with_attr("codec", "json");
        assert!(reqs[0].matches(&cap));
        let other = Capability::new("svc.codec").with_attr("codec", "cbor");
        assert!(!reqs[0].matches(&other));
    }

    #[test]
    fn bad_resolution_rejected() {
        let text = "Module-SymbolicName: a\nImport-Package: pkg;resolution:=\"sometimes\"\n";
        let m = Manifest::parse(text).unwrap();
        assert!(m.requirements().is_err());
    }

    #[test]
    fn bad_range_surfaces_version_error() {
        let text = "Module-SymbolicName: a\nImport-Package: pkg;version:=\"[2.0,1.0)\"\n";
        let m = Manifest::parse(text).unwrap();
        assert!(matches!(m.requirements(), Err(ModuleError::Version(_))));
    }
}
