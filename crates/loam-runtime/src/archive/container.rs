//! The module archive container.
//!
//! Installers hand the framework a single byte stream per module. The
//! container is deliberately simple (on-disk format compatibility is a
//! non-goal): the manifest text, then zero or more framed resources:
//!
//! ```text
//! Module-SymbolicName: org.loam.sample
//! Module-Version: 1.0.0
//!
//! >>> module.permissions 47
//! module "org.loam.*" "start,stop"
//! service "*" "get"
//! >>> assets/logo.txt 11
//! hello world
//! ```
//!
//! A `>>> <name> <length>` line introduces a resource of exactly
//! `length` bytes, followed by a newline. Everything before the first
//! marker is the manifest.

use crate::StoreError;

/// Marker introducing a framed resource.
const RESOURCE_MARKER: &[u8] = b">>> ";

/// Conventional resource carrying the module's default permission
/// grant text.
pub const PERMISSIONS_RESOURCE: &str = "module.permissions";

/// A parsed module archive: manifest text plus named resource blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArchive {
    /// Manifest header text.
    pub manifest: String,
    /// Named resource blobs in archive order.
    pub resources: Vec<(String, Vec<u8>)>,
}

impl ModuleArchive {
    /// Creates an archive holding only a manifest.
    #[must_use]
    pub fn from_manifest(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            resources: Vec::new(),
        }
    }

    /// Adds a resource (builder style).
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.push((name.into(), bytes.into()));
        self
    }

    /// Returns a resource's bytes by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&[u8]> {
        self.resources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Parses a content stream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BadArchive`] on malformed framing or a
    /// truncated resource.
    pub fn parse(bytes: &[u8]) -> Result<Self, StoreError> {
        let manifest_end = find_first_marker(bytes).unwrap_or(bytes.len());
        let manifest = std::str::from_utf8(&bytes[..manifest_end])
            .map_err(|_| StoreError::BadArchive("manifest is not UTF-8".into()))?
            .to_string();

        let mut resources = Vec::new();
        let mut cursor = manifest_end;
        while cursor < bytes.len() {
            let line_end = bytes[cursor..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|off| cursor + off)
                .ok_or_else(|| StoreError::BadArchive("unterminated resource header".into()))?;
            let header = std::str::from_utf8(&bytes[cursor..line_end])
                .map_err(|_| StoreError::BadArchive("resource header is not UTF-8".into()))?;

            let rest = header
                .strip_prefix(">>> ")
                .ok_or_else(|| StoreError::BadArchive(format!("expected '>>>' marker, got '{header}'")))?;
            let (name, length) = rest
                .rsplit_once(' ')
                .ok_or_else(|| StoreError::BadArchive(format!("bad resource header '{header}'")))?;
            let length: usize = length
                .parse()
                .map_err(|_| StoreError::BadArchive(format!("bad resource length in '{header}'")))?;

            let start = line_end + 1;
            let end = start + length;
            if end > bytes.len() {
                return Err(StoreError::BadArchive(format!(
                    "resource '{name}' truncated: wanted {length} bytes"
                )));
            }
            resources.push((name.to_string(), bytes[start..end].to_vec()));

            // Skip the trailing newline after the blob, if present.
            cursor = if bytes.get(end) == Some(&b'\n') { end + 1 } else { end };
        }

        Ok(Self {
            manifest,
            resources,
        })
    }

    /// Serializes back to the container format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.manifest.clone().into_bytes();
        for (name, bytes) in &self.resources {
            out.extend_from_slice(format!(">>> {} {}\n", name, bytes.len()).as_bytes());
            out.extend_from_slice(bytes);
            out.push(b'\n');
        }
        out
    }
}

/// Finds the offset of the first resource marker at a line start.
fn find_first_marker(bytes: &[u8]) -> Option<usize> {
    if bytes.starts_with(RESOURCE_MARKER) {
        return Some(0);
    }
    bytes
        .windows(RESOURCE_MARKER.len() + 1)
        .position(|w| w[0] == b'\n' && &w[1..] == RESOURCE_MARKER)
        .map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_only_roundtrip() {
        let archive = ModuleArchive::from_manifest("Module-SymbolicName: a\n");
        let back = ModuleArchive::parse(&archive.to_bytes()).unwrap();
        assert_eq!(back, archive);
    }

    #[test]
    fn resources_roundtrip() {
        let archive = ModuleArchive::from_manifest("Module-SymbolicName: a\n")
            .with_resource("data/blob.bin", vec![0u8, 1, 2, 255])
            .with_resource(PERMISSIONS_RESOURCE, b"module \"a\" \"start\"\n".to_vec());
        let back = ModuleArchive::parse(&archive.to_bytes()).unwrap();
        assert_eq!(back, archive);
        assert_eq!(back.resource("data/blob.bin"), Some(&[0u8, 1, 2, 255][..]));
    }

    #[test]
    fn resource_with_newlines_in_body() {
        let body = b"line one\nline two\n>>> not a marker inside\n";
        let archive =
            ModuleArchive::from_manifest("Module-SymbolicName: a\n").with_resource("notes", body.to_vec());
        let back = ModuleArchive::parse(&archive.to_bytes()).unwrap();
        assert_eq!(back.resource("notes"), Some(&body[..]));
    }

    #[test]
    fn truncated_resource_rejected() {
        let mut bytes = ModuleArchive::from_manifest("M: a\n")
            .with_resource("r", vec![1, 2, 3, 4])
            .to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            ModuleArchive::parse(&bytes),
            Err(StoreError::BadArchive(_))
        ));
    }

    #[test]
    fn garbage_header_rejected() {
        let bytes = b"M: a\n>>> missing-length\nxx";
        assert!(ModuleArchive::parse(bytes).is_err());
    }

    #[test]
    fn missing_resource_is_none() {
        let archive = ModuleArchive::from_manifest("M: a\n");
        assert!(archive.resource("nope").is_none());
    }
}
