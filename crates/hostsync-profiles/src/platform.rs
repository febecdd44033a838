//! Platform-qualified keys
//!
//! A mapping key written as `platform:name` applies only on matching hosts.
//! Platform tags name an OS (`win`, `linux`, `macos`), optionally followed
//! by an architecture (`x86`, `x64`, `arm32`, `arm64`):
//!
//! ```yaml
//! base-path: /opt/app
//! win:base-path: C:/App
//! winarm64:base-path: C:/AppArm
//! ```
//!
//! On a matching host the most specific key wins, whatever the order in the
//! document, and a platform key overrides the plain key. Keys for other
//! platforms are dropped.

use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    Linux,
    MacOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    X64,
    Arm32,
    Arm64,
}

/// The host a document is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Option<Arch>,
}

impl Platform {
    pub fn new(os: Os, arch: Option<Arch>) -> Self {
        Self { os, arch }
    }

    /// The platform this process runs on. Unknown systems resolve as Linux.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::MacOs,
            _ => Os::Linux,
        };
        let arch = match std::env::consts::ARCH {
            "x86" => Some(Arch::X86),
            "x86_64" => Some(Arch::X64),
            "arm" => Some(Arch::Arm32),
            "aarch64" => Some(Arch::Arm64),
            _ => None,
        };
        Self { os, arch }
    }

    /// How specifically `tag` describes this platform: `Some(1)` for an OS
    /// tag, `Some(2)` for an OS and architecture tag, `None` when the tag is
    /// for another platform.
    fn specificity(&self, tag: &PlatformTag) -> Option<u8> {
        if tag.os != self.os {
            return None;
        }
        match tag.arch {
            None => Some(1),
            Some(arch) if Some(arch) == self.arch => Some(2),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlatformTag {
    os: Os,
    arch: Option<Arch>,
}

impl PlatformTag {
    fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let (os, rest) = [("win", Os::Windows), ("linux", Os::Linux), ("macos", Os::MacOs)]
            .into_iter()
            .find_map(|(prefix, os)| tag.strip_prefix(prefix).map(|rest| (os, rest.to_string())))?;
        let arch = match rest.as_str() {
            "" => None,
            "x86" => Some(Arch::X86),
            "x64" => Some(Arch::X64),
            "arm32" => Some(Arch::Arm32),
            "arm64" => Some(Arch::Arm64),
            _ => return None,
        };
        Some(Self { os, arch })
    }
}

/// Split `key` into its platform tag and logical name, when it has one.
fn split_key(key: &str) -> Option<(PlatformTag, &str)> {
    let (tag, name) = key.split_once(':')?;
    let tag = PlatformTag::parse(tag)?;
    let name = name.trim();
    (!name.is_empty()).then_some((tag, name))
}

/// Resolve platform-qualified keys in every mapping below `value`.
pub fn resolve_platform_keys(value: &mut Value, platform: &Platform) {
    match value {
        Value::Mapping(mapping) => {
            let resolved = resolve_mapping(std::mem::take(mapping), platform);
            *mapping = resolved;
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_platform_keys(item, platform);
            }
        }
        Value::Tagged(tagged) => resolve_platform_keys(&mut tagged.value, platform),
        _ => {}
    }
}

fn resolve_mapping(mapping: Mapping, platform: &Platform) -> Mapping {
    // Entries in first-seen order with the specificity that produced them.
    let mut entries: Vec<(Value, Value, u8)> = Vec::with_capacity(mapping.len());
    for (key, mut value) in mapping {
        resolve_platform_keys(&mut value, platform);
        let (name, rank) = match key.as_str().and_then(split_key) {
            Some((tag, name)) => match platform.specificity(&tag) {
                Some(rank) => (Value::String(name.to_string()), rank),
                None => {
                    tracing::trace!(key = ?key, "Dropping key for another platform");
                    continue;
                }
            },
            None => (key, 0),
        };
        match entries.iter_mut().find(|(existing, _, _)| *existing == name) {
            Some(entry) if rank >= entry.2 => {
                entry.1 = value;
                entry.2 = rank;
            }
            Some(_) => {}
            None => entries.push((name, value, rank)),
        }
    }
    entries.into_iter().map(|(k, v, _)| (k, v)).collect()
}
