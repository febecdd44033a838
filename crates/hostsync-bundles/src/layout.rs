//! Archive entry naming
//!
//! ```text
//! <target>/<group>/<setting>          setting content
//! <target>/<group>/<setting>.<key>    setting metadata
//! <target>.<key>                      target metadata
//! .<key>                              profile metadata
//! ```

/// Profile-level metadata key written when a bundle is finalized.
pub const FORMAT_VERSION_KEY: &str = "format-version";
pub const FORMAT_VERSION: &str = "1";

const SEPARATOR: char = '/';
const KEY_SEPARATOR: char = '.';

pub fn content_entry(target_id: &str, group: u32, setting_id: &str) -> String {
    format!("{target_id}{SEPARATOR}{group:03}{SEPARATOR}{setting_id}")
}

pub fn setting_metadata_entry(content_entry: &str, key: &str) -> String {
    format!("{content_entry}{KEY_SEPARATOR}{key}")
}

/// Target metadata entry, or profile metadata when `target_id` is empty.
pub fn metadata_entry(target_id: &str, key: &str) -> String {
    format!("{target_id}{KEY_SEPARATOR}{key}")
}

/// Reject ids that would make entry names ambiguous.
pub fn check_component(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    if value.contains(SEPARATOR) || value.contains('\\') || value.contains(KEY_SEPARATOR) {
        return Err("must not contain '/', '\\' or '.'".to_string());
    }
    Ok(())
}

/// One setting entry of a target, as found while reading.
#[derive(Debug, PartialEq, Eq)]
pub struct SettingEntry<'a> {
    /// `<group>/<setting>`, identifying the setting within its target.
    pub address: &'a str,
    pub setting_id: &'a str,
    /// Metadata key, `None` for the content entry.
    pub key: Option<&'a str>,
}

/// Parse `name` as a setting entry of `target_id`.
pub fn parse_setting_entry<'a>(name: &'a str, target_id: &str) -> Option<SettingEntry<'a>> {
    let rest = name
        .strip_prefix(target_id)?
        .strip_prefix(SEPARATOR)?;
    let (group, leaf) = rest.rsplit_once(SEPARATOR)?;
    if group.is_empty() || leaf.is_empty() {
        return None;
    }
    let (setting_id, key) = match leaf.split_once(KEY_SEPARATOR) {
        Some((id, key)) => (id, Some(key)),
        None => (leaf, None),
    };
    let address_len = group.len() + 1 + setting_id.len();
    Some(SettingEntry {
        address: &rest[..address_len],
        setting_id,
        key,
    })
}

/// Parse `name` as a metadata entry of `target_id` (profile level when empty),
/// returning the key.
pub fn parse_metadata_entry<'a>(name: &'a str, target_id: &str) -> Option<&'a str> {
    let key = name.strip_prefix(target_id)?.strip_prefix(KEY_SEPARATOR)?;
    if key.is_empty() || key.contains(SEPARATOR) {
        return None;
    }
    Some(key)
}
