//! Prompt templates, embedded at compile time.
use std::collections::BTreeMap;

pub const AUDIT_MD: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/audit.md"));
pub const FIX_MD: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/fix.md"));
pub const CONSISTENCY_MD: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/consistency.md"
));
pub const CHAT_MD: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/chat.md"));
pub const INGEST_MD: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/ingest.md"));

/// Substitute `{name}` tokens in a single pass.
///
/// Values are inserted verbatim and never rescanned, so author text that
/// happens to contain `{criteria}` stays as written. Unknown tokens are left
/// untouched.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let values: BTreeMap<&str, &str> = values.iter().copied().collect();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let token = after
            .find('}')
            .map(|close| &after[..close])
            .filter(|name| values.contains_key(name));
        match token {
            Some(name) => {
                out.push_str(values[name]);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
