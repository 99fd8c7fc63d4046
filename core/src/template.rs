//! URL template expansion.
//!
//! The engine only needs a string-substitution service; `SimpleTemplate`
//! covers the `{name}` and `{+name}` forms used by generated clients. Callers
//! with richer template grammars plug in their own `UrlTemplate`.

use std::collections::BTreeMap;

use crate::error::CommandError;

/// Expands named placeholders in a URL template.
pub trait UrlTemplate: Send + Sync {
    fn expand(
        &self,
        template: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, CommandError>;
}

/// `{name}` inserts the percent-encoded value, `{+name}` inserts it verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTemplate;

impl UrlTemplate for SimpleTemplate {
    fn expand(
        &self,
        template: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, CommandError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                CommandError::Configuration(format!("unterminated placeholder in {template}"))
            })?;
            let (reserved, name) = match after[..end].strip_prefix('+') {
                Some(name) => (true, name),
                None => (false, &after[..end]),
            };
            let value = params.get(name).ok_or_else(|| {
                CommandError::Configuration(format!("missing template variable {name}"))
            })?;
            if reserved {
                out.push_str(value);
            } else {
                out.push_str(&urlencoding::encode(value));
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
