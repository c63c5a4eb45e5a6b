//! Types about configuration.

#[cfg(feature = "config_serde")]
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "config_serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config_serde", serde(rename_all = "camelCase", default))]
/// Options that control how a template is parsed.
pub struct ParseOptions {
    /// Keep parsing after a malformed item.
    ///
    /// When disabled, the first error ends parsing:
    /// the rest of the input becomes a single `ERROR` node
    /// and exactly one error is reported.
    /// When enabled, each malformed item becomes an `ERROR` node
    /// that ends where the next `{{`, `{%`, `{#` or `<` begins.
    /// Malformed items inside an element body don't discard the element.
    pub error_recovery: bool,

    /// Maximum nesting of elements and expressions.
    pub max_depth: NonZeroUsize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            error_recovery: false,
            max_depth: NonZeroUsize::MIN.saturating_add(255),
        }
    }
}
