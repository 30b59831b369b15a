//! Source rewriting for layout 1 to layout 2 migration.
//!
//! Layout 1 libraries include their own headers as `libname/header.h`;
//! layout 2 keeps sources flat, so the prefix is dropped.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Source file extensions rewritten during migration
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "h"];

/// Rewrite `#include "<libname>/<rest>"` to `#include "<rest>"`.
///
/// Both quote styles and both separators (`/`, `\`) are recognised. Every
/// occurrence is rewritten; includes of other libraries are left alone.
pub fn migrate_source<'a>(source: &'a str, libname: &str) -> Cow<'a, str> {
    let pattern = include_pattern();
    let refers_to_library = pattern
        .captures_iter(source)
        .any(|caps| &caps["dir"] == libname);
    if !refers_to_library {
        return Cow::Borrowed(source);
    }

    pattern.replace_all(source, |caps: &Captures| {
        if &caps["dir"] == libname {
            caps["include"].to_string()
        } else {
            caps[0].to_string()
        }
    })
}

/// Whether a file extension marks a source file for migration
pub fn is_migratable_extension(extension: &str) -> bool {
    SOURCE_EXTENSIONS.contains(&extension)
}

/// `#include "dir/` with either quote and either separator
fn include_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?P<include>#include\s+['"])(?P<dir>[^/\\'"\r\n]+)[/\\]"#).unwrap()
    })
}
