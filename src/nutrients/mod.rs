// src/nutrients/mod.rs
//
// Nutrient name canonicalization. Labs print the same nutrient with method
// tags, underscores and the odd OCR mangle; everything downstream keys on the
// canonical form.

pub mod lamotte;

use crate::config::NameTables;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static METHOD_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Names kept verbatim, method suffix and all. The prefix must end at a
/// non-letter, so "Nitrate-Nitrogen" is not one of them.
const VERBATIM_PREFIXES: [&str; 2] = ["Nitrate-N", "Ammonium-N"];

#[derive(Debug, Clone)]
pub struct Canonicalizer {
    garbled: BTreeMap<String, String>,
}

impl Canonicalizer {
    pub fn new(tables: &NameTables) -> Self {
        Self {
            garbled: tables.garbled.clone(),
        }
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if let Some(prefix) = verbatim_prefix(trimmed) {
            return prefix.to_string();
        }

        let name = self.garbled.get(trimmed).map_or(trimmed, String::as_str);

        let mut name = name.to_string();
        loop {
            let stripped = METHOD_TAG.replace_all(&name, "").into_owned();
            if stripped == name {
                break;
            }
            name = stripped;
        }

        let name = name.replace('_', " ");
        let name = WHITESPACE.replace_all(name.trim(), " ").into_owned();

        // stripping can expose a prefix that was split by a tag
        if let Some(prefix) = verbatim_prefix(&name) {
            return prefix.to_string();
        }

        match name.to_lowercase().as_str() {
            "aluminum" | "aluminium" => "Aluminium".to_string(),
            _ => name,
        }
    }
}

fn verbatim_prefix(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    VERBATIM_PREFIXES
        .into_iter()
        .find(|p| {
            lower
                .strip_prefix(&p.to_lowercase())
                .is_some_and(|rest| !rest.starts_with(char::is_alphabetic))
        })
}
