use std::collections::BTreeSet;

use crate::error::{NavError, Result};

use super::notation::{Notation, parse_notation};
use super::{SortBy, SortOrder, VisibilityRule};

/// Parsed `label${...}` node-name definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(super) struct NodeNameDef {
    pub(super) label: String,
    pub(super) visibility: VisibilityRule,
    pub(super) sort_by: Option<SortBy>,
    pub(super) sort_order: Option<SortOrder>,
    pub(super) limit: Option<usize>,
}

pub(super) fn parse_node_name(raw: &str) -> Result<NodeNameDef> {
    let (label, modifiers) = match raw.find("${") {
        Some(index) => (&raw[..index], Some(&raw[index + 1..])),
        None => (raw, None),
    };
    let label = label.trim();
    if label.is_empty() {
        return Err(NavError::InvalidConfig(format!(
            "facet node name is empty: `{raw}`"
        )));
    }
    if label.contains('/') || label.contains('[') {
        return Err(NavError::InvalidConfig(format!(
            "facet node name contains a reserved character: `{label}`"
        )));
    }

    let mut out = NodeNameDef {
        label: label.to_string(),
        ..NodeNameDef::default()
    };
    let Some(modifiers) = modifiers else {
        return Ok(out);
    };

    let Notation::Object(entries) = parse_notation(modifiers)? else {
        return Err(NavError::InvalidConfig(format!(
            "facet modifiers must be an object: `{raw}`"
        )));
    };
    for (key, value) in &entries {
        match key.to_ascii_lowercase().as_str() {
            "after" => out.visibility.after = name_set(value, key)?,
            "hide" => out.visibility.hide = name_set(value, key)?,
            "sortby" => out.sort_by = Some(scalar(value, key)?.parse()?),
            "sortorder" => out.sort_order = Some(scalar(value, key)?.parse()?),
            "limit" => out.limit = Some(limit(value)?),
            other => {
                return Err(NavError::InvalidConfig(format!(
                    "unknown facet modifier `{other}` in `{raw}`"
                )));
            }
        }
    }
    Ok(out)
}

fn scalar(value: &Notation, key: &str) -> Result<String> {
    value
        .as_text()
        .ok_or_else(|| NavError::InvalidConfig(format!("modifier `{key}` must be a scalar")))
}

fn name_set(value: &Notation, key: &str) -> Result<BTreeSet<String>> {
    let names = value.as_text_list().ok_or_else(|| {
        NavError::InvalidConfig(format!("modifier `{key}` must be a name or a list of names"))
    })?;
    let names = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>();
    if names.is_empty() {
        return Err(NavError::InvalidConfig(format!(
            "modifier `{key}` names no facet"
        )));
    }
    Ok(names)
}

fn limit(value: &Notation) -> Result<usize> {
    value
        .as_int()
        .and_then(|raw| usize::try_from(raw).ok())
        .ok_or_else(|| {
            NavError::InvalidConfig("modifier `limit` must be a non-negative integer".to_string())
        })
}
