//! Editable-element lookup in `uiautomator dump` output.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::device::{Bounds, EditableElement};

static NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<node\b([^>]*)>").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).unwrap());
static BOUNDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").unwrap());

/// Where the dump is written on the device.
pub const DUMP_PATH: &str = "/sdcard/autoglm_window_dump.xml";

/// All editable elements in document order.
///
/// A node counts as editable when its class is an `EditText` (or subclass
/// named like one) and it is enabled.
pub fn editable_elements(xml: &str) -> Vec<EditableElement> {
    NODE_RE
        .captures_iter(xml)
        .filter_map(|node| {
            let attrs: HashMap<&str, &str> = ATTR_RE
                .captures_iter(node.get(1)?.as_str())
                .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
                .collect();

            let class = attrs.get("class").copied().unwrap_or_default();
            if !class.contains("EditText") || attrs.get("enabled") == Some(&"false") {
                return None;
            }

            Some(EditableElement {
                resource_id: attrs
                    .get("resource-id")
                    .filter(|id| !id.is_empty())
                    .map(|id| id.to_string()),
                bounds: parse_bounds(attrs.get("bounds")?)?,
                focused: attrs.get("focused") == Some(&"true"),
            })
        })
        .collect()
}

/// Parse `[left,top][right,bottom]`.
pub fn parse_bounds(raw: &str) -> Option<Bounds> {
    let caps = BOUNDS_RE.captures(raw)?;
    let n = |i: usize| caps.get(i)?.as_str().parse::<i32>().ok();
    Some(Bounds {
        left: n(1)?,
        top: n(2)?,
        right: n(3)?,
        bottom: n(4)?,
    })
}
