//! Accessibility snapshot.
//!
//! Converts the flat `Accessibility.getFullAXTree` node list into a tree that
//! only keeps the nodes a user could perceive or operate ("interesting"
//! nodes): focusable elements, controls and named leaves.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A node of the filtered accessibility tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxNode {
    pub role: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Raw `aria-keyshortcuts`. Carries the injected element id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyshortcuts: Option<String>,
    #[serde(flatten)]
    pub states: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AxNode>,
}

impl AxNode {
    pub fn is_modal(&self) -> bool {
        self.states.get("modal") == Some(&Value::Bool(true))
    }
}

/// Roles that are always reported, even without a name.
const CONTROL_ROLES: &[&str] = &[
    "button", "checkbox", "ColorWell", "combobox", "DisclosureTriangle", "listbox", "menu",
    "menubar", "menuitem", "menuitemcheckbox", "menuitemradio", "radio", "scrollbar",
    "searchbox", "slider", "spinbutton", "switch", "tab", "textbox", "tree", "treeitem",
];

/// Roles whose descendants are presentational.
const LEAF_ROLES: &[&str] = &[
    "button", "checkbox", "img", "image", "meter", "progressbar", "scrollbar", "slider",
    "separator", "switch",
];

/// Properties copied onto the node.
const STATE_PROPERTIES: &[&str] = &[
    "checked", "disabled", "expanded", "focused", "invalid", "modal", "multiselectable",
    "pressed", "readonly", "required", "selected", "valuemin", "valuemax", "autocomplete",
    "orientation",
];

/// Boolean states that stay in the output when false.
const KEEP_WHEN_FALSE: &[&str] = &["checked", "pressed", "expanded", "selected"];

#[derive(Debug)]
struct RawNode {
    role: String,
    name: String,
    keyshortcuts: Option<String>,
    focusable: bool,
    states: BTreeMap<String, Value>,
    children: Vec<RawNode>,
}

impl RawNode {
    fn is_control(&self) -> bool {
        CONTROL_ROLES.contains(&self.role.as_str())
    }

    fn has_focusable_descendant(&self) -> bool {
        self.children
            .iter()
            .any(|c| c.focusable || c.has_focusable_descendant())
    }

    fn is_leaf(&self) -> bool {
        if self.children.is_empty()
            || matches!(self.role.as_str(), "text" | "LineBreak")
            || LEAF_ROLES.contains(&self.role.as_str())
        {
            return true;
        }
        if self.has_focusable_descendant() {
            return false;
        }
        !self.name.is_empty() && (self.focusable || self.role == "heading")
    }

    fn is_interesting(&self, inside_control: bool) -> bool {
        if self.focusable || self.is_control() {
            return true;
        }
        if inside_control {
            return false;
        }
        self.is_leaf() && !self.name.is_empty()
    }
}

/// Parse the CDP response into the interesting-only tree. `None` when the
/// response carries no nodes.
pub fn parse_ax_tree(cdp_response: &Value) -> Option<AxNode> {
    let nodes = cdp_response.get("nodes").and_then(|v| v.as_array())?;
    let root = nodes.first()?;

    let mut node_map: HashMap<String, &Value> = HashMap::new();
    for node in nodes {
        if let Some(id) = node_id(node) {
            node_map.insert(id, node);
        }
    }

    // The root anchors the tree even when it is ignored.
    let mut root_raw = parse_node(root, get_ax_value(root, "role"));
    if root_raw.role.is_empty() {
        root_raw.role = "WebArea".to_string();
    }
    root_raw.children = build_children(root, &node_map);
    collect_interesting(root_raw, false, true).pop()
}

fn node_id(node: &Value) -> Option<String> {
    match node.get("nodeId")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build one node; ignored nodes are replaced by their children and inline
/// text boxes disappear.
fn build_raw(node: &Value, node_map: &HashMap<String, &Value>) -> Vec<RawNode> {
    let role = get_ax_value(node, "role");
    if role == "InlineTextBox" {
        return Vec::new();
    }
    let children = build_children(node, node_map);
    let ignored = node.get("ignored").and_then(|v| v.as_bool()).unwrap_or(false);
    if ignored || role == "none" || role == "Ignored" {
        return children;
    }
    let mut raw = parse_node(node, role);
    raw.children = children;
    vec![raw]
}

fn build_children(node: &Value, node_map: &HashMap<String, &Value>) -> Vec<RawNode> {
    let Some(child_ids) = node.get("childIds").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    child_ids
        .iter()
        .filter_map(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter_map(|id| node_map.get(&id).copied())
        .flat_map(|child| build_raw(child, node_map))
        .collect()
}

fn parse_node(node: &Value, role: String) -> RawNode {
    let role = match role.as_str() {
        "RootWebArea" => "WebArea".to_string(),
        "StaticText" => "text".to_string(),
        _ => role,
    };

    let mut keyshortcuts = None;
    let mut focusable = false;
    let mut states = BTreeMap::new();

    if let Some(props) = node.get("properties").and_then(|v| v.as_array()) {
        for prop in props {
            let prop_name = prop.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let prop_value = prop
                .get("value")
                .and_then(|v| v.get("value"))
                .cloned()
                .unwrap_or(Value::Null);
            match prop_name {
                "keyshortcuts" => keyshortcuts = prop_value.as_str().map(str::to_string),
                "focusable" => focusable = prop_value.as_bool().unwrap_or(false),
                name if STATE_PROPERTIES.contains(&name) => {
                    if let Some(value) = normalize_state(name, prop_value) {
                        states.insert(name.to_string(), value);
                    }
                }
                _ => {}
            }
        }
    }

    let value = get_ax_value(node, "value");
    if !value.is_empty() {
        states.insert("value".to_string(), Value::String(value));
    }

    RawNode {
        role,
        name: get_ax_value(node, "name"),
        keyshortcuts,
        focusable,
        states,
        children: Vec::new(),
    }
}

/// Tristate strings become booleans and false booleans are dropped, except
/// for states where "false" is itself informative.
fn normalize_state(name: &str, value: Value) -> Option<Value> {
    let value = match value {
        Value::String(s) if s == "true" => Value::Bool(true),
        Value::String(s) if s == "false" => Value::Bool(false),
        Value::Null => return None,
        other => other,
    };
    if value == Value::Bool(false) && !KEEP_WHEN_FALSE.contains(&name) {
        return None;
    }
    Some(value)
}

fn collect_interesting(node: RawNode, inside_control: bool, is_root: bool) -> Vec<AxNode> {
    let interesting = node.is_interesting(inside_control);
    let leaf = node.is_leaf();
    let inside_control = inside_control || node.is_control();

    let children = if leaf {
        Vec::new()
    } else {
        node.children
            .into_iter()
            .flat_map(|child| collect_interesting(child, inside_control, false))
            .collect()
    };

    if !interesting && !is_root {
        return children;
    }

    vec![AxNode {
        role: node.role,
        name: node.name,
        keyshortcuts: node.keyshortcuts,
        states: node.states,
        children,
    }]
}

fn get_ax_value(node: &Value, field: &str) -> String {
    node.get(field)
        .and_then(|v| {
            // CDP returns {type: "...", value: "..."} for role/name/value
            v.get("value")
                .and_then(|val| val.as_str())
                .or_else(|| v.as_str())
        })
        .unwrap_or("")
        .to_string()
}
