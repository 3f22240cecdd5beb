//! Accessibility tree reconciliation.
//!
//! The accessibility snapshot knows what a user can perceive; the DOM knows
//! the attributes needed to act on it. Identifiers injected before the
//! snapshot tie the two together: every snapshot node that carries one is
//! enriched from its DOM element, normalized to drop duplicated information,
//! then pruned into the compact tree handed to the caller.

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};
use webnav_core::Result;

use crate::identifiers::{cleanup, identifier_from_keyshortcuts, inject_identifiers};
use crate::mutation::OVERLAY_ELEMENT_ID;
use crate::page::PageHandle;
use crate::snapshot::{parse_ax_tree, AxNode};

/// Attributes read from every matched element.
const ELEMENT_ATTRIBUTES: &[&str] = &[
    "name", "aria-label", "placeholder", "id", "for", "href", "type", "title", "data-testid",
];

/// Elements that never carry information worth reporting.
const TAGS_TO_IGNORE: &[&str] = &[
    "head", "style", "script", "link", "meta", "noscript", "template", "iframe", "g", "main",
    "c-wiz", "svg", "path",
];

/// Attributes used during normalization but not reported.
const HIDDEN_ATTRIBUTES: &[&str] = &["id", "for", "name"];

const INPUT_TAGS: &[&str] = &["input", "textarea", "button", "select"];
const INPUT_ROLES: &[&str] = &["button", "option", "link", "combobox"];

const MODAL_HINT: &str = "This is a modal dialog. Please interact with this dialog and close it to be able to interact with the full page (e.g. by pressing the close button or selecting an option).";

pub(crate) const ELEMENT_LOOKUP_SCRIPT: &str = r#"(params) => {
    const element = document.querySelector(`[mmid="${params.mmid}"]`);
    if (!element) {
        return null;
    }
    if (params.ids_to_ignore.some(id => element.id === id || element.closest('#' + id))) {
        return {removed: true};
    }
    const tag = element.tagName.toLowerCase();
    if (params.tags_to_ignore.includes(tag) || tag === 'option') {
        return null;
    }
    const info = {tag: tag, attributes: {}};
    if (tag === 'input') {
        info.tag_type = element.type;
    }
    for (const name of params.attributes) {
        const value = element.getAttribute(name);
        if (value) {
            info.attributes[name] = value;
        }
    }
    if (tag === 'select') {
        info.options = Array.from(element.options).map(option => ({
            mmid: option.getAttribute('mmid'),
            text: option.text,
            value: option.value,
            selected: option.selected,
        }));
        return info;
    }
    if (params.fetch_inner_text && element.innerText) {
        info.description = element.innerText;
    }
    const pick = (child, keep) => {
        const picked = {};
        for (const attr of child.attributes) {
            if (keep(attr.name)) {
                picked[attr.name] = attr.value;
            }
        }
        return picked;
    };
    if (element.getAttribute('role') === 'listbox' || tag === 'ul') {
        const keep = ['mmid', 'role', 'aria-label', 'value'];
        info.additional_info = Array.from(element.children).map(child => pick(child, name => keep.includes(name)));
    }
    if (tag === 'label') {
        info.wraps_input = !!element.querySelector('input, select, textarea');
    }
    const detailed = info.tag_type || info.description || info.additional_info || info.wraps_input
        || Object.keys(info.attributes).length > 0;
    if (detailed) {
        return info;
    }
    if (tag === 'button' && element.innerText.trim() === '') {
        const skip = ['width', 'height', 'path', 'class', 'viewBox', 'mmid'];
        info.role = 'button';
        info.additional_info = Array.from(element.children).map(child => pick(child, name => !skip.includes(name)));
        return info;
    }
    return null;
}"#;

/// What the lookup script reports about one element.
#[derive(Debug, Default, Deserialize)]
struct ElementInfo {
    #[serde(default)]
    removed: bool,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    tag_type: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    options: Option<Vec<RawOption>>,
    #[serde(default)]
    additional_info: Option<Vec<Value>>,
    #[serde(default)]
    wraps_input: bool,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    mmid: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub id: Option<u64>,
    pub text: String,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementNode {
    pub id: u64,
    pub tag: Option<String>,
    pub tag_type: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub states: BTreeMap<String, Value>,
    pub hint: Option<String>,
    pub additional_info: Option<Vec<Value>>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectNode {
    pub id: u64,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub options: Vec<SelectOption>,
}

/// A node of the reconciled tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A snapshot node without a DOM counterpart, reported as-is.
    Text {
        role: String,
        name: String,
        states: BTreeMap<String, Value>,
        children: Vec<Node>,
    },
    Element(ElementNode),
    Select(SelectNode),
    /// Replaced by its children.
    Unravel(Vec<Node>),
    Removed,
}

impl Node {
    fn role(&self) -> Option<&str> {
        match self {
            Node::Text { role, .. } => Some(role.as_str()),
            Node::Element(e) => e.role.as_deref(),
            _ => None,
        }
    }

    fn is_input_like(&self) -> bool {
        match self {
            Node::Select(_) => true,
            Node::Element(e) if e.tag.as_deref().is_some_and(|t| INPUT_TAGS.contains(&t)) => true,
            other => other.role().is_some_and(|r| INPUT_ROLES.contains(&r)),
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Text { children, .. } => Some(children),
            Node::Element(e) => Some(&mut e.children),
            Node::Unravel(children) => Some(children),
            _ => None,
        }
    }

    /// JSON shape handed to the caller. Keys are sorted.
    pub fn render(&self) -> Value {
        let mut map = Map::new();
        match self {
            Node::Text { role, name, states, children } => {
                map.insert("role".into(), json!(role));
                if !name.is_empty() {
                    map.insert("name".into(), json!(name));
                }
                extend_states(&mut map, states);
                insert_children(&mut map, children);
            }
            Node::Element(e) => {
                map.insert("mmid".into(), json!(e.id));
                let optional = [
                    ("tag", &e.tag),
                    ("tag_type", &e.tag_type),
                    ("role", &e.role),
                    ("name", &e.name),
                    ("description", &e.description),
                    ("text", &e.text),
                    ("important information", &e.hint),
                ];
                for (key, value) in optional {
                    if let Some(value) = value {
                        map.insert(key.into(), json!(value));
                    }
                }
                for (key, value) in &e.attributes {
                    map.insert(key.clone(), json!(value));
                }
                extend_states(&mut map, &e.states);
                if let Some(info) = &e.additional_info {
                    map.insert("additional_info".into(), json!(info));
                }
                insert_children(&mut map, &e.children);
            }
            Node::Select(s) => {
                map.insert("mmid".into(), json!(s.id));
                map.insert("tag".into(), json!("select"));
                if let Some(name) = &s.name {
                    map.insert("name".into(), json!(name));
                }
                for (key, value) in &s.attributes {
                    map.insert(key.clone(), json!(value));
                }
                let options: Vec<Value> = s
                    .options
                    .iter()
                    .map(|o| {
                        json!({
                            "mmid": o.id,
                            "text": o.text,
                            "value": o.value,
                            "selected": o.selected,
                        })
                    })
                    .collect();
                map.insert("options".into(), Value::Array(options));
            }
            Node::Unravel(children) => {
                return Value::Array(children.iter().map(Node::render).collect());
            }
            Node::Removed => return Value::Null,
        }
        Value::Object(map)
    }
}

fn extend_states(map: &mut Map<String, Value>, states: &BTreeMap<String, Value>) {
    for (key, value) in states {
        map.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

fn insert_children(map: &mut Map<String, Value>, children: &[Node]) {
    if !children.is_empty() {
        map.insert(
            "children".into(),
            Value::Array(children.iter().map(Node::render).collect()),
        );
    }
}

/// Builds the reconciled tree of the current page.
#[derive(Debug, Clone, Default)]
pub struct TreeReconciler {
    dump_dir: Option<PathBuf>,
}

impl TreeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the raw and reconciled trees to `dir` on every fetch.
    pub fn with_dump_dir(dir: PathBuf) -> Self {
        Self { dump_dir: Some(dir) }
    }

    /// Fetch, reconcile and prune the tree. `Ok(None)` when the page has no
    /// accessibility snapshot. Injected attributes are cleaned up on every path.
    pub async fn get_tree(&self, page: &dyn PageHandle, only_input_fields: bool) -> Result<Option<Value>> {
        inject_identifiers(page).await;
        let snapshot = page.accessibility_tree().await;
        cleanup(page).await;

        let Some(ax_root) = parse_ax_tree(&snapshot?) else {
            debug!("Accessibility snapshot is empty");
            return Ok(None);
        };
        self.dump("json_accessibility_dom.json", &serde_json::to_value(&ax_root)?);

        debug!(only_input_fields, "Reconciling accessibility tree with the DOM");
        let node = reconcile(page, ax_root, only_input_fields).await?;
        let mut pruned = prune(node, only_input_fields);
        let tree = match pruned.len() {
            0 => None,
            1 => pruned.pop().map(|n| n.render()),
            _ => Some(Value::Array(pruned.iter().map(Node::render).collect())),
        };

        if let Some(tree) = &tree {
            self.dump("json_accessibility_dom_enriched.json", tree);
        }
        debug!("Reconciliation complete");
        Ok(tree)
    }

    fn dump(&self, file_name: &str, tree: &Value) {
        if self.dump_dir.is_none() {
            return;
        }
        match serde_json::to_string_pretty(tree) {
            Ok(content) => self.dump_text(file_name, &content),
            Err(e) => warn!(file_name, error = %e, "Failed to serialize tree dump"),
        }
    }

    pub(crate) fn dump_text(&self, file_name: &str, content: &str) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let path = dir.join(file_name);
        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, content));
        match written {
            Ok(()) => debug!(path = %path.display(), "Tree dump written"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write tree dump"),
        }
    }
}

/// Post-order: children first, then one DOM lookup for the node itself.
fn reconcile(page: &dyn PageHandle, ax: AxNode, only_input_fields: bool) -> BoxFuture<'_, Result<Node>> {
    async move {
        let AxNode { role, name, keyshortcuts, states, children } = ax;

        let mut reconciled = Vec::with_capacity(children.len());
        let fetch_inner_text = children.is_empty();
        for child in children {
            reconciled.push(reconcile(page, child, only_input_fields).await?);
        }

        let id = keyshortcuts.as_deref().and_then(identifier_from_keyshortcuts);
        let id = match id {
            Some(id) if role != "menuitem" => id,
            _ => {
                return Ok(Node::Text {
                    role,
                    name,
                    states,
                    children: reconciled,
                })
            }
        };
        if id == 0 {
            return Ok(Node::Removed);
        }

        let hint = (role == "dialog" && states.get("modal") == Some(&Value::Bool(true)))
            .then(|| MODAL_HINT.to_string());

        let params = json!({
            "mmid": id,
            "fetch_inner_text": fetch_inner_text,
            "attributes": ELEMENT_ATTRIBUTES,
            "tags_to_ignore": TAGS_TO_IGNORE,
            "ids_to_ignore": [OVERLAY_ELEMENT_ID],
        });
        let found = page.call_function(ELEMENT_LOOKUP_SCRIPT, &[params]).await?;
        if found.is_null() {
            return Ok(Node::Element(ElementNode {
                id,
                role: Some(role),
                name: Some(name).filter(|n| !n.is_empty()),
                states,
                hint,
                children: reconciled,
                ..Default::default()
            }));
        }
        let info: ElementInfo = serde_json::from_value(found)?;
        if info.removed {
            return Ok(Node::Removed);
        }

        let node = if let Some(options) = info.options {
            select_node(id, name, info.attributes, options)
        } else {
            element_node(id, role, name, states, hint, info, reconciled, only_input_fields)
        };
        Ok(node)
    }
    .boxed()
}

fn select_node(id: u64, name: String, mut attributes: BTreeMap<String, String>, options: Vec<RawOption>) -> Node {
    let dom_name = attributes.remove("name");
    attributes.retain(|k, _| !HIDDEN_ATTRIBUTES.contains(&k.as_str()));
    let name = Some(name).filter(|n| !n.is_empty()).or(dom_name);
    Node::Select(SelectNode {
        id,
        name,
        attributes,
        options: options
            .into_iter()
            .map(|o| SelectOption {
                id: o.mmid.and_then(|m| m.parse().ok()),
                text: o.text,
                value: o.value,
                selected: o.selected,
            })
            .collect(),
    })
}

#[allow(clippy::too_many_arguments)]
fn element_node(
    id: u64,
    ax_role: String,
    ax_name: String,
    states: BTreeMap<String, Value>,
    hint: Option<String>,
    info: ElementInfo,
    children: Vec<Node>,
    only_input_fields: bool,
) -> Node {
    let ElementInfo {
        tag,
        tag_type,
        role: dom_role,
        mut attributes,
        description,
        additional_info,
        wraps_input,
        ..
    } = info;

    let mut name = Some(ax_name).filter(|n| !n.is_empty());
    if name.is_none() {
        name = attributes.get("name").cloned();
    }
    let mut role = dom_role.or(Some(ax_role)).filter(|r| !r.is_empty());
    let mut description = description;
    let mut text = None;

    if name.as_deref() == Some(id.to_string().as_str()) && role.as_deref() != Some("textbox") {
        name = None;
    }

    let duplicate_description = match (&name, &description) {
        (Some(n), Some(d)) => n == d || *n == d.replace('\n', " ") || n.contains(&d.replace('\n', "")),
        _ => false,
    };
    if duplicate_description {
        description = None;
    }

    let label_in_name = match (&name, attributes.get("aria-label")) {
        (Some(n), Some(label)) => n.contains(label.as_str()),
        _ => false,
    };
    if label_in_name {
        attributes.remove("aria-label");
    }

    if role.as_deref() == Some(tag.as_str()) {
        role = None;
    }

    if attributes.get("aria-label").is_some() && attributes.get("aria-label") == attributes.get("placeholder") {
        attributes.remove("aria-label");
    }

    if role.as_deref() == Some("link") {
        // Input-only trees keep the role so links survive pruning.
        if !only_input_fields {
            role = None;
        }
        text = description.take();
    }

    if text.is_some() && text == name {
        text = None;
    }

    if tag == "label" && (attributes.contains_key("for") || wraps_input) {
        return Node::Unravel(children);
    }

    attributes.retain(|k, _| !HIDDEN_ATTRIBUTES.contains(&k.as_str()));

    Node::Element(ElementNode {
        id,
        tag: Some(tag).filter(|t| !t.is_empty()),
        tag_type,
        role,
        name,
        description,
        text,
        attributes,
        states,
        hint,
        additional_info,
        children,
    })
}

/// Drop, splice and filter nodes. Returns what takes the node's place in its
/// parent: nothing, the node itself, or its hoisted children.
pub fn prune(node: Node, only_input_fields: bool) -> Vec<Node> {
    let mut node = match node {
        Node::Removed => return Vec::new(),
        Node::Unravel(children) => {
            return children
                .into_iter()
                .flat_map(|child| prune(child, only_input_fields))
                .collect();
        }
        other => other,
    };

    if let Some(children) = node.children_mut() {
        let taken = std::mem::take(children);
        *children = taken
            .into_iter()
            .flat_map(|child| prune(child, only_input_fields))
            .collect();
    }

    let role = node.role().unwrap_or_default().to_string();
    if role == "WebArea" {
        return vec![node];
    }

    if only_input_fields && !node.is_input_like() {
        return node.children_mut().map(std::mem::take).unwrap_or_default();
    }

    if matches!(role.as_str(), "separator" | "LineBreak") {
        return Vec::new();
    }

    if let Node::Text { role, name, states, children } = &node {
        if role == "generic" && children.is_empty() && name.is_empty() {
            return Vec::new();
        }
        if children.is_empty() && states.is_empty() && !(role == "text" && has_residual_text(name)) {
            return Vec::new();
        }
    }

    if let Node::Element(e) = &node {
        if role == "generic" && e.children.is_empty() && e.name.is_none() && e.tag.is_none() {
            return Vec::new();
        }
    }

    vec![node]
}

/// At least three characters left once separators are removed.
fn has_residual_text(name: &str) -> bool {
    let processed: String = name.chars().filter(|c| !matches!(c, ',' | ':' | '\n')).collect();
    processed.trim().chars().count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{CLEANUP_SCRIPT, INJECT_SCRIPT};
    use crate::testing::FakePage;
    use std::collections::HashMap;

    fn ax(id: &str, role: &str, name: &str, children: &[&str], props: Value) -> Value {
        json!({
            "nodeId": id,
            "ignored": false,
            "role": {"type": "role", "value": role},
            "name": {"type": "computedString", "value": name},
            "properties": props,
            "childIds": children,
        })
    }

    fn tagged(mmid: u64) -> Value {
        json!([
            {"name": "focusable", "value": {"type": "booleanOrUndefined", "value": true}},
            {"name": "keyshortcuts", "value": {"type": "string", "value": mmid.to_string()}}
        ])
    }

    /// A fake page answering element lookups from `elements`, keyed by mmid.
    fn page_with(tree: Vec<Value>, elements: Vec<(u64, Value)>) -> FakePage {
        let page = FakePage::new();
        page.set_ax_tree(json!({ "nodes": tree }));
        page.on(INJECT_SCRIPT, json!(elements.len()));
        let elements: HashMap<u64, Value> = elements.into_iter().collect();
        page.on_fn(ELEMENT_LOOKUP_SCRIPT, move |args| {
            let mmid = args[0]["mmid"].as_u64().unwrap_or(0);
            Ok(elements.get(&mmid).cloned().unwrap_or(Value::Null))
        });
        page
    }

    fn text(role: &str, name: &str) -> Node {
        Node::Text {
            role: role.into(),
            name: name.into(),
            states: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    fn search_form_page() -> FakePage {
        page_with(
            vec![
                ax("1", "RootWebArea", "Shop", &["2", "3", "4", "5"], json!([])),
                ax("2", "textbox", "", &[], tagged(7)),
                ax("3", "button", "Search", &[], tagged(8)),
                ax("4", "StaticText", "Welcome to the shop", &[], json!([])),
                ax("5", "StaticText", "OK", &[], json!([])),
            ],
            vec![
                (7, json!({"tag": "input", "tag_type": "text", "attributes": {
                    "placeholder": "Search products", "name": "q", "id": "q"}})),
                (8, json!({"tag": "button", "attributes": {"type": "submit"}, "description": "Search"})),
            ],
        )
    }

    #[tokio::test]
    async fn test_search_form_tree() {
        let page = search_form_page();

        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        assert_eq!(
            tree,
            json!({
                "role": "WebArea",
                "name": "Shop",
                "children": [
                    {"mmid": 7, "tag": "input", "tag_type": "text", "role": "textbox",
                     "name": "q", "placeholder": "Search products"},
                    {"mmid": 8, "tag": "button", "name": "Search", "type": "submit"},
                    {"role": "text", "name": "Welcome to the shop"}
                ]
            })
        );
        assert_eq!(page.script_calls(CLEANUP_SCRIPT), 1);
    }

    #[tokio::test]
    async fn test_repeated_reconciliation_is_stable() {
        let page = search_form_page();
        let reconciler = TreeReconciler::new();

        let first = reconciler.get_tree(&page, false).await.unwrap();
        let second = reconciler.get_tree(&page, false).await.unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(page.script_calls(INJECT_SCRIPT), 2);
        assert_eq!(page.script_calls(CLEANUP_SCRIPT), 2);
        let inputs_only = reconciler.get_tree(&page, true).await.unwrap();
        assert_eq!(inputs_only, reconciler.get_tree(&page, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_select_options() {
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "combobox", "Size", &[], tagged(3)),
            ],
            vec![(3, json!({
                "tag": "select",
                "attributes": {"id": "size"},
                "options": [
                    {"mmid": "4", "text": "Small", "value": "s", "selected": true},
                    {"mmid": "5", "text": "Large", "value": "l", "selected": false}
                ]
            }))],
        );

        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        let select = &tree["children"][0];
        assert_eq!(select["tag"], "select");
        assert_eq!(select["name"], "Size");
        assert!(select.get("role").is_none());
        assert!(select.get("id").is_none());
        assert_eq!(select["options"][1], json!({"mmid": 5, "text": "Large", "value": "l", "selected": false}));
    }

    #[tokio::test]
    async fn test_link_description_becomes_text() {
        let tree = vec![
            ax("1", "RootWebArea", "", &["2"], json!([])),
            ax("2", "link", "Docs", &[], tagged(9)),
        ];
        let elements = vec![(9, json!({
            "tag": "a",
            "attributes": {"href": "/docs"},
            "description": "Read the documentation"
        }))];

        let page = page_with(tree.clone(), elements.clone());
        let full = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        assert_eq!(
            full["children"][0],
            json!({"mmid": 9, "tag": "a", "name": "Docs", "href": "/docs", "text": "Read the documentation"})
        );

        let page = page_with(tree, elements);
        let inputs = TreeReconciler::new().get_tree(&page, true).await.unwrap().unwrap();
        assert_eq!(inputs["children"][0]["role"], "link");
    }

    #[tokio::test]
    async fn test_modal_dialog_hint() {
        let mut props = tagged(2).as_array().unwrap().clone();
        props.push(json!({"name": "modal", "value": {"type": "boolean", "value": true}}));
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "dialog", "Cookies", &["3"], Value::Array(props)),
                ax("3", "button", "Accept", &[], tagged(3)),
            ],
            vec![
                (2, json!({"tag": "div", "attributes": {"id": "consent"}})),
                (3, json!({"tag": "button", "attributes": {}, "description": "Accept"})),
            ],
        );

        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        let dialog = &tree["children"][0];
        assert_eq!(dialog["role"], "dialog");
        assert_eq!(dialog["modal"], true);
        assert_eq!(dialog["important information"], MODAL_HINT);
        assert_eq!(dialog["children"][0]["mmid"], 3);
    }

    #[tokio::test]
    async fn test_label_unravels() {
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "LabelText", "Email", &["3"], tagged(4)),
                ax("3", "textbox", "Email", &[], tagged(5)),
            ],
            vec![
                (4, json!({"tag": "label", "attributes": {"for": "email"}})),
                (5, json!({"tag": "input", "tag_type": "email", "attributes": {"id": "email"}})),
            ],
        );

        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        let children = tree["children"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0]["mmid"], 5);
        assert_eq!(children[0]["name"], "Email");
    }

    #[tokio::test]
    async fn test_input_only_hoists_inputs() {
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2", "5"], json!([])),
                ax("2", "navigation", "Main", &["3", "4"], tagged(2)),
                ax("3", "button", "Menu", &[], tagged(3)),
                ax("4", "StaticText", "Long navigation text", &[], json!([])),
                ax("5", "heading", "Title", &[], tagged(6)),
            ],
            vec![
                (2, json!({"tag": "nav", "attributes": {"aria-label": "Main"}})),
                (3, json!({"tag": "button", "attributes": {"id": "menu"}})),
                (6, json!({"tag": "h1", "attributes": {}, "description": "Title"})),
            ],
        );

        let tree = TreeReconciler::new().get_tree(&page, true).await.unwrap().unwrap();
        assert_eq!(
            tree,
            json!({"role": "WebArea", "children": [{"mmid": 3, "tag": "button", "name": "Menu"}]})
        );
    }

    #[tokio::test]
    async fn test_unresolved_lookup_keeps_bare_element() {
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "button", "Close", &[], tagged(11)),
            ],
            vec![],
        );
        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        assert_eq!(
            tree["children"][0],
            json!({"mmid": 11, "role": "button", "name": "Close"})
        );
    }

    #[tokio::test]
    async fn test_overlay_elements_removed() {
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "button", "Stop", &[], tagged(12)),
            ],
            vec![(12, json!({"removed": true}))],
        );
        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap().unwrap();
        assert!(tree.get("children").is_none());
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let page = FakePage::new();
        page.set_ax_tree(json!({"nodes": []}));
        let tree = TreeReconciler::new().get_tree(&page, false).await.unwrap();
        assert!(tree.is_none());
        assert_eq!(page.script_calls(INJECT_SCRIPT), 1);
        assert_eq!(page.script_calls(CLEANUP_SCRIPT), 1);
    }

    #[tokio::test]
    async fn test_tree_dumps_written() {
        let dir = tempfile::tempdir().unwrap();
        let page = page_with(
            vec![
                ax("1", "RootWebArea", "", &["2"], json!([])),
                ax("2", "StaticText", "Hello there", &[], json!([])),
            ],
            vec![],
        );
        TreeReconciler::with_dump_dir(dir.path().to_path_buf())
            .get_tree(&page, false)
            .await
            .unwrap();
        assert!(dir.path().join("json_accessibility_dom.json").exists());
        assert!(dir.path().join("json_accessibility_dom_enriched.json").exists());
    }

    #[test]
    fn test_prune_rules() {
        let root = Node::Text {
            role: "WebArea".into(),
            name: String::new(),
            states: BTreeMap::new(),
            children: vec![
                Node::Removed,
                text("generic", ""),
                text("separator", "---"),
                text("text", "a:"),
                text("text", "Price: $10"),
                text("heading", "Hi"),
                Node::Unravel(vec![text("text", "inside label"), Node::Removed]),
            ],
        };
        let pruned = prune(root, false);
        assert_eq!(pruned.len(), 1);
        let Node::Text { children, .. } = &pruned[0] else {
            panic!("root should stay a text node");
        };
        assert_eq!(children, &vec![text("text", "Price: $10"), text("text", "inside label")]);
    }

    #[test]
    fn test_prune_keeps_stateful_text() {
        let mut states = BTreeMap::new();
        states.insert("checked".to_string(), json!(false));
        let node = Node::Text {
            role: "menuitemcheckbox".into(),
            name: "Bold".into(),
            states,
            children: Vec::new(),
        };
        assert_eq!(prune(node.clone(), false), vec![node]);
    }

    #[test]
    fn test_residual_text() {
        assert!(has_residual_text("Total"));
        assert!(!has_residual_text(" , :\n"));
        assert!(!has_residual_text("a,b"));
        assert!(has_residual_text("a, b, c"));
    }

    #[test]
    fn test_name_equal_to_id_dropped() {
        let info = ElementInfo {
            tag: "div".into(),
            attributes: BTreeMap::from([("title".to_string(), "x".to_string())]),
            ..Default::default()
        };
        let node = element_node(14, "generic".into(), "14".into(), BTreeMap::new(), None, info, vec![], false);
        let Node::Element(e) = node else {
            panic!("expected element");
        };
        assert!(e.name.is_none());

        let info = ElementInfo {
            tag: "input".into(),
            ..Default::default()
        };
        let node = element_node(14, "textbox".into(), "14".into(), BTreeMap::new(), None, info, vec![], false);
        let Node::Element(e) = node else {
            panic!("expected element");
        };
        assert_eq!(e.name.as_deref(), Some("14"));
    }
}
