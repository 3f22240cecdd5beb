use serde_json::Value;
use std::collections::BTreeMap;
use webnav_browser::ToolRegistry;

fn schema_function(schema: &Value) -> &Value {
    schema.get("function").unwrap_or(schema)
}

/// List all registered tools.
pub async fn list() -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.get_tool_schemas();

    println!();
    println!("🔧 Registered tools ({} total)", schemas.len());
    println!();

    let mut categorized: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for schema in &schemas {
        let name = schema_function(schema)["name"].as_str().unwrap_or("");
        categorized.entry(categorize_tool(name)).or_default().push(schema);
    }

    for (cat, tools) in &categorized {
        println!("  📂 {} ({})", cat, tools.len());
        for tool in tools {
            let func = schema_function(tool);
            let name = func["name"].as_str().unwrap_or("");
            let desc = func["description"].as_str().unwrap_or("");
            let short_desc: String = desc.chars().take(60).collect();
            let ellipsis = if desc.chars().count() > 60 { "..." } else { "" };
            println!("     {:<26} {}{}", name, short_desc, ellipsis);
        }
        println!();
    }

    Ok(())
}

/// Show detailed info for a specific tool.
pub async fn info(tool_name: &str) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.get_tool_schemas();

    let Some(schema) = schemas
        .iter()
        .find(|s| schema_function(s)["name"].as_str() == Some(tool_name))
    else {
        anyhow::bail!(
            "Tool '{}' not found. Use `webnav tools list` to see all available tools.",
            tool_name
        );
    };

    let func = schema_function(schema);
    println!();
    println!("🔧 {}", func["name"].as_str().unwrap_or(""));
    println!();
    println!("  Description: {}", func["description"].as_str().unwrap_or(""));
    println!();

    let params = &func["parameters"];
    let required: Vec<&str> = params["required"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    if let Some(props) = params["properties"].as_object().filter(|p| !p.is_empty()) {
        println!("  Parameters:");
        for (key, val) in props {
            let typ = val["type"].as_str().unwrap_or("any");
            let desc = val["description"].as_str().unwrap_or("");
            let req = if required.contains(&key.as_str()) { " (required)" } else { "" };
            let enum_str = val["enum"]
                .as_array()
                .map(|arr| {
                    let vals: Vec<&str> = arr.iter().filter_map(|v| v.as_str()).collect();
                    format!(" [{}]", vals.join("|"))
                })
                .unwrap_or_default();

            println!("    {:<28} {:<8}{}{}", key, typ, req, enum_str);
            if !desc.is_empty() {
                println!("      {}", desc);
            }
        }
    } else {
        println!("  Parameters: none");
    }
    println!();

    Ok(())
}

fn categorize_tool(name: &str) -> &'static str {
    match name {
        "get_dom_with_content_type" => "Page Content",
        "click" | "enter_text" | "bulk_enter_text" | "enter_text_and_click" | "hover" | "press_key_combination" => {
            "Element Interaction"
        }
        "open_url" | "get_url" | "wait" => "Navigation",
        _ => "Other",
    }
}
