use webnav_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("webnav status");
    println!("=============");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:      {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found, using defaults)" }
    );

    let config = Config::load_or_default(&paths)?;

    let browser = &config.browser;
    match &browser.remote_debugging_url {
        Some(url) => println!("Browser:     attach to {}", url),
        None => {
            let binary = browser
                .executable_path
                .clone()
                .or_else(webnav_browser::session::find_chrome_binary);
            match binary {
                Some(path) => println!("Browser:     {} ✓", path),
                None => println!("Browser:     ✗ no Chrome/Chromium found"),
            }
        }
    }
    println!("Headless:    {}", browser.headless);
    println!("Homepage:    {}", browser.homepage);
    println!("Profiles:    {}", paths.sessions_dir().display());
    println!();

    let actions = &config.actions;
    println!("Actions:");
    println!("  settle window    {} ms", actions.settle_window_ms);
    println!("  locate timeout   {} ms", actions.locate_timeout_ms);
    println!("  dom ready        {} ms", actions.dom_ready_timeout_ms);
    println!();

    let agent = &config.agent;
    println!("Loop window: {} turns", agent.loop_window);
    println!(
        "Screenshots: {}",
        if agent.take_screenshots {
            paths.screenshots_dir().display().to_string()
        } else {
            "off".to_string()
        }
    );
    println!(
        "Tree dumps:  {}",
        if agent.dump_trees {
            paths.tree_dump_dir().display().to_string()
        } else {
            "off".to_string()
        }
    );

    if !config_exists {
        println!();
        println!("Run `webnav onboard` to write a config file.");
    }

    Ok(())
}
