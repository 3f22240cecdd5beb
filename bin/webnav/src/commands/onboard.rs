use std::io::{self, Write};
use webnav_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();

    if paths.config_file().exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    paths.ensure_dirs()?;

    let mut config = Config::default();
    config.browser.executable_path = webnav_browser::session::find_chrome_binary();
    config.save(&paths.config_file())?;
    println!("✓ Created config: {}", paths.config_file().display());
    println!("✓ Created data directory: {}", paths.base.display());

    if config.browser.executable_path.is_none() {
        println!();
        println!("⚠ No Chrome or Chromium binary found on PATH.");
        println!("  Set browser.executablePath or browser.remoteDebuggingUrl in the config.");
    }

    println!();
    println!("Next steps:");
    println!("  1. Run `webnav status` to verify configuration");
    println!("  2. Run `webnav dom --url example.com` to print a page tree");

    Ok(())
}
