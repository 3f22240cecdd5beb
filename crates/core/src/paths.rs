use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".webnav"))
            .unwrap_or_else(|| PathBuf::from(".webnav"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Browser profiles (user data dirs), one per session name.
    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join("sessions")
    }

    pub fn session_profile(&self, session_name: &str) -> PathBuf {
        let safe_name = session_name.replace([':', '/', '\\'], "_");
        self.sessions_dir().join(safe_name)
    }

    /// Tool call history of one `run` session, one JSON record per line.
    pub fn conversation_log(&self, session_name: &str) -> PathBuf {
        let safe_name = session_name.replace([':', '/', '\\'], "_");
        self.log_dir().join("conversations").join(format!("{}.jsonl", safe_name))
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.base.join("screenshots")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    /// Raw and reconciled accessibility trees written when tree dumps are on.
    pub fn tree_dump_dir(&self) -> PathBuf {
        self.log_dir().join("trees")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.sessions_dir())?;
        std::fs::create_dir_all(self.screenshots_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = Paths::with_base(PathBuf::from("/tmp/wn"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/wn/config.json"));
        assert_eq!(paths.tree_dump_dir(), PathBuf::from("/tmp/wn/logs/trees"));
        assert_eq!(
            paths.conversation_log("shop:1"),
            PathBuf::from("/tmp/wn/logs/conversations/shop_1.jsonl")
        );
        assert_eq!(
            paths.session_profile("cli:default"),
            PathBuf::from("/tmp/wn/sessions/cli_default")
        );
    }
}
