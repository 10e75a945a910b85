use std::{
    collections::HashMap,
    env,
    fs,
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .plotgptrc if exists
        if let Ok(text) = fs::read_to_string(&config_path) {
            map.extend(parse_rc(&text));
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Build a config from explicit pairs on top of the defaults, ignoring the
    /// rc file and the environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        map.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.get_path("WORK_DIR").unwrap_or_else(|| PathBuf::from("./temp"))
    }

    /// Extra interpreter arguments, whitespace separated.
    pub fn interpreter_args(&self) -> Vec<String> {
        self.get("INTERPRETER_ARGS")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_rc(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "DISABLE_STREAMING",
        "MAX_RETRY",
        "EXEC_TIMEOUT",
        "PYTHON_INTERPRETER",
        "INTERPRETER_ARGS",
        "WORK_DIR",
        "SCRIPT_NAME",
        "EXTRACT_ANCHOR",
    ];

    KEYS.contains(&k) || k.starts_with("PLOTGPT_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("plotgpt").join(".plotgptrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    m.insert("WORK_DIR".into(), "./temp".into());
    m.insert("SCRIPT_NAME".into(), "test.py".into());
    m.insert("PYTHON_INTERPRETER".into(), "python".into());

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("EXEC_TIMEOUT".into(), "30".into());
    m.insert("MAX_RETRY".into(), "3".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o-2024-08-06".into());
    m.insert("API_BASE_URL".into(), "default".into());

    // Bools as strings
    m.insert("DISABLE_STREAMING".into(), "false".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rc_skips_comments_and_blanks() {
        let text = "# comment\n\nDEFAULT_MODEL = gpt-4o\nEXEC_TIMEOUT=10\nnot a pair\n";
        let map = parse_rc(text);
        assert_eq!(map.len(), 2);
        assert_eq!(map["DEFAULT_MODEL"], "gpt-4o");
        assert_eq!(map["EXEC_TIMEOUT"], "10");
    }

    #[test]
    fn defaults_are_present() {
        let cfg = Config::from_pairs(Vec::<(String, String)>::new());
        assert_eq!(cfg.get_usize("MAX_RETRY"), Some(3));
        assert_eq!(cfg.get_u64("EXEC_TIMEOUT"), Some(30));
        assert_eq!(cfg.get("SCRIPT_NAME").as_deref(), Some("test.py"));
        assert_eq!(cfg.work_dir(), PathBuf::from("./temp"));
        assert!(!cfg.get_bool("DISABLE_STREAMING"));
    }

    #[test]
    fn interpreter_args_split_on_whitespace() {
        let cfg = Config::from_pairs([("INTERPRETER_ARGS", "run  -n lm-eval python")]);
        assert_eq!(cfg.interpreter_args(), vec!["run", "-n", "lm-eval", "python"]);
    }

    #[test]
    fn config_key_filter() {
        assert!(is_config_key("OPENAI_API_KEY"));
        assert!(is_config_key("PLOTGPT_ANYTHING"));
        assert!(is_config_key("WORK_DIR"));
        assert!(!is_config_key("HOME"));
    }
}
