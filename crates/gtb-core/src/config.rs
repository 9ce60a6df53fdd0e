use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, gateway::GatewayConfig, Result};

/// Typed configuration, loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_safe_limit: usize,

    // GitHub OAuth app
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_redirect_uri: String,
    pub github_scopes: Vec<String>,
    pub github_api_base: String,
    pub github_oauth_base: String,
    pub github_timeout: Duration,

    // Storage
    pub database_url: String,
    pub snapshot_file: PathBuf,

    // Callback server
    pub public_base_url: String,
    pub http_bind: SocketAddr,

    // Cache behavior
    pub repo_cache_ttl: Duration,
    pub invalidate_repo_cache_on_create: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let github_client_id = required("GITHUB_CLIENT_ID")?;
        let github_client_secret = required("GITHUB_CLIENT_SECRET")?;

        let public_base_url = env_str("PUBLIC_BASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let github_redirect_uri = env_str("GITHUB_REDIRECT_URI")
            .and_then(non_empty)
            .unwrap_or_else(|| format!("{public_base_url}/auth/github/callback"));
        let github_scopes = parse_csv(
            env_str("GITHUB_SCOPES").or_else(|| Some("repo,user,delete_repo".to_string())),
        );

        let github_api_base = env_str("GITHUB_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.github.com".to_string());
        let github_oauth_base = env_str("GITHUB_OAUTH_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://github.com".to_string());
        let github_timeout = Duration::from_secs(env_u64("GITHUB_TIMEOUT_SECS").unwrap_or(15));

        let database_url = env_str("DATABASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| default_database_url(&data_dir(env_str("HOME"))));
        let snapshot_file = env_str("SNAPSHOT_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir(env_str("HOME")).join("snapshot.json"));

        let http_bind = parse_bind(env_str("HTTP_BIND"), env_str("PORT"))?;

        let repo_cache_ttl =
            Duration::from_secs(env_u64("REPO_CACHE_TTL_SECS").unwrap_or(5 * 60));
        let invalidate_repo_cache_on_create =
            env_bool("INVALIDATE_REPO_CACHE_ON_CREATE").unwrap_or(true);

        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);

        Ok(Self {
            telegram_bot_token,
            telegram_safe_limit,
            github_client_id,
            github_client_secret,
            github_redirect_uri,
            github_scopes,
            github_api_base,
            github_oauth_base,
            github_timeout,
            database_url,
            snapshot_file,
            public_base_url,
            http_bind,
            repo_cache_ttl,
            invalidate_repo_cache_on_create,
        })
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            repo_cache_ttl: self.repo_cache_ttl,
            invalidate_on_create: self.invalidate_repo_cache_on_create,
        }
    }
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

/// Per-user state directory (`$HOME/.gtb`) holding the database and the snapshot.
fn data_dir(home: Option<String>) -> PathBuf {
    let home = home.and_then(non_empty).unwrap_or_else(|| ".".to_string());
    PathBuf::from(home).join(".gtb")
}

fn default_database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("gtb.db").display())
}

fn parse_bind(bind: Option<String>, port: Option<String>) -> Result<SocketAddr> {
    if let Some(bind) = bind.and_then(non_empty) {
        return bind
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid HTTP_BIND {bind:?}: {e}")));
    }
    let port = match port.and_then(non_empty) {
        Some(p) => p
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("invalid PORT {p:?}: {e}")))?,
        None => 3000,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
