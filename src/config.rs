use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use url::Url;

use crate::deadline::Deadline;
use crate::error::ConfigError;

pub const QUESTION_SLOT: &str = "{question}";

const DEFAULT_PROMPT: &str = include_str!("../prompts/text_to_sql.txt");
const DEFAULT_SCHEMA: &str = include_str!("../sql/schema.sql");
const DEFAULT_SEED: &str = include_str!("../sql/seed.sql");

/// Ask a PostgreSQL database a question in plain language.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[clap(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[clap(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    #[clap(long, env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub db_password: String,

    #[clap(long, env = "DB_NAME", default_value = "postgres")]
    pub db_name: String,

    /// Connect without TLS
    #[clap(long, env = "DB_DISABLE_TLS", default_value_t = true, action = clap::ArgAction::Set)]
    pub db_disable_tls: bool,

    /// Ollama base URL, scheme included
    #[clap(long, env = "OLLAMA_HOST", default_value = "http://localhost")]
    pub ollama_host: String,

    #[clap(long, env = "OLLAMA_PORT", default_value_t = 11434)]
    pub ollama_port: u16,

    #[clap(long, env = "LLM_MODEL", default_value = "llama3.2:latest")]
    pub model: String,

    /// Overall time budget for the run, e.g. "90s" or "2m"
    #[clap(long, env = "SQLASK_TIMEOUT", default_value = "2m", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Prompt template file; must contain a {question} slot
    #[clap(long, env = "SQLASK_PROMPT_FILE")]
    pub prompt_file: Option<PathBuf>,

    #[clap(long, env = "SQLASK_SCHEMA_FILE")]
    pub schema_file: Option<PathBuf>,

    #[clap(long, env = "SQLASK_SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Print debug information
    #[clap(long)]
    pub debug: bool,
}

impl Cli {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.db_disable_tls {
            PgSslMode::Disable
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name)
            .ssl_mode(ssl_mode)
    }

    /// Base URL of the Ollama server: `--ollama-host` with `--ollama-port` applied.
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let invalid = || ConfigError::InvalidHost(self.ollama_host.clone());

        let mut url = Url::parse(&self.ollama_host).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid());
        }
        url.set_port(Some(self.ollama_port)).map_err(|_| invalid())?;
        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama_url()?;
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.timeout > Deadline::MAX_BUDGET {
            return Err(ConfigError::TimeoutTooLong {
                max: Deadline::MAX_BUDGET,
            });
        }
        Ok(())
    }
}

/// Immutable text resources loaded once at startup.
#[derive(Debug, Clone)]
pub struct Resources {
    pub template: PromptTemplate,
    pub schema: String,
    pub seed: String,
}

impl Resources {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let template = load_or(cli.prompt_file.as_deref(), DEFAULT_PROMPT)?;
        Ok(Self {
            template: PromptTemplate::new(template)?,
            schema: load_or(cli.schema_file.as_deref(), DEFAULT_SCHEMA)?,
            seed: load_or(cli.seed_file.as_deref(), DEFAULT_SEED)?,
        })
    }
}

fn load_or(path: Option<&Path>, embedded: &str) -> Result<String, ConfigError> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|source| ConfigError::Missing {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(embedded.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: String) -> Result<Self, ConfigError> {
        if !text.contains(QUESTION_SLOT) {
            return Err(ConfigError::MissingSlot {
                slot: QUESTION_SLOT,
            });
        }
        Ok(Self { text })
    }

    pub fn render(&self, question: &str) -> String {
        self.text.replace(QUESTION_SLOT, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["sqlask"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn embedded_resources_load() {
        let resources = Resources::load(&cli(&[])).unwrap();
        assert!(resources.schema.contains("CREATE TABLE"));
        assert!(resources.seed.contains("INSERT INTO"));
        assert!(resources
            .template
            .render("how many books are there?")
            .contains("Question: how many books are there?"));
    }

    #[test]
    fn missing_override_file_fails_at_load() {
        let err = Resources::load(&cli(&["--seed-file", "/nonexistent/seed.sql"])).unwrap_err();
        match err {
            ConfigError::Missing { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/seed.sql"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn template_without_slot_is_rejected() {
        let err = PromptTemplate::new("no slot here".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSlot { .. }));
    }

    #[test]
    fn timeout_parses_humantime() {
        assert_eq!(cli(&["--timeout", "90s"]).timeout, Duration::from_secs(90));
    }

    #[test]
    fn host_needs_scheme() {
        let parsed = cli(&["--ollama-host", "localhost"]);
        assert!(matches!(parsed.validate(), Err(ConfigError::InvalidHost(_))));
    }

    #[test]
    fn host_without_name_is_rejected() {
        for host in ["http://", "https://", "ftp://models.local", "http//oops"] {
            let parsed = cli(&["--ollama-host", host]);
            assert!(
                matches!(parsed.validate(), Err(ConfigError::InvalidHost(_))),
                "{host} should be rejected"
            );
        }
    }

    #[test]
    fn ollama_url_carries_port() {
        let parsed = cli(&["--ollama-host", "http://gpu-box", "--ollama-port", "8080"]);
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.ollama_url().unwrap().as_str(), "http://gpu-box:8080/");
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let parsed = cli(&["--timeout", "400000000000y"]);
        assert!(matches!(
            parsed.validate(),
            Err(ConfigError::TimeoutTooLong { .. })
        ));
    }
}
