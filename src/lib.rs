pub mod config;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod generator;
pub mod logging;
pub mod output;
pub mod pg_value;
pub mod text_to_sql_chain;

pub use config::{Cli, PromptTemplate, Resources};
pub use deadline::Deadline;
pub use error::{ConfigError, GenerationError, ScriptError};
pub use executor::{apply_script, query_row, Cleanup, ScriptTx, Session, TxGuard};
pub use generator::{Generator, OllamaGenerator};
pub use output::ResultRow;
pub use text_to_sql_chain::{Answer, TextToSqlChain};
