use std::io::Write;

use anyhow::{Context, Error};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::{Cli, PromptTemplate, Resources};
use crate::deadline::Deadline;
use crate::error::GenerationError;
use crate::executor::{apply_script, query_row, Session};
use crate::generator::{Generator, OllamaGenerator};
use crate::output::{write_query, write_row, ResultRow};

/// The question-answer cycle: prompt the model, run what it returns, print the row.
///
/// The generated text is executed as-is. Nothing checks that it is read-only
/// or even well-formed; limit the database role's privileges accordingly.
pub struct TextToSqlChain<G, S> {
    client: G,
    db: S,
    template: PromptTemplate,
}

/// What a cycle produced. `None` from [`TextToSqlChain::run`] means the
/// question was empty and nothing was done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub query: String,
    pub row: ResultRow,
}

impl TextToSqlChain<OllamaGenerator, PgPool> {
    pub async fn initialize(
        cli: &Cli,
        template: PromptTemplate,
        deadline: &Deadline,
    ) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(deadline.remaining())
            .connect_with(cli.connect_options())
            .await
            .with_context(|| format!("connect to {}:{}", cli.db_host, cli.db_port))?;

        info!(host = %cli.db_host, database = %cli.db_name, "connected");

        let client = OllamaGenerator::new(cli.ollama_url()?, cli.model.clone());

        Ok(TextToSqlChain::new(client, pool, template))
    }
}

impl<G: Generator, S: Session> TextToSqlChain<G, S> {
    pub fn new(client: G, db: S, template: PromptTemplate) -> Self {
        Self {
            client,
            db,
            template,
        }
    }

    /// Applies the schema script, then the seed script, each in its own transaction.
    pub async fn bootstrap(&self, resources: &Resources, deadline: &Deadline) -> Result<(), Error> {
        apply_script(&self.db, deadline, &resources.schema)
            .await
            .context("apply schema script")?;
        let rows = apply_script(&self.db, deadline, &resources.seed)
            .await
            .context("apply seed script")?;
        info!(rows, "database bootstrapped");
        Ok(())
    }

    pub async fn generate_query(
        &self,
        question: &str,
        deadline: &Deadline,
    ) -> Result<String, GenerationError> {
        let prompt = self.template.render(question);

        deadline
            .bound(self.client.generate(prompt))
            .await
            .map_err(|_| GenerationError::TimedOut)?
    }

    /// Runs one cycle, writing the query and then the row to `out`.
    pub async fn run<W: Write>(
        &self,
        question: &str,
        deadline: &Deadline,
        out: &mut W,
    ) -> Result<Option<Answer>, Error> {
        if question.trim().is_empty() {
            return Ok(None);
        }

        let sql_query = self
            .generate_query(question, deadline)
            .await
            .context("generate query")?;

        write_query(out, &sql_query).context("print query")?;

        let row = query_row(&self.db, deadline, &sql_query)
            .await
            .context("execute query")?;

        write_row(out, &row).context("print result")?;

        Ok(Some(Answer {
            query: sql_query,
            row,
        }))
    }
}
