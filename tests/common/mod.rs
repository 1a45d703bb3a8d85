#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlask::{GenerationError, Generator, PromptTemplate, ResultRow, ScriptTx, Session};

/// In-memory stand-in for a database. Scripts are `;`-separated statements:
/// `INSERT <value>` stages a row, `FAIL` errors, `SLEEP` stalls for a minute.
#[derive(Clone, Default)]
pub struct FakeDb {
    pub state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
pub struct FakeState {
    pub rows: Vec<String>,
    pub probe_fails: bool,
    pub rollback_fails: bool,
    pub rollback_stalls: bool,
    pub begin_fails: bool,
    pub commit_fails: bool,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub executed: Vec<String>,
    pub result: ResultRow,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: &[&str]) -> Self {
        let db = Self::new();
        db.state.lock().unwrap().rows = rows.iter().map(|r| r.to_string()).collect();
        db
    }

    pub fn rows(&self) -> Vec<String> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

pub struct FakeTx {
    state: Arc<Mutex<FakeState>>,
    staged: Vec<String>,
}

#[async_trait]
impl Session for FakeDb {
    type Tx = FakeTx;

    async fn probe(&self) -> Result<(), sqlx::Error> {
        if self.state.lock().unwrap().probe_fails {
            return Err(sqlx::Error::Protocol("connection reset".to_string()));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<FakeTx, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.begin_fails {
            return Err(sqlx::Error::PoolTimedOut);
        }
        state.begins += 1;
        drop(state);
        Ok(FakeTx {
            state: self.state.clone(),
            staged: Vec::new(),
        })
    }
}

#[async_trait]
impl ScriptTx for FakeTx {
    async fn execute(&mut self, script: &str) -> Result<u64, sqlx::Error> {
        self.state.lock().unwrap().executed.push(script.to_string());

        let mut affected = 0;
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if statement == "FAIL" {
                return Err(sqlx::Error::Protocol(format!("syntax error at {statement}")));
            }
            if statement == "SLEEP" {
                tokio::time::sleep(Duration::from_secs(60)).await;
                continue;
            }
            if let Some(value) = statement.strip_prefix("INSERT ") {
                self.staged.push(value.to_string());
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn fetch_row(&mut self, query: &str) -> Result<Option<ResultRow>, sqlx::Error> {
        self.execute(query).await?;
        let result = self.state.lock().unwrap().result.clone();
        Ok((!result.is_empty()).then_some(result))
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.commit_fails {
            return Err(sqlx::Error::Protocol("could not serialize access".to_string()));
        }
        state.rows.extend(self.staged);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        let stalls = self.state.lock().unwrap().rollback_stalls;
        if stalls {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        let mut state = self.state.lock().unwrap();
        state.rollbacks += 1;
        if state.rollback_fails {
            return Err(sqlx::Error::Protocol("rollback refused".to_string()));
        }
        Ok(())
    }
}

/// Generator returning a fixed completion, optionally after a delay.
pub struct StubGenerator {
    pub reply: Result<String, String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(reply)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, prompt: String) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .map_err(|message| GenerationError::GenerationFailed(message.into()))
    }
}

pub fn template() -> PromptTemplate {
    PromptTemplate::new("Answer this: {question}".to_string()).unwrap()
}
