//! Ways of sending a script to the database: through `cypher-shell`, or
//! statement by statement over Bolt.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use neo4rs::{query, Graph};
use tracing::{debug, error, warn};

use crate::config::{ImportConfig, Neo4jConfig};
use crate::error::{ImportError, Result};
use crate::neo4j::connect;
use crate::process::{CommandSpawner, ExitStatus, TokioSpawner};
use crate::statements::{split_statements, Statement};

/// A script read from the script directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Short label used in log lines.
    fn describe(&self) -> String;

    async fn execute(&self, script: &Script) -> Result<ExitStatus>;
}

/// Connection flags for `cypher-shell`: `-a <uri> -u <user> -p <password>`,
/// plus `-d <database>` when one is configured.
pub fn connection_args(config: &Neo4jConfig) -> Vec<String> {
    let mut args = vec![
        "-a".to_owned(),
        config.uri.clone(),
        "-u".to_owned(),
        config.username.clone(),
        "-p".to_owned(),
        config.password.clone(),
    ];
    if let Some(db) = &config.database {
        args.push("-d".to_owned());
        args.push(db.clone());
    }
    args
}

/// Pipes each script into `<bin>/cypher-shell`.
pub struct CypherShell<S = TokioSpawner> {
    program: PathBuf,
    args: Vec<String>,
    spawner: S,
}

impl<S> CypherShell<S> {
    pub fn new(config: &ImportConfig, spawner: S) -> Self {
        Self {
            program: config.client_program(),
            args: connection_args(&config.neo4j),
            spawner,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl<S> fmt::Debug for CypherShell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CypherShell")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: CommandSpawner> ScriptExecutor for CypherShell<S> {
    fn describe(&self) -> String {
        self.program().display().to_string()
    }

    async fn execute(&self, script: &Script) -> Result<ExitStatus> {
        debug!(script = %script.name, program = %self.program.display(), "spawning client");
        self.spawner
            .spawn(&self.program, &self.args, &script.contents)
            .await
    }
}

/// Error type of a single statement run, in the driver's boxed style.
pub type StatementError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can run one Cypher statement. Implemented for [`Graph`].
#[async_trait]
pub trait CypherRunner: Send + Sync {
    async fn run_cypher(&self, cypher: &str) -> std::result::Result<(), StatementError>;
}

#[async_trait]
impl CypherRunner for Graph {
    async fn run_cypher(&self, cypher: &str) -> std::result::Result<(), StatementError> {
        self.run(query(cypher)).await?;
        Ok(())
    }
}

/// Runs scripts over Bolt with the `neo4rs` driver, one statement at a time.
pub struct BoltExecutor<G = Graph> {
    graph: G,
    uri: String,
}

impl BoltExecutor {
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph = connect(config).await?;
        Ok(Self::with_runner(graph, config.uri.clone()))
    }
}

impl<G> BoltExecutor<G> {
    pub fn with_runner(graph: G, uri: impl Into<String>) -> Self {
        Self {
            graph,
            uri: uri.into(),
        }
    }
}

#[async_trait]
impl<G: CypherRunner> ScriptExecutor for BoltExecutor<G> {
    fn describe(&self) -> String {
        format!("bolt driver ({})", self.uri)
    }

    /// Statements run in order; the first failure marks the script failed and
    /// the rest of it is not sent.
    async fn execute(&self, script: &Script) -> Result<ExitStatus> {
        let text =
            std::str::from_utf8(&script.contents).map_err(|source| ImportError::ScriptEncoding {
                name: script.name.clone(),
                source,
            })?;

        let mut index = 0;
        for statement in split_statements(text) {
            match statement {
                Statement::ShellCommand(command) => {
                    warn!(script = %script.name, %command, "skipping cypher-shell command");
                }
                Statement::Cypher(cypher) => {
                    index += 1;
                    debug!(script = %script.name, statement = index, "running statement");
                    if let Err(e) = self.graph.run_cypher(&cypher).await {
                        error!(
                            script = %script.path.display(),
                            statement = index,
                            "statement failed: {e}"
                        );
                        return Ok(ExitStatus::FAILURE);
                    }
                }
            }
        }
        Ok(ExitStatus::SUCCESS)
    }
}
