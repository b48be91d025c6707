pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod neo4j;
pub mod process;
pub mod runner;
pub mod similarity;
pub mod statements;

pub use config::{ImportConfig, Neo4jConfig};
pub use error::{ImportError, Result};
pub use executor::{BoltExecutor, CypherRunner, CypherShell, Script, ScriptExecutor};
pub use logging::init_logging;
pub use neo4j::connect;
pub use process::{CommandSpawner, ExitStatus, TokioSpawner};
pub use runner::{ImportReport, ImportRunner, DEFAULT_SCRIPTS};
pub use similarity::{link_similar, SimilarityReport};
