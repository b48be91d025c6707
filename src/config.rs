use std::env;
use std::fmt;
use std::path::PathBuf;

pub const NEO4J_URI: &str = "NEO4J_URI";
pub const NEO4J_USERNAME: &str = "NEO4J_USERNAME";
pub const NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
pub const NEO4J_DATABASE: &str = "NEO4J_DATABASE";
pub const NEO4J_HOME: &str = "NEO4J_HOME";
pub const NEO4J_BIN: &str = "NEO4J_BIN";
pub const CYPHERS_DIR: &str = "CYPHERS_DIR";
pub const YELP_CSV: &str = "YELP_CSV";

pub const DEFAULT_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_USERNAME: &str = "neo4j";
/// Placeholder; real deployments set `NEO4J_PASSWORD`.
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_HOME: &str = "/var/lib/neo4j";
pub const DEFAULT_CYPHERS_DIR: &str = "cyphers";
pub const DEFAULT_CSV: &str = "yelp.csv";

/// Name of the client binary inside the Neo4j `bin` directory.
pub const CLIENT_BINARY: &str = "cypher-shell";
/// Directory under the Neo4j home that `LOAD CSV` reads `file:///` URLs from.
pub const IMPORT_SUBDIR: &str = "import";

/// Look up `key`, treating an empty value the same as an unset one.
fn setting<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.is_empty())
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Configuration for connecting to a Neo4j instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

impl Neo4jConfig {
    /// Load configuration from environment variables, falling back to the
    /// local-install defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            uri: setting(&lookup, NEO4J_URI).unwrap_or_else(|| DEFAULT_URI.to_owned()),
            username: setting(&lookup, NEO4J_USERNAME)
                .unwrap_or_else(|| DEFAULT_USERNAME.to_owned()),
            password: setting(&lookup, NEO4J_PASSWORD)
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_owned()),
            database: setting(&lookup, NEO4J_DATABASE),
        }
    }
}

/// Everything an import run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub neo4j: Neo4jConfig,
    pub neo4j_home: PathBuf,
    /// Directory holding `cypher-shell`. Defaults to `<neo4j_home>/bin`.
    pub bin_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub csv_source: PathBuf,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Resolve every setting through `lookup`, using the default for any
    /// key that is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let neo4j_home =
            PathBuf::from(setting(&lookup, NEO4J_HOME).unwrap_or_else(|| DEFAULT_HOME.to_owned()));
        let bin_dir = setting(&lookup, NEO4J_BIN)
            .map(PathBuf::from)
            .unwrap_or_else(|| neo4j_home.join("bin"));
        Self {
            neo4j: Neo4jConfig::from_lookup(&lookup),
            bin_dir,
            scripts_dir: PathBuf::from(
                setting(&lookup, CYPHERS_DIR).unwrap_or_else(|| DEFAULT_CYPHERS_DIR.to_owned()),
            ),
            csv_source: PathBuf::from(
                setting(&lookup, YELP_CSV).unwrap_or_else(|| DEFAULT_CSV.to_owned()),
            ),
            neo4j_home,
        }
    }

    pub fn import_dir(&self) -> PathBuf {
        self.neo4j_home.join(IMPORT_SUBDIR)
    }

    pub fn client_program(&self) -> PathBuf {
        self.bin_dir.join(CLIENT_BINARY)
    }
}

/// Password is always redacted.
impl fmt::Display for ImportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uri={} user={} password=**** database={} home={} bin={} scripts={} csv={}",
            self.neo4j.uri,
            self.neo4j.username,
            self.neo4j.database.as_deref().unwrap_or("<default>"),
            self.neo4j_home.display(),
            self.bin_dir.display(),
            self.scripts_dir.display(),
            self.csv_source.display(),
        )
    }
}
