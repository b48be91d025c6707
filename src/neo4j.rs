use crate::config::Neo4jConfig;
use neo4rs::{ConfigBuilder, Graph};

/// Create a [`Graph`] connection using the provided config.
pub async fn connect(config: &Neo4jConfig) -> Result<Graph, neo4rs::Error> {
    // `+s`/`+ssc` schemes need a process-wide crypto provider. Installing twice
    // returns the existing one, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut builder = ConfigBuilder::default()
        .uri(&config.uri)
        .user(&config.username)
        .password(&config.password);
    if let Some(db) = &config.database {
        builder = builder.db(db.as_str());
    }
    let cfg = builder.build().map_err(neo4rs::Error::from)?;
    Graph::connect(cfg)
}
