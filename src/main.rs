use std::io;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use yelp_graph_import::{
    connect, init_logging, link_similar, BoltExecutor, CypherShell, ImportConfig, ImportRunner,
    Neo4jConfig, Result, TokioSpawner,
};

/// Stage yelp.csv into the Neo4j import directory and run the Cypher scripts
/// that build the graph.
///
/// Connection and paths come from NEO4J_URI, NEO4J_USERNAME, NEO4J_PASSWORD,
/// NEO4J_DATABASE, NEO4J_HOME, NEO4J_BIN, CYPHERS_DIR and YELP_CSV (a `.env`
/// file is read first).
#[derive(Parser, Debug)]
#[command(name = "yelp-graph-import", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Continue with later steps after a failed copy or script
    #[arg(long)]
    keep_going: bool,

    /// How scripts reach the database
    #[arg(long, value_enum, default_value_t = Client::CypherShell)]
    client: Client,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Rebuild `Is_Similar` edges between Zillow properties and Airbnb rentals
    /// already in the graph
    LinkSimilar {
        /// Edges written concurrently
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Client {
    /// Pipe each script into `cypher-shell`
    CypherShell,
    /// Send statements over Bolt with the built-in driver
    Bolt,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<bool> {
    match cli.command {
        Some(Command::LinkSimilar { concurrency }) => link(concurrency).await,
        None => import(cli).await,
    }
}

async fn link(concurrency: usize) -> Result<bool> {
    let graph = connect(&Neo4jConfig::from_env()).await?;
    let report = link_similar(graph, concurrency).await?;
    info!(
        "linked {} properties and {} rentals: {} property, {} rental, {} mixed edges",
        report.properties,
        report.rentals,
        report.property_edges,
        report.rental_edges,
        report.property_rental_edges
    );
    Ok(true)
}

async fn import(cli: &Cli) -> Result<bool> {
    let config = ImportConfig::from_env();
    let report = match cli.client {
        Client::CypherShell => {
            let shell = CypherShell::new(&config, TokioSpawner);
            ImportRunner::new(config, shell, io::stdout())
                .keep_going(cli.keep_going)
                .run_all()
                .await
        }
        Client::Bolt => {
            let bolt = BoltExecutor::connect(&config.neo4j).await?;
            ImportRunner::new(config, bolt, io::stdout())
                .keep_going(cli.keep_going)
                .run_all()
                .await
        }
    };
    Ok(report.succeeded())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_uses_cypher_shell_and_stops_on_failure() {
        let cli = Cli::try_parse_from(["yelp-graph-import"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.client, Client::CypherShell);
        assert!(!cli.keep_going);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn flags_parse() {
        let cli =
            Cli::try_parse_from(["yelp-graph-import", "--client", "bolt", "--keep-going", "-vv"])
                .unwrap();
        assert_eq!(cli.client, Client::Bolt);
        assert!(cli.keep_going);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn link_similar_subcommand() {
        let cli = Cli::try_parse_from(["yelp-graph-import", "link-similar", "--concurrency", "8"])
            .unwrap();
        assert_eq!(cli.command, Some(Command::LinkSimilar { concurrency: 8 }));

        let cli = Cli::try_parse_from(["yelp-graph-import", "link-similar"]).unwrap();
        assert_eq!(cli.command, Some(Command::LinkSimilar { concurrency: 4 }));
    }
}
