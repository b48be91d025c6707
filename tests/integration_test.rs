use async_trait::async_trait;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use yelp_graph_import::{
    connect, BoltExecutor, CommandSpawner, CypherShell, ExitStatus, ImportConfig, ImportRunner,
    Neo4jConfig, Result, Script, ScriptExecutor,
};

#[derive(Debug, Clone)]
struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    stdin: Vec<u8>,
    staged_csv_present: bool,
}

/// Stands in for `cypher-shell`: records every call and whether the staged
/// CSV already existed when it was made.
#[derive(Clone)]
struct FakeShell {
    staged_csv: PathBuf,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

#[async_trait]
impl CommandSpawner for FakeShell {
    async fn spawn(&self, program: &Path, args: &[String], stdin: &[u8]) -> Result<ExitStatus> {
        self.calls.lock().unwrap().push(Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
            stdin: stdin.to_vec(),
            staged_csv_present: self.staged_csv.exists(),
        });
        Ok(ExitStatus::SUCCESS)
    }
}

#[tokio::test]
async fn end_to_end_with_fake_client() {
    let root = tempfile::tempdir().unwrap();
    let home = root.path().join("neo4j");
    let scripts = root.path().join("cyphers");
    std::fs::create_dir_all(home.join("import")).unwrap();
    std::fs::create_dir_all(&scripts).unwrap();
    std::fs::write(scripts.join("0_init.cyphers"), "RETURN 0;\n").unwrap();
    std::fs::write(scripts.join("1_yelp.cyphers"), "RETURN 1;\n").unwrap();
    let csv = root.path().join("yelp.csv");
    std::fs::write(&csv, "id,name\nb1,Taco Stand\n").unwrap();

    // NEO4J_URI deliberately unset.
    let env: HashMap<&str, String> = HashMap::from([
        ("NEO4J_USERNAME", "testuser".to_owned()),
        ("NEO4J_PASSWORD", "testpass".to_owned()),
        ("NEO4J_HOME", home.display().to_string()),
        ("CYPHERS_DIR", scripts.display().to_string()),
        ("YELP_CSV", csv.display().to_string()),
    ]);
    let config = ImportConfig::from_lookup(|key| env.get(key).cloned());

    let staged = home.join("import").join("yelp.csv");
    let fake = FakeShell {
        staged_csv: staged.clone(),
        calls: Arc::default(),
    };
    let shell = CypherShell::new(&config, fake.clone());
    let mut runner = ImportRunner::new(config, shell, Vec::new());
    let report = runner.run_all().await;

    assert!(report.succeeded());
    assert_eq!(std::fs::read(&staged).unwrap(), std::fs::read(&csv).unwrap());

    let calls = fake.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    let expected_args = ["-a", "bolt://localhost:7687", "-u", "testuser", "-p", "testpass"];
    for (call, (script, body)) in calls
        .iter()
        .zip([("0_init.cyphers", "RETURN 0;\n"), ("1_yelp.cyphers", "RETURN 1;\n")])
    {
        assert_eq!(call.program, home.join("bin").join("cypher-shell"));
        assert_eq!(call.args, expected_args, "args for {script}");
        assert_eq!(call.stdin, body.as_bytes(), "stdin for {script}");
        assert!(call.staged_csv_present, "copy must precede {script}");
    }

    let console = String::from_utf8(runner.into_console()).unwrap();
    let init_at = console.find("Running 0_init.cyphers").unwrap();
    let yelp_at = console.find("Running 1_yelp.cyphers").unwrap();
    assert!(init_at < yelp_at);
}

/// Connects with the environment's settings, or returns `None` when no
/// server is configured or reachable.
async fn live_graph(test: &str) -> Option<(Neo4jConfig, neo4rs::Graph)> {
    dotenv().ok();
    if std::env::var("NEO4J_URI").is_err() {
        eprintln!("Skipping {test}: missing env vars");
        return None;
    }
    let cfg = Neo4jConfig::from_env();
    let graph = match connect(&cfg).await {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Skipping {test}: could not connect to database: {e}");
            return None;
        }
    };
    if let Err(e) = graph.run(neo4rs::query("RETURN 1")).await {
        eprintln!("Skipping {test}: could not reach database: {e}");
        return None;
    }
    Some((cfg, graph))
}

async fn count(graph: &neo4rs::Graph, cypher: &str) -> i64 {
    let mut result = graph.execute(neo4rs::query(cypher)).await.unwrap();
    let row = result.next().await.unwrap().unwrap();
    row.get("n").unwrap()
}

#[tokio::test]
async fn test_connection() {
    let Some((_, graph)) = live_graph("test_connection").await else {
        return;
    };
    assert_eq!(count(&graph, "RETURN 1 AS n").await, 1);
}

#[tokio::test]
async fn test_bolt_executor() {
    let Some((cfg, graph)) = live_graph("test_bolt_executor").await else {
        return;
    };
    let bolt = BoltExecutor::with_runner(graph, cfg.uri.clone());
    let script = Script {
        name: "smoke.cyphers".into(),
        path: PathBuf::from("smoke.cyphers"),
        contents: b"// smoke\nRETURN 1;\nRETURN 'a;b';\n".to_vec(),
    };
    let status = bolt.execute(&script).await.unwrap();
    assert!(status.success(), "smoke script exited with {status}");
}

#[tokio::test]
async fn test_bolt_executor_halts_on_invalid_statement() {
    let Some((cfg, graph)) = live_graph("test_bolt_executor_halts_on_invalid_statement").await
    else {
        return;
    };
    let cleanup = "MATCH (n:YelpImportHaltCheck) DELETE n";
    graph.run(neo4rs::query(cleanup)).await.unwrap();

    let bolt = BoltExecutor::with_runner(graph.clone(), cfg.uri.clone());
    let script = Script {
        name: "halt.cyphers".into(),
        path: PathBuf::from("halt.cyphers"),
        contents: b"CREATE (:YelpImportHaltCheck {step: 1});\n\
                    THIS IS NOT CYPHER;\n\
                    CREATE (:YelpImportHaltCheck {step: 3});\n"
            .to_vec(),
    };
    let status = bolt.execute(&script).await.unwrap();

    let first = count(&graph, "MATCH (n:YelpImportHaltCheck {step: 1}) RETURN count(n) AS n").await;
    let third = count(&graph, "MATCH (n:YelpImportHaltCheck {step: 3}) RETURN count(n) AS n").await;
    graph.run(neo4rs::query(cleanup)).await.unwrap();

    assert_eq!(status, ExitStatus::FAILURE);
    assert_eq!(first, 1);
    assert_eq!(third, 0);
}
