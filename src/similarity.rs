//! Links similar listings in the graph with `Is_Similar {score}` edges.
//!
//! Zillow `Property` nodes are compared with each other and with Airbnb
//! `Rental` nodes; rentals are compared with each other. Every pair scoring at
//! or above the threshold for its kind gets an edge in each direction, since
//! Neo4j relationships are always directed.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::{stream::FuturesUnordered, StreamExt};
use neo4rs::{query, Graph, Row};
use tokio::sync::Semaphore;
use tracing::info;

use crate::error::{ImportError, Result};

pub const PROPERTY_THRESHOLD: f64 = 0.7;
pub const RENTAL_THRESHOLD: f64 = 0.98;
pub const PROPERTY_RENTAL_THRESHOLD: f64 = 0.95;

const CLEAR_QUERY: &str = "MATCH ()-[r:Is_Similar]-() DELETE r";

const PROPERTY_QUERY: &str = "\
MATCH (p:Property)
RETURN elementId(p) AS node, toFloat(p.price) AS price, toString(p.street) AS street,
       toFloat(p.size) AS size, toFloat(p.bed) AS bed, toFloat(p.bath) AS bath,
       p.neighborhood AS neighborhood";

const RENTAL_QUERY: &str = "\
MATCH (r:Rental)-[:Located_In]->(c:City)
OPTIONAL MATCH (r)-[:Located_In]->(n:Neighborhood)
RETURN elementId(r) AS node, toFloat(r.bed) AS bed, toFloat(r.bath) AS bath,
       toString(r.type_id) AS type_id,
       [x IN coalesce(r.amenity_ids, []) | toString(x)] AS amenity_ids,
       [x IN coalesce(r.amenity_names, []) | toString(x)] AS amenity_names,
       c.name AS city, collect(n.name) AS neighborhood";

const LINK_QUERY: &str = "\
MATCH (a) WHERE elementId(a) = $a
MATCH (b) WHERE elementId(b) = $b
CREATE (a)-[:Is_Similar {score: $score}]->(b), (b)-[:Is_Similar {score: $score}]->(a)";

/// A listing that can be linked; `node` is its element id.
pub trait Listing {
    fn node(&self) -> &str;
}

/// A Zillow `Property` node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZillowProperty {
    pub node: String,
    pub price: Option<f64>,
    /// Street name with house numbers removed.
    pub street: String,
    pub size: Option<f64>,
    pub bed: Option<f64>,
    pub bath: Option<f64>,
    pub neighborhoods: BTreeSet<String>,
}

/// An Airbnb `Rental` node with its city and neighbourhoods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirbnbRental {
    pub node: String,
    pub bed: Option<f64>,
    pub bath: Option<f64>,
    pub type_id: Option<String>,
    pub amenity_ids: BTreeSet<String>,
    pub amenity_names: BTreeSet<String>,
    pub city: Option<String>,
    pub neighborhoods: BTreeSet<String>,
}

impl Listing for ZillowProperty {
    fn node(&self) -> &str {
        &self.node
    }
}

impl Listing for AirbnbRental {
    fn node(&self) -> &str {
        &self.node
    }
}

/// Similarity of two numbers in `[0, 1]`: 1 when equal, falling linearly to 0
/// once their difference reaches `ratio` of their mean. Symmetric.
pub fn num_sim(base: f64, comp: f64, ratio: f64) -> f64 {
    let mean = (base + comp) / 2.0;
    if mean == 0.0 {
        return if base == comp { 1.0 } else { 0.0 };
    }
    let diff = ((base - comp).abs() / mean.abs()).min(ratio);
    (ratio - diff) / ratio
}

/// Set cosine: `|a ∩ b| / sqrt(|a| * |b|)`. Equal sets (including two empty
/// ones) score 1.
pub fn cosine_sim(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count() as f64;
    common / ((a.len() * b.len()) as f64).sqrt()
}

/// Both values present and non-zero.
fn both(a: Option<f64>, b: Option<f64>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some(x), Some(y)) if x != 0.0 && y != 0.0 => Some((x, y)),
        _ => None,
    }
}

/// Price carries half the weight; street, beds, baths and size the rest.
pub fn property_score(a: &ZillowProperty, b: &ZillowProperty) -> f64 {
    let mut score = 0.0;
    if let Some((x, y)) = both(a.price, b.price) {
        score += 0.5 * num_sim(x, y, 0.3);
    }
    if a.street == b.street {
        score += 0.2;
    }
    if let Some((x, y)) = both(a.bed, b.bed) {
        score += 0.1 * num_sim(x, y, 0.5);
    }
    if let Some((x, y)) = both(a.bath, b.bath) {
        score += 0.1 * num_sim(x, y, 0.5);
    }
    if let Some((x, y)) = both(a.size, b.size) {
        score += 0.1 * num_sim(x, y, 0.3);
    }
    score
}

pub fn rental_score(a: &AirbnbRental, b: &AirbnbRental) -> f64 {
    let mut score = 0.0;
    if let Some((x, y)) = both(a.bed, b.bed) {
        score += 0.25 * num_sim(x, y, 0.5);
    }
    if let Some((x, y)) = both(a.bath, b.bath) {
        score += 0.25 * num_sim(x, y, 0.5);
    }
    if !a.neighborhoods.is_empty() && !b.neighborhoods.is_empty() {
        score += 0.3 * cosine_sim(&a.neighborhoods, &b.neighborhoods);
    } else if a.city == b.city {
        score += 0.3;
    }
    if a.type_id == b.type_id {
        score += 0.1;
    }
    score += 0.05 * cosine_sim(&a.amenity_ids, &b.amenity_ids);
    score += 0.05 * cosine_sim(&a.amenity_names, &b.amenity_names);
    score
}

/// Beds, baths and neighbourhood overlap, a third each.
pub fn property_rental_score(p: &ZillowProperty, r: &AirbnbRental) -> f64 {
    let mut score = 0.0;
    if let Some((x, y)) = both(p.bed, r.bed) {
        score += num_sim(x, y, 0.5) / 3.0;
    }
    if let Some((x, y)) = both(p.bath, r.bath) {
        score += num_sim(x, y, 0.5) / 3.0;
    }
    score += cosine_sim(&p.neighborhoods, &r.neighborhoods) / 3.0;
    score
}

/// A pair of nodes to join with `Is_Similar` edges.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarLink {
    pub a: String,
    pub b: String,
    pub score: f64,
}

/// Score every unordered pair within `items`.
pub fn links_within<T, F>(items: &[T], score: F, threshold: f64) -> Vec<SimilarLink>
where
    T: Listing,
    F: Fn(&T, &T) -> f64,
{
    let mut links = Vec::new();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            let s = score(a, b);
            if s >= threshold {
                links.push(SimilarLink {
                    a: a.node().to_owned(),
                    b: b.node().to_owned(),
                    score: s,
                });
            }
        }
    }
    links
}

/// Score every pair from `left` x `right`.
pub fn links_across<T, U, F>(left: &[T], right: &[U], score: F, threshold: f64) -> Vec<SimilarLink>
where
    T: Listing,
    U: Listing,
    F: Fn(&T, &U) -> f64,
{
    let mut links = Vec::new();
    for a in left {
        for b in right {
            let s = score(a, b);
            if s >= threshold {
                links.push(SimilarLink {
                    a: a.node().to_owned(),
                    b: b.node().to_owned(),
                    score: s,
                });
            }
        }
    }
    links
}

/// Group links so that no node appears twice within a group. Groups are
/// written one after another; links inside a group can be written
/// concurrently without contending for the same node locks.
pub fn conflict_free_batches(links: Vec<SimilarLink>) -> Vec<Vec<SimilarLink>> {
    #[derive(Default)]
    struct ColorBatch {
        links: Vec<SimilarLink>,
        used: HashSet<String>,
    }

    let mut batches: Vec<ColorBatch> = Vec::new();
    for link in links {
        let slot = batches
            .iter()
            .position(|batch| !batch.used.contains(&link.a) && !batch.used.contains(&link.b));
        let idx = match slot {
            Some(idx) => idx,
            None => {
                batches.push(ColorBatch::default());
                batches.len() - 1
            }
        };
        let batch = &mut batches[idx];
        batch.used.insert(link.a.clone());
        batch.used.insert(link.b.clone());
        batch.links.push(link);
    }
    batches.into_iter().map(|batch| batch.links).collect()
}

/// Strip digits from a street, e.g. `13683 Essence Rd` -> ` Essence Rd`.
pub fn strip_digits(street: &str) -> String {
    street.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Parse a stringified list such as `"['Clairemont', 'Bay Park']"`.
pub fn parse_list_literal(text: &str) -> BTreeSet<String> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').to_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

fn decode<E: std::fmt::Display>(column: &'static str) -> impl FnOnce(E) -> ImportError {
    move |e| ImportError::Decode {
        column,
        message: e.to_string(),
    }
}

fn property_from_row(row: &Row) -> Result<ZillowProperty> {
    // Older loads stored neighbourhoods as a stringified list.
    let neighborhoods = match row.get::<Vec<String>>("neighborhood") {
        Ok(list) => list.into_iter().collect(),
        Err(_) => row
            .get::<Option<String>>("neighborhood")
            .map_err(decode("neighborhood"))?
            .map(|text| parse_list_literal(&text))
            .unwrap_or_default(),
    };
    Ok(ZillowProperty {
        node: row.get("node").map_err(decode("node"))?,
        price: row.get("price").map_err(decode("price"))?,
        street: strip_digits(
            &row.get::<Option<String>>("street")
                .map_err(decode("street"))?
                .unwrap_or_default(),
        ),
        size: row.get("size").map_err(decode("size"))?,
        bed: row.get("bed").map_err(decode("bed"))?,
        bath: row.get("bath").map_err(decode("bath"))?,
        neighborhoods,
    })
}

fn rental_from_row(row: &Row) -> Result<AirbnbRental> {
    let set = |column: &'static str| -> Result<BTreeSet<String>> {
        Ok(row
            .get::<Vec<String>>(column)
            .map_err(decode(column))?
            .into_iter()
            .collect())
    };
    Ok(AirbnbRental {
        node: row.get("node").map_err(decode("node"))?,
        bed: row.get("bed").map_err(decode("bed"))?,
        bath: row.get("bath").map_err(decode("bath"))?,
        type_id: row.get("type_id").map_err(decode("type_id"))?,
        amenity_ids: set("amenity_ids")?,
        amenity_names: set("amenity_names")?,
        city: row.get("city").map_err(decode("city"))?,
        neighborhoods: set("neighborhood")?,
    })
}

pub async fn fetch_properties(graph: &Graph) -> Result<Vec<ZillowProperty>> {
    let mut result = graph.execute(query(PROPERTY_QUERY)).await?;
    let mut out = Vec::new();
    while let Some(row) = result.next().await? {
        out.push(property_from_row(&row)?);
    }
    Ok(out)
}

pub async fn fetch_rentals(graph: &Graph) -> Result<Vec<AirbnbRental>> {
    let mut result = graph.execute(query(RENTAL_QUERY)).await?;
    let mut out = Vec::new();
    while let Some(row) = result.next().await? {
        out.push(rental_from_row(&row)?);
    }
    Ok(out)
}

/// Write each link as a pair of `Is_Similar` edges. Returns the number of
/// edges created.
pub async fn write_links(graph: Graph, links: Vec<SimilarLink>, concurrency: usize) -> Result<usize> {
    let mut written = 0;
    for batch in conflict_free_batches(links) {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = FuturesUnordered::new();

        for link in batch {
            let graph = graph.clone();
            let permit = semaphore.clone().acquire_owned().await?;
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let q = query(LINK_QUERY)
                    .param("a", link.a)
                    .param("b", link.b)
                    .param("score", link.score);
                graph.run(q).await
            }));
        }

        while let Some(res) = tasks.next().await {
            res??;
            written += 2;
        }
    }
    Ok(written)
}

/// Edge counts from one [`link_similar`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimilarityReport {
    pub properties: usize,
    pub rentals: usize,
    pub property_edges: usize,
    pub rental_edges: usize,
    pub property_rental_edges: usize,
}

fn log_pass(relation: &str, edges: usize, pairs: usize) {
    let pct = if pairs == 0 {
        0.0
    } else {
        edges as f64 / pairs as f64 * 100.0
    };
    info!("{edges} new {relation} edges (pairs={pairs}, {pct:.2}%)");
}

/// Replace all `Is_Similar` edges: clear them, then score and link
/// property/property, rental/rental and property/rental pairs.
pub async fn link_similar(graph: Graph, concurrency: usize) -> Result<SimilarityReport> {
    graph.run(query(CLEAR_QUERY)).await?;

    info!("fetching zillow properties");
    let properties = fetch_properties(&graph).await?;
    let links = links_within(&properties, property_score, PROPERTY_THRESHOLD);
    let property_edges = write_links(graph.clone(), links, concurrency).await?;
    let n = properties.len();
    log_pass("zillow <--> zillow", property_edges, n * n.saturating_sub(1) / 2);

    info!("fetching airbnb rentals");
    let rentals = fetch_rentals(&graph).await?;
    let links = links_within(&rentals, rental_score, RENTAL_THRESHOLD);
    let rental_edges = write_links(graph.clone(), links, concurrency).await?;
    let m = rentals.len();
    log_pass("airbnb <--> airbnb", rental_edges, m * m.saturating_sub(1) / 2);

    let links = links_across(
        &properties,
        &rentals,
        property_rental_score,
        PROPERTY_RENTAL_THRESHOLD,
    );
    let property_rental_edges = write_links(graph, links, concurrency).await?;
    log_pass("zillow <--> airbnb", property_rental_edges, n * m);

    Ok(SimilarityReport {
        properties: n,
        rentals: m,
        property_edges,
        rental_edges,
        property_rental_edges,
    })
}
