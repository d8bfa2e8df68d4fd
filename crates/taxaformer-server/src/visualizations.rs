//! Read-side projections over a job's stored taxonomy strings. Pure
//! aggregations; the job cache is their only data source.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn json_error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

/// Counts by the second `;`-level of each taxonomy string, descending.
pub fn composition(taxonomies: &[String], rank: &str) -> serde_json::Value {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for taxonomy in taxonomies {
        let parts: Vec<&str> = taxonomy.split(';').collect();
        let name = if parts.len() > 1 {
            parts[1].trim()
        } else {
            "Unknown"
        };
        *counts.entry(name.to_string()).or_default() += 1;
    }

    let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    json!({
        "composition": rows
            .into_iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect::<Vec<_>>(),
        "total": taxonomies.len(),
        "rank": rank,
    })
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct HierarchyNode {
    pub count: u64,
    pub children: BTreeMap<String, HierarchyNode>,
}

/// Nested count tree over `;`-separated lineages, for sunburst/Krona plots.
pub fn hierarchy(taxonomies: &[String]) -> BTreeMap<String, HierarchyNode> {
    let mut root: BTreeMap<String, HierarchyNode> = BTreeMap::new();
    for taxonomy in taxonomies {
        let mut level = &mut root;
        for part in taxonomy.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let node = level.entry(part.to_string()).or_default();
            node.count += 1;
            level = &mut node.children;
        }
    }
    root
}

/// Adjacent-level flow edges with counts, for Sankey diagrams.
pub fn sankey(taxonomies: &[String]) -> serde_json::Value {
    let mut nodes: BTreeSet<String> = BTreeSet::new();
    let mut links: BTreeMap<(String, String), u64> = BTreeMap::new();

    for taxonomy in taxonomies {
        let parts: Vec<&str> = taxonomy
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        for pair in parts.windows(2) {
            nodes.insert(pair[0].to_string());
            nodes.insert(pair[1].to_string());
            *links
                .entry((pair[0].to_string(), pair[1].to_string()))
                .or_default() += 1;
        }
    }

    json!({
        "nodes": nodes
            .into_iter()
            .map(|name| json!({"name": name}))
            .collect::<Vec<_>>(),
        "links": links
            .into_iter()
            .map(|((source, target), value)| {
                json!({"source": source, "target": target, "value": value})
            })
            .collect::<Vec<_>>(),
    })
}

async fn taxonomies_for(state: &AppState, job_id: Uuid) -> Result<Vec<String>, Response> {
    let Some(store) = &state.store else {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "database not available",
        ));
    };
    store
        .sequence_taxonomies(job_id)
        .await
        .map_err(|e| json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CompositionQuery {
    rank: Option<String>,
}

/// `GET /visualizations/composition/{job_id}?rank=`
pub async fn get_composition(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<CompositionQuery>,
) -> Response {
    match taxonomies_for(&state, job_id).await {
        Ok(taxonomies) => {
            let rank = query.rank.as_deref().unwrap_or("phylum");
            Json(composition(&taxonomies, rank)).into_response()
        }
        Err(resp) => resp,
    }
}

/// `GET /visualizations/hierarchy/{job_id}`
pub async fn get_hierarchy(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match taxonomies_for(&state, job_id).await {
        Ok(taxonomies) => Json(json!({ "hierarchy": hierarchy(&taxonomies) })).into_response(),
        Err(resp) => resp,
    }
}

/// `GET /visualizations/sankey/{job_id}`
pub async fn get_sankey(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match taxonomies_for(&state, job_id).await {
        Ok(taxonomies) => Json(sankey(&taxonomies)).into_response(),
        Err(resp) => resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "Alveolata; Dinoflagellata; Gymnodiniales".to_string(),
            "Alveolata; Dinoflagellata; Suessiales".to_string(),
            "Chlorophyta; Chlorophyceae; Chlamydomonadales".to_string(),
            "Unknown".to_string(),
        ]
    }

    #[test]
    fn composition_counts_second_level_and_sorts_desc() {
        let out = composition(&corpus(), "phylum");
        assert_eq!(out["total"], 4);
        assert_eq!(out["rank"], "phylum");
        let rows = out["composition"].as_array().unwrap();
        assert_eq!(rows[0]["name"], "Dinoflagellata");
        assert_eq!(rows[0]["value"], 2);
        // Single-level lineages fall back to "Unknown".
        assert!(rows
            .iter()
            .any(|r| r["name"] == "Unknown" && r["value"] == 1));
    }

    #[test]
    fn composition_of_empty_corpus() {
        let out = composition(&[], "class");
        assert_eq!(out["total"], 0);
        assert_eq!(out["composition"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn hierarchy_accumulates_counts_per_level() {
        let tree = hierarchy(&corpus());
        let alveolata = &tree["Alveolata"];
        assert_eq!(alveolata.count, 2);
        assert_eq!(alveolata.children["Dinoflagellata"].count, 2);
        assert_eq!(
            alveolata.children["Dinoflagellata"].children["Gymnodiniales"].count,
            1
        );
        assert_eq!(tree["Unknown"].count, 1);
        assert!(tree["Unknown"].children.is_empty());
    }

    #[test]
    fn sankey_links_adjacent_levels_with_counts() {
        let out = sankey(&corpus());
        let links = out["links"].as_array().unwrap();
        let dino = links
            .iter()
            .find(|l| l["source"] == "Alveolata" && l["target"] == "Dinoflagellata")
            .unwrap();
        assert_eq!(dino["value"], 2);
        // Single-level lineages contribute no edges or nodes.
        let nodes = out["nodes"].as_array().unwrap();
        assert!(!nodes.iter().any(|n| n["name"] == "Unknown"));
    }
}
