use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use symptomgraph_api::{create_router, AppState};
use symptomgraph_cache::EntityCache;
use symptomgraph_core::{
    Concept, Entity, EntityKind, Relation, RelationKind, Result, RootConcept, SemanticType,
    SymptomGraphError,
};
use symptomgraph_pipeline::SymptomPipeline;
use symptomgraph_umls::OntologySource;

struct OneSymptom;

#[async_trait]
impl OntologySource for OneSymptom {
    async fn search_root_concept(&self, name: &str) -> Result<RootConcept> {
        if name != "Diabetes Mellitus" {
            return Err(SymptomGraphError::RootNotFound(name.to_string()));
        }
        Ok(RootConcept {
            id: "C0011849".into(),
            name: name.to_string(),
            root_source: "ICD10".into(),
            uri: String::new(),
        })
    }

    async fn list_relations(&self, _concept_id: &str) -> Result<Vec<Relation>> {
        Ok(vec![Relation {
            id: "R1".into(),
            kind: RelationKind::ConceptRelation,
            related_id: "https://uts/CUI/C0032617".into(),
            ..Default::default()
        }])
    }

    async fn fetch_entity(&self, _locator: &str, _kind: EntityKind) -> Result<Entity> {
        Ok(Entity::Concept(Concept {
            id: "C0032617".into(),
            name: "Polyuria".into(),
            semantic_types: vec![SemanticType {
                name: "Sign or Symptom".into(),
                uri: String::new(),
            }],
            ..Default::default()
        }))
    }
}

async fn spawn_app() -> SocketAddr {
    let pipeline = SymptomPipeline::new(Arc::new(OneSymptom), EntityCache::disabled());
    let app = create_router(AppState::new(pipeline));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_health() {
    let addr = spawn_app().await;
    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_disease_returns_symptom_list() {
    let addr = spawn_app().await;
    let response = reqwest::get(format!("http://{}/disease/Diabetes%20Mellitus", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let symptoms = body.as_array().unwrap();
    assert_eq!(symptoms.len(), 1);
    assert_eq!(symptoms[0]["ui"], "C0032617");
    assert_eq!(symptoms[0]["semanticTypes"][0]["name"], "Sign or Symptom");
    assert_eq!(symptoms[0]["discoveredBy"]["kind"], "relation");
}

#[tokio::test]
async fn test_unknown_disease_is_not_found() {
    let addr = spawn_app().await;
    let response = reqwest::get(format!("http://{}/disease/Nothing", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 404);
}
