use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use symptomgraph_core::{
    Entity, EntityKind, Relation, Result, RootConcept, SymptomGraphError, UmlsSettings,
};
use tracing::{debug, warn};
use url::Url;

use crate::source::OntologySource;

/// Identifier the search endpoint returns in place of an empty result list.
const NO_RESULTS_UI: &str = "NONE";

/// Paging envelope wrapped around every UMLS payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(default)]
    page_size: u32,
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    page_count: u32,
    result: T,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<RootConcept>,
}

/// UMLS REST client. The API key is appended to every outgoing request.
#[derive(Clone)]
pub struct UmlsClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    search_vocabulary: String,
    relations_page_size: u32,
}

impl UmlsClient {
    pub fn new(settings: &UmlsSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                SymptomGraphError::Configuration(
                    "UMLS API key is required. Set UMLS_KEY environment variable.".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("SymptomGraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SymptomGraphError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            search_vocabulary: settings.search_vocabulary.clone(),
            relations_page_size: settings.relations_page_size,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw)
            .map_err(|e| SymptomGraphError::Configuration(format!("invalid url {}: {}", raw, e)))
    }

    /// Parses a locator handed out by the service and signs it with the API key.
    fn authorize(&self, locator: &str) -> Result<Url> {
        let mut url = Url::parse(locator)
            .map_err(|e| SymptomGraphError::Remote(format!("invalid locator {}: {}", locator, e)))?;
        url.query_pairs_mut()
            .append_pair("apiKey", self.api_key.expose_secret());
        Ok(url)
    }

    async fn get_envelope<T: DeserializeOwned>(&self, url: Url) -> Result<Envelope<T>> {
        // keep the key out of logs and errors
        let target = url.path().to_string();
        debug!("GET {}", target);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SymptomGraphError::Remote(format!("request to {} timed out", target))
            } else {
                SymptomGraphError::Remote(format!("request to {} failed: {}", target, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SymptomGraphError::Remote(format!(
                "{} returned {}: {}",
                target, status, body
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            SymptomGraphError::Remote(format!("reading body from {} failed: {}", target, e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SymptomGraphError::Decode(format!("unexpected payload from {}: {}", target, e))
        })
    }
}

#[async_trait]
impl OntologySource for UmlsClient {
    async fn search_root_concept(&self, name: &str) -> Result<RootConcept> {
        let mut url = self.endpoint("/search/current")?;
        url.query_pairs_mut()
            .append_pair("string", name)
            .append_pair("sabs", &self.search_vocabulary)
            .append_pair("apiKey", self.api_key.expose_secret());

        let envelope: Envelope<SearchResults> = self
            .get_envelope(url)
            .await
            .map_err(|e| SymptomGraphError::RootNotFound(format!("{}: {}", name, e)))?;

        envelope
            .result
            .results
            .into_iter()
            .next()
            .filter(|root| root.id != NO_RESULTS_UI && !root.id.is_empty())
            .ok_or_else(|| SymptomGraphError::RootNotFound(name.to_string()))
    }

    async fn list_relations(&self, concept_id: &str) -> Result<Vec<Relation>> {
        let mut url = self.endpoint(&format!("/content/current/CUI/{}/relations", concept_id))?;
        url.query_pairs_mut()
            .append_pair("pageSize", &self.relations_page_size.to_string())
            .append_pair("apiKey", self.api_key.expose_secret());

        let envelope: Envelope<Vec<Relation>> = self.get_envelope(url).await?;
        if envelope.page_count > 1 {
            warn!(
                "relations of {} span {} pages of {}; only page {} is traversed",
                concept_id,
                envelope.page_count,
                envelope.page_size,
                envelope.page_number.max(1)
            );
        }
        Ok(envelope.result)
    }

    async fn fetch_entity(&self, locator: &str, kind: EntityKind) -> Result<Entity> {
        let url = self.authorize(locator)?;
        let envelope: Envelope<serde_json::Value> = self.get_envelope(url).await?;
        Entity::from_value(kind, envelope.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: Option<&str>) -> UmlsSettings {
        UmlsSettings {
            api_key: key.map(|k| SecretString::from(k.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn requires_api_key() {
        assert!(matches!(
            UmlsClient::new(&settings(None)),
            Err(SymptomGraphError::Configuration(_))
        ));
        assert!(matches!(
            UmlsClient::new(&settings(Some("  "))),
            Err(SymptomGraphError::Configuration(_))
        ));
    }

    #[test]
    fn authorize_keeps_existing_query() {
        let client = UmlsClient::new(&settings(Some("k3y"))).unwrap();
        let url = client
            .authorize("https://uts-ws.nlm.nih.gov/rest/content/2024AA/AUI/A1?sabs=ICD10")
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("sabs".to_string(), "ICD10".to_string()),
                ("apiKey".to_string(), "k3y".to_string())
            ]
        );
    }

    #[test]
    fn malformed_locator_is_a_remote_error() {
        let client = UmlsClient::new(&settings(Some("k3y"))).unwrap();
        assert!(matches!(
            client.authorize("not a url"),
            Err(SymptomGraphError::Remote(_))
        ));
    }
}
