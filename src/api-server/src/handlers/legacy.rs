//! Substitution plan in the format of the old mobile app
//!
//! Clients authenticate with the `SEC` and `PW` hashes baked into the app;
//! every failure is reported in-band as `{"ERROR": ...}` with status 200.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::config::LegacyConfig;
use crate::discovery::{respond, EndpointDescriptor, Handler, HandlerResult, RestHandler};
use crate::params::{ArgumentLocation, Parameters};

pub const ERROR_NO_ANZ: &str = "NO_ANS (inofficial error code)";
pub const ERROR_WRONG_SECURE_HASH: &str = "WRONG_SECUREHASH";
pub const ERROR_WRONG_PASSWORD: &str = "WRONG_PASSWORD";

const UPDATE_FORMAT: &str = "%Y-%m-%d %-H:%-M:%-S";

#[derive(Debug, Clone, Serialize)]
pub struct LegacyLesson {
    #[serde(rename = "Stunde")]
    pub hour: String,
    #[serde(rename = "Massnahme")]
    pub measure: String,
    #[serde(rename = "Verantwortlicher")]
    pub responsible: String,
    #[serde(rename = "Klasse")]
    pub class: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyDay {
    #[serde(rename = "Header")]
    pub header: String,
    #[serde(rename = "Footer")]
    pub footer: String,
    #[serde(rename = "Block")]
    pub block: String,
    #[serde(rename = "Update")]
    pub update: String,
    #[serde(rename = "Inhalt")]
    pub lessons: Vec<LegacyLesson>,
}

impl LegacyDay {
    pub fn new(
        header: impl Into<String>,
        footer: impl Into<String>,
        block: impl Into<String>,
        updated_at: DateTime<Local>,
    ) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
            block: block.into(),
            update: updated_at.format(UPDATE_FORMAT).to_string(),
            lessons: Vec::new(),
        }
    }
}

/// Days keyed by their `dd.MM.` date
pub type LegacyPlan = BTreeMap<String, LegacyDay>;

/// `GET {prefix}/legacy/vertretungsplan`
#[derive(Debug, Clone)]
pub struct LegacyVertretungsplanEndpoint {
    secure_hash: Option<String>,
    password_hash: Option<String>,
}

impl LegacyVertretungsplanEndpoint {
    pub fn new(config: &LegacyConfig) -> Self {
        Self {
            secure_hash: config.secure_hash.clone(),
            password_hash: config.password_hash.clone(),
        }
    }

    pub fn descriptor(config: &LegacyConfig) -> EndpointDescriptor {
        EndpointDescriptor::rest(config.path.clone())
    }

    fn plan() -> LegacyPlan {
        let mut day = LegacyDay::new(
            "Legacy Vertretungsplan - It works!",
            "Reverse engineered with ♥ by morihofi",
            "unbekannt",
            Local::now(),
        );
        day.lessons.push(LegacyLesson {
            hour: "Ganzer Tag".to_string(),
            measure: "Ganztägiger Stundenausfall, keine Vertretung".to_string(),
            responsible: "INFO für ALLE".to_string(),
            class: "ALLE".to_string(),
        });

        let mut plan = LegacyPlan::new();
        plan.insert("01.01.".to_string(), day);
        plan
    }
}

/// An unconfigured hash never matches
fn hash_matches(expected: Option<&str>, given: Option<&str>) -> bool {
    matches!((expected, given), (Some(expected), Some(given)) if expected == given)
}

impl Handler for LegacyVertretungsplanEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for LegacyVertretungsplanEndpoint {
    async fn handle(&self, params: &Parameters) -> HandlerResult {
        let anz: Option<String> = params.get_argument("ANZ", ArgumentLocation::Query)?;
        let sec: Option<String> = params.get_argument("SEC", ArgumentLocation::Query)?;
        let pw: Option<String> = params.get_argument("PW", ArgumentLocation::Query)?;

        let error = if anz.is_none() {
            Some(ERROR_NO_ANZ)
        } else if !hash_matches(self.secure_hash.as_deref(), sec.as_deref()) {
            Some(ERROR_WRONG_SECURE_HASH)
        } else if !hash_matches(self.password_hash.as_deref(), pw.as_deref()) {
            Some(ERROR_WRONG_PASSWORD)
        } else {
            None
        };

        match error {
            Some(error) => {
                warn!(error, remote_ip = ?params.remote_ip(), "Rejected legacy plan request");
                respond(json!({ "ERROR": error }))
            }
            None => respond(Self::plan()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use rstest::rstest;
    use std::collections::HashMap;

    fn endpoint() -> LegacyVertretungsplanEndpoint {
        LegacyVertretungsplanEndpoint::new(&LegacyConfig {
            secure_hash: Some("s3c".to_string()),
            password_hash: Some("pw".to_string()),
            ..LegacyConfig::default()
        })
    }

    fn params(query: &str) -> Parameters {
        let (parts, ()) = axum::http::Request::builder()
            .uri(format!("/api/legacy/vertretungsplan?{query}"))
            .body(())
            .unwrap()
            .into_parts();
        Parameters::rest(&parts, HashMap::new(), Bytes::new())
    }

    #[rstest]
    #[case("SEC=s3c&PW=pw", ERROR_NO_ANZ)]
    #[case("ANZ=1&SEC=nope&PW=pw", ERROR_WRONG_SECURE_HASH)]
    #[case("ANZ=1&PW=pw", ERROR_WRONG_SECURE_HASH)]
    #[case("ANZ=1&SEC=s3c&PW=nope", ERROR_WRONG_PASSWORD)]
    #[tokio::test]
    async fn test_rejections(#[case] query: &str, #[case] expected: &str) {
        let result = endpoint().handle(&params(query)).await.unwrap();
        assert_eq!(result, Some(json!({ "ERROR": expected })));
    }

    #[tokio::test]
    async fn test_unconfigured_hash_rejects() {
        let endpoint = LegacyVertretungsplanEndpoint::new(&LegacyConfig::default());
        let result = endpoint.handle(&params("ANZ=1&SEC=&PW=")).await.unwrap();
        assert_eq!(result, Some(json!({ "ERROR": ERROR_WRONG_SECURE_HASH })));
    }

    #[tokio::test]
    async fn test_plan_format() {
        let result = endpoint()
            .handle(&params("ANZ=1&SEC=s3c&PW=pw"))
            .await
            .unwrap()
            .unwrap();

        let day = &result["01.01."];
        assert_eq!(day["Header"], json!("Legacy Vertretungsplan - It works!"));
        assert_eq!(day["Block"], json!("unbekannt"));
        assert_eq!(day["Inhalt"][0]["Klasse"], json!("ALLE"));
        assert_eq!(day["Inhalt"][0]["Stunde"], json!("Ganzer Tag"));

        let update = day["Update"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(update, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
