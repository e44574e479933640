//! Table configuration
//!
//! The configuration object arrives from an external schema loader as
//! JSON. This module gives it a typed shape and validates the field-name
//! mappings the engine depends on.
//!
//! The master data source is a sum type over its two variants rather than
//! a string tag: each variant carries only the fields it needs, and an
//! unknown variant fails at parse time instead of silently doing nothing.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default debounce quiescence window for reactive sources, in
/// logical milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_true() -> bool {
    true
}

/// HTTP method for transport requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET request; any payload travels as query parameters
    #[serde(rename = "GET")]
    Get,
    /// POST request with a body payload
    #[serde(rename = "POST")]
    Post,
}

/// Filter operator applied to raw source rows.
///
/// Only equality exists today; the enum leaves room for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    /// Field value must equal the configured value
    #[serde(rename = "EQUALS")]
    Equals,
}

/// Row filter applied before raw rows become master records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field to test
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Comparison value
    pub value: Value,
}

impl Filter {
    /// Whether a raw row passes this filter
    pub fn matches(&self, fields: &HashMap<String, Value>) -> bool {
        match self.op {
            FilterOp::Equals => fields.get(&self.field) == Some(&self.value),
        }
    }
}

/// Reactive master source: watches a named form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSource {
    /// Name of the observed field in the field store
    pub field_name: String,
    /// Optional filter applied to each emitted raw array
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Quiescence window collapsing a burst of edits into one recomputation
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Replay the field's current value synchronously on bind (at most
    /// once) so the first render is not deferred behind the debounce
    #[serde(default = "default_true")]
    pub replay_current: bool,
}

/// One-shot master source: a single remote query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSource {
    /// Endpoint to query
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Response field holding the array of master records
    pub records_field: String,
    /// Field inside each record naming the master key
    pub key_field: String,
}

/// Where master rows come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum MasterSource {
    /// Reactive variant: observe a form field
    Form(FormSource),
    /// One-shot variant: fetch once from a remote endpoint
    Api(ApiSource),
}

/// Detail fetch service configuration and response mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailService {
    /// Endpoint serving detail records
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Payload field carrying the batch of delta keys
    pub key_param: String,
    /// Response record field holding the detail payload object
    pub values_field: String,
    /// Field inside the payload naming the owning master key.
    ///
    /// Also used to project keys out of reactive source rows, so form
    /// rows and fetched details agree on identity.
    pub key_field: String,
    /// Optional field inside the payload holding an array of child rows
    /// (multi-row-per-master variant). Absent means the payload object
    /// itself is the single detail row.
    #[serde(default)]
    pub detail_rows_field: Option<String>,
}

/// Complete configuration for one master-detail table instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Master row source variant
    pub master_source: MasterSource,
    /// Detail fetch service
    pub detail_service: DetailService,
    /// Renderer hint: expand the single row when exactly one master exists
    #[serde(default)]
    pub expand_single_row: bool,
}

impl TableConfig {
    /// Parse a configuration from its JSON form.
    pub fn from_json(json: &str) -> Result<TableConfig> {
        let config: TableConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required mappings.
    ///
    /// Missing mappings are programmer errors in the externally loaded
    /// schema; they fail fast here rather than surfacing later as empty
    /// grids or unkeyed fetches.
    pub fn validate(&self) -> Result<()> {
        let service = &self.detail_service;
        require(&service.endpoint, "detail_service.endpoint")?;
        require(&service.key_param, "detail_service.key_param")?;
        require(&service.values_field, "detail_service.values_field")?;
        require(&service.key_field, "detail_service.key_field")?;
        if let Some(field) = &service.detail_rows_field {
            require(field, "detail_service.detail_rows_field")?;
        }

        match &self.master_source {
            MasterSource::Form(form) => {
                require(&form.field_name, "master_source.field_name")?;
                if let Some(filter) = &form.filter {
                    require(&filter.field, "master_source.filter.field")?;
                }
            }
            MasterSource::Api(api) => {
                require(&api.endpoint, "master_source.endpoint")?;
                require(&api.records_field, "master_source.records_field")?;
                require(&api.key_field, "master_source.key_field")?;
            }
        }
        Ok(())
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Config(format!("missing required mapping: {}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_service() -> DetailService {
        DetailService {
            endpoint: "/api/details".to_string(),
            method: HttpMethod::Post,
            key_param: "ACCT_NUMBERS".to_string(),
            values_field: "values".to_string(),
            key_field: "ACCT_NUMBER".to_string(),
            detail_rows_field: None,
        }
    }

    fn form_config() -> TableConfig {
        TableConfig {
            master_source: MasterSource::Form(FormSource {
                field_name: "accounts".to_string(),
                filter: None,
                debounce_ms: DEFAULT_DEBOUNCE_MS,
                replay_current: true,
            }),
            detail_service: detail_service(),
            expand_single_row: false,
        }
    }

    #[test]
    fn test_valid_form_config() {
        assert!(form_config().validate().is_ok());
    }

    #[test]
    fn test_missing_key_field_fails_fast() {
        let mut config = form_config();
        config.detail_service.key_field = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("detail_service.key_field"));
    }

    #[test]
    fn test_missing_form_field_name_fails_fast() {
        let mut config = form_config();
        config.master_source = MasterSource::Form(FormSource {
            field_name: String::new(),
            filter: None,
            debounce_ms: 300,
            replay_current: true,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_variant_requires_mappings() {
        let mut config = form_config();
        config.master_source = MasterSource::Api(ApiSource {
            endpoint: "/api/masters".to_string(),
            method: HttpMethod::Get,
            records_field: String::new(),
            key_field: "ACCT_NUMBER".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("records_field"));
    }

    #[test]
    fn test_from_json_form_variant() {
        let config = TableConfig::from_json(
            r#"{
                "master_source": {
                    "type": "FORM",
                    "field_name": "accounts",
                    "filter": {
                        "field": "STATUS",
                        "op": "EQUALS",
                        "value": { "String": "ACTIVE" }
                    }
                },
                "detail_service": {
                    "endpoint": "/api/details",
                    "method": "POST",
                    "key_param": "ACCT_NUMBERS",
                    "values_field": "values",
                    "key_field": "ACCT_NUMBER"
                }
            }"#,
        )
        .unwrap();

        match &config.master_source {
            MasterSource::Form(form) => {
                assert_eq!(form.field_name, "accounts");
                // Defaults apply when omitted
                assert_eq!(form.debounce_ms, DEFAULT_DEBOUNCE_MS);
                assert!(form.replay_current);
                assert!(form.filter.is_some());
            }
            other => panic!("expected FORM variant, got {:?}", other),
        }
        assert_eq!(config.detail_service.method, HttpMethod::Post);
        assert!(!config.expand_single_row);
    }

    #[test]
    fn test_from_json_unknown_variant_rejected() {
        let result = TableConfig::from_json(
            r#"{
                "master_source": { "type": "GRAPHQL" },
                "detail_service": {
                    "endpoint": "/api/details",
                    "method": "POST",
                    "key_param": "keys",
                    "values_field": "values",
                    "key_field": "id"
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_filter_matches() {
        let filter = Filter {
            field: "STATUS".to_string(),
            op: FilterOp::Equals,
            value: Value::String("ACTIVE".into()),
        };
        let mut row = HashMap::from([("STATUS".to_string(), Value::String("ACTIVE".into()))]);
        assert!(filter.matches(&row));

        row.insert("STATUS".to_string(), Value::String("CLOSED".into()));
        assert!(!filter.matches(&row));

        row.remove("STATUS");
        assert!(!filter.matches(&row));
    }
}
