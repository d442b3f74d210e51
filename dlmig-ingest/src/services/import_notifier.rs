//! Digital library import trigger
//!
//! One authenticated POST per completed title asking the digital library to
//! import the title's metadata directory.

use crate::config::ImportEndpoint;
use crate::error::{IngestError, IngestResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Import process parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportMapping {
    import_directory: String,
    start_indexer: String,
    update_existing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ImportRequest {
    mapping: ImportMapping,
}

impl ImportRequest {
    fn for_title(import_prefix: &str, root_pack_id: &str) -> Self {
        Self {
            mapping: ImportMapping {
                import_directory: format!("{}/{}", import_prefix.trim_end_matches('/'), root_pack_id),
                start_indexer: "true".to_string(),
                update_existing: "false".to_string(),
            },
        }
    }
}

/// Import trigger client
pub struct ImportNotifier {
    http_client: reqwest::Client,
    endpoint: ImportEndpoint,
}

impl ImportNotifier {
    pub fn new(endpoint: ImportEndpoint) -> IngestResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build import client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    /// Ask the digital library to import `<prefix>/<root_pack_id>`
    ///
    /// Any 2xx or 3xx status is success; anything else (or a transport
    /// failure) is a [`IngestError::Notification`] carrying the body.
    pub async fn notify(&self, root_pack_id: &str) -> IngestResult<()> {
        let request = ImportRequest::for_title(&self.endpoint.import_prefix, root_pack_id);

        debug!(
            address = %self.endpoint.address,
            directory = %request.mapping.import_directory,
            "Triggering import"
        );

        let response = self
            .http_client
            .post(&self.endpoint.address)
            .basic_auth(&self.endpoint.credentials.user, Some(&self.endpoint.credentials.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| IngestError::Notification {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Notification {
                status: Some(status.as_u16()),
                body,
            });
        }

        info!(title = %root_pack_id, status = status.as_u16(), "Import triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = ImportRequest::for_title("/import/", "root-1");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "mapping": {
                    "importDirectory": "/import/root-1",
                    "startIndexer": "true",
                    "updateExisting": "false"
                }
            })
        );
    }
}
