//! Implements the `RemoteLedger` trait over HTTP using `reqwest`.

use crate::api::{ApiResponse, GroupFields, RemoteLedger, RemotePage};
use crate::model::{AttachmentRecord, DateRange, KindFilter};
use crate::{utils, Config, Result};
use anyhow::Context;
use tracing::trace;

/// The HTTP implementation of the remote ledger contract. Requests carry a pre-acquired
/// bearer token read from the secrets directory; token acquisition happens elsewhere.
pub(super) struct HttpLedger {
    base: String,
    token: String,
    client: reqwest::Client,
}

impl HttpLedger {
    pub(super) async fn new(config: &Config) -> Result<Self> {
        let token_path = config.token_path();
        let token = utils::read(&token_path)
            .await
            .context("Unable to read the API token")?
            .trim()
            .to_string();
        Ok(Self {
            base: config.server_url().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base)
    }

    /// Sends a form request and captures status plus body. A transport failure (no
    /// response obtained) surfaces as `Err`.
    async fn send_form(
        &self,
        request: reqwest::RequestBuilder,
        form: &[(String, String)],
    ) -> Result<ApiResponse> {
        let response = request
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await
            .context("No response from the ledger server")?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read the response body")?;
        trace!("ledger server answered {status}");
        Ok(ApiResponse { status, body })
    }
}

#[async_trait::async_trait]
impl RemoteLedger for HttpLedger {
    async fn create_group(&self, title: &str, fields: &GroupFields) -> Result<ApiResponse> {
        trace!("create_group '{title}' with {} legs", fields.leg_count());
        let mut form: Vec<(String, String)> =
            vec![("group_title".to_string(), title.to_string())];
        form.extend(fields.pairs().iter().cloned());
        self.send_form(self.client.post(self.endpoint("transactions")), &form)
            .await
    }

    async fn update_group(
        &self,
        group_id: i64,
        title: &str,
        fields: &GroupFields,
    ) -> Result<ApiResponse> {
        trace!("update_group {group_id}");
        let mut form: Vec<(String, String)> =
            vec![("group_title".to_string(), title.to_string())];
        form.extend(fields.pairs().iter().cloned());
        self.send_form(
            self.client
                .put(self.endpoint(&format!("transactions/{group_id}"))),
            &form,
        )
        .await
    }

    async fn delete_by_id(&self, journal_id: i64) -> Result<u16> {
        trace!("delete_by_id {journal_id}");
        let response = self
            .client
            .delete(self.endpoint(&format!("transactions/{journal_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("No response from the ledger server")?;
        Ok(response.status().as_u16())
    }

    async fn list_page(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        page: u32,
    ) -> Result<RemotePage> {
        trace!("list_page {page} for kind {kind}");
        let mut request = self
            .client
            .get(self.endpoint("transactions"))
            .bearer_auth(&self.token)
            .query(&[
                ("page", page.to_string()),
                ("type", kind.to_string()),
            ]);
        if let Some(range) = range {
            request = request.query(&[
                ("start", range.start.to_string()),
                ("end", range.end.to_string()),
            ]);
        }
        let response = request
            .send()
            .await
            .context("No response from the ledger server")?
            .error_for_status()
            .context("Listing request was refused")?;
        response
            .json::<RemotePage>()
            .await
            .context("Failed to parse the listing response")
    }

    async fn search_text(&self, query: &str) -> Result<RemotePage> {
        trace!("search_text '{query}'");
        let response = self
            .client
            .get(self.endpoint("search/transactions"))
            .bearer_auth(&self.token)
            .query(&[("query", query)])
            .send()
            .await
            .context("No response from the ledger server")?
            .error_for_status()
            .context("Search request was refused")?;
        response
            .json::<RemotePage>()
            .await
            .context("Failed to parse the search response")
    }

    async fn attachments_for_journal(&self, journal_id: i64) -> Result<Vec<AttachmentRecord>> {
        trace!("attachments_for_journal {journal_id}");
        let response = self
            .client
            .get(self.endpoint(&format!("transactions/{journal_id}/attachments")))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("No response from the ledger server")?
            .error_for_status()
            .context("Attachment listing was refused")?;
        response
            .json::<Vec<AttachmentRecord>>()
            .await
            .context("Failed to parse the attachment response")
    }
}
