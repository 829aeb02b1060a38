// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the ticket backend's chat webhooks.
//!
//! Provides [`HelpdeskClient`], which builds the webhook URLs, attaches the
//! bearer token and maps HTTP failures onto [`ParleyError`]. Requests are not
//! retried; callers decide what a failure means.

use std::time::Duration;

use parley_core::{
    IncomingAck, IncomingSubmission, ParleyError, TicketMessage, TicketPage, TicketQuery,
    TicketSummary,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Path prefix of every chat webhook.
const WEBHOOK_ROOT: [&str; 2] = ["webhooks", "chat"];

/// The messages endpoint answers either with a bare list or with `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesBody {
    List(Vec<TicketMessage>),
    Envelope { data: Vec<TicketMessage> },
}

impl MessagesBody {
    fn into_messages(self) -> Vec<TicketMessage> {
        match self {
            MessagesBody::List(messages) | MessagesBody::Envelope { data: messages } => messages,
        }
    }
}

/// HTTP client for the ticket backend.
#[derive(Debug, Clone)]
pub struct HelpdeskClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HelpdeskClient {
    /// Creates a client for `base_url`.
    ///
    /// `token`, when present, is sent as `Authorization: Bearer <token>` on
    /// every request. `timeout` bounds each request end to end.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, ParleyError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ParleyError::Config(format!("invalid backend base_url `{base_url}`: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ParleyError::Config(format!(
                "backend base_url `{base_url}` cannot carry a path"
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ParleyError::Config(format!("invalid backend token header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::backend_unreachable(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/webhooks/chat/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(WEBHOOK_ROOT).extend(segments);
        }
        url
    }

    /// `POST /webhooks/chat/incoming`.
    pub async fn submit_incoming(
        &self,
        submission: &IncomingSubmission,
    ) -> Result<IncomingAck, ParleyError> {
        let url = self.endpoint(&["incoming"]);
        let request = self.client.post(url).json(submission);
        let response = self.send(request, None).await?;
        read_json(response).await
    }

    /// `GET /webhooks/chat/tickets/{id}/messages?limit=N`.
    pub async fn ticket_messages(
        &self,
        ticket_id: &str,
        limit: u32,
    ) -> Result<Vec<TicketMessage>, ParleyError> {
        let mut url = self.endpoint(&["tickets", ticket_id, "messages"]);
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let response = self.send(self.client.get(url), Some(ticket_id)).await?;
        let body: MessagesBody = read_json(response).await?;
        Ok(body.into_messages())
    }

    /// `GET /webhooks/chat/user/{jid}/active-ticket`; 404 means no open ticket.
    pub async fn active_ticket(&self, jid: &str) -> Result<Option<TicketSummary>, ParleyError> {
        let url = self.endpoint(&["user", jid, "active-ticket"]);
        let response = self.execute(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, None).await?;
        read_json(response).await
    }

    /// `GET /webhooks/chat/tickets?status&channel_source&skip&limit`.
    pub async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, ParleyError> {
        let mut url = self.endpoint(&["tickets"]);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(status) = query.status {
                pairs.append_pair("status", &status.to_string());
            }
            if let Some(source) = query.channel_source.as_deref() {
                pairs.append_pair("channel_source", source);
            }
            pairs
                .append_pair("skip", &query.skip.to_string())
                .append_pair("limit", &query.limit.to_string());
        }
        let response = self.send(self.client.get(url), None).await?;
        read_json(response).await
    }

    /// Sends a request, mapping transport failures. Any status is returned.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ParleyError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ParleyError::Timeout {
                    duration: self.timeout,
                }
            } else {
                ParleyError::backend_unreachable(format!("HTTP request failed: {e}"), e)
            }
        })?;
        debug!(status = %response.status(), url = %response.url(), "backend response received");
        Ok(response)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        ticket_id: Option<&str>,
    ) -> Result<reqwest::Response, ParleyError> {
        let response = self.execute(request).await?;
        ensure_success(response, ticket_id).await
    }
}

/// Maps non-2xx statuses to errors.
///
/// With `ticket_id` set, a 404 becomes [`ParleyError::TicketNotFound`].
async fn ensure_success(
    response: reqwest::Response,
    ticket_id: Option<&str>,
) -> Result<reqwest::Response, ParleyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(ticket_id) = ticket_id {
            return Err(ParleyError::TicketNotFound {
                ticket_id: ticket_id.to_string(),
            });
        }
    }
    let body = response.text().await.unwrap_or_default();
    Err(ParleyError::Backend {
        status: Some(status.as_u16()),
        body,
        source: None,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ParleyError> {
    let body = response
        .text()
        .await
        .map_err(|e| ParleyError::backend_unreachable(format!("failed to read response body: {e}"), e))?;
    serde_json::from_str(&body).map_err(|e| {
        ParleyError::backend_unreachable(format!("failed to parse backend response: {e}"), e)
    })
}
