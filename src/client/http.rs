//! reqwest-backed client for the orders REST API.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{ClientError, OrderAction, OrderApi, OrderPage, StatusFilter};
use crate::models::order::OrderId;

pub struct HttpOrderApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpOrderApi {
    /// `base_url` should be like `http://localhost:8080/api`; a trailing slash is dropped.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/driver/orders", self.base_url)
    }

    fn action_url(&self, id: OrderId, action: OrderAction) -> String {
        format!("{}/{}/{}", self.orders_url(), id, action.path_segment())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Server {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn list_orders(&self, filter: &StatusFilter, size: u32) -> Result<OrderPage, ClientError> {
        let url = self.orders_url();
        let expression = filter.expression();

        debug!(url = %url, filter = %expression, size, "listing driver orders");
        let request = self
            .client
            .get(&url)
            .query(&[("filter", expression), ("size", size.to_string())]);
        let resp = ensure_success(self.authorize(request).send().await?).await?;

        let page: OrderPage = resp.json().await?;
        debug!(count = page.data.len(), "listed driver orders");
        Ok(page)
    }

    async fn perform(&self, id: OrderId, action: OrderAction) -> Result<(), ClientError> {
        let url = self.action_url(id, action);

        debug!(url = %url, order_id = id, ?action, "sending order action");
        let request = self.client.post(&url);
        ensure_success(self.authorize(request).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HttpOrderApi;
    use crate::client::OrderAction;

    #[test]
    fn trims_trailing_slash() {
        let api = HttpOrderApi::new("http://localhost:8080/api/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url, "http://localhost:8080/api");
        assert_eq!(api.orders_url(), "http://localhost:8080/api/driver/orders");
    }

    #[test]
    fn action_urls() {
        let api = HttpOrderApi::new("http://api", None, Duration::from_secs(1)).unwrap();
        assert_eq!(api.action_url(9, OrderAction::Accept), "http://api/driver/orders/9/accept");
        assert_eq!(
            api.action_url(9, OrderAction::MarkPickedUp),
            "http://api/driver/orders/9/picked-up"
        );
    }
}
