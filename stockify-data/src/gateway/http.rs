use super::{MarketGateway, endpoint};
use crate::{
    config::GatewayConfig,
    error::DataError,
    history::{HistoryRequest, HistoryResponse, HistorySeries, PercentageDataRequest},
    model::{Expiry, InstrumentSelection},
    snapshot::{ExpiryListResponse, LiveDataResponse, LiveSnapshot},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

/// Query string shared by the `GET` endpoints: `?sid={symbol}&exp={expiry}`.
#[derive(Debug, Clone, Serialize)]
struct InstrumentQuery<'a> {
    sid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<Expiry>,
}

/// [`MarketGateway`] over JSON/REST using a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| DataError::Config(error.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn get(&self, path: &str, query: &InstrumentQuery<'_>) -> Result<RequestBuilder, DataError> {
        Ok(self.client.get(self.config.endpoint(path)?).query(query))
    }

    fn post<Body>(&self, path: &str, body: &Body) -> Result<RequestBuilder, DataError>
    where
        Body: Serialize + ?Sized,
    {
        Ok(self.client.post(self.config.endpoint(path)?).json(body))
    }

    /// Send a request and deserialise the JSON body.
    async fn send<Response>(&self, path: &str, request: RequestBuilder) -> Result<Response, DataError>
    where
        Response: DeserializeOwned,
    {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<Response>(&body).map_err(|error| {
            debug!(
                endpoint = path,
                %error,
                payload = %String::from_utf8_lossy(&body[..body.len().min(256)]),
                "failed to decode response"
            );
            DataError::from(error)
        })
    }
}

#[async_trait]
impl MarketGateway for HttpGateway {
    async fn live_data(&self, selection: &InstrumentSelection) -> Result<LiveSnapshot, DataError> {
        let query = InstrumentQuery {
            sid: selection.symbol.as_str(),
            exp: Some(selection.expiry),
        };
        debug!(%selection, "requesting live data");

        let request = self.get(endpoint::LIVE_DATA, &query)?;
        self.send::<LiveDataResponse>(endpoint::LIVE_DATA, request)
            .await
            .map(LiveSnapshot::from)
    }

    async fn expiries(
        &self,
        symbol: &str,
        expiry: Option<Expiry>,
    ) -> Result<Vec<Expiry>, DataError> {
        let query = InstrumentQuery { sid: symbol, exp: expiry };
        debug!(symbol, ?expiry, "requesting expiry list");

        let request = self.get(endpoint::EXPIRY_DATES, &query)?;
        self.send::<ExpiryListResponse>(endpoint::EXPIRY_DATES, request)
            .await
            .map(Vec::from)
    }

    async fn history(&self, request: &HistoryRequest) -> Result<HistorySeries, DataError> {
        let body = PercentageDataRequest::from(request);
        debug!(?request, "requesting strike history");

        let builder = self.post(endpoint::PERCENTAGE_DATA, &body)?;
        self.send::<HistoryResponse>(endpoint::PERCENTAGE_DATA, builder)
            .await
            .and_then(|response| response.into_series(request))
    }
}
