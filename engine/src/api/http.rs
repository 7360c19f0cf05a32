//! `reqwest` implementation of the booking API.
//!
//! Every request carries the configured timeout. Read-only calls (catalog,
//! calendar, availability, booking status) get one extra immediate attempt
//! when the first times out; mutating calls are single-shot, since the flow
//! decides whether and when to retry those.

use super::{wire, BookingApi, CheckoutSession};
use crate::availability::AvailabilityQuery;
use crate::config::FlowConfig;
use crate::error::{ApiError, ErrorCode};
use crate::types::{Experience, ExperienceId, HoldId, Money, PricingSnapshot, Slot, VenueId};
use async_trait::async_trait;
use bookflow_runtime::retry::{retry_with_predicate, RetryPolicy};
use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client for the booking API.
#[derive(Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
    timeout_retry: RetryPolicy,
}

impl HttpBookingApi {
    /// Build a client from the flow configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the underlying TLS backend fails to
    /// initialize.
    pub fn new(config: &FlowConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            timeout_retry: RetryPolicy::builder()
                .max_retries(1)
                .initial_delay(Duration::ZERO)
                .build(),
        })
    }

    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%method, %url, "booking api request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()));
        }

        let code = match response.json::<wire::ErrorBody>().await {
            Ok(body) => ErrorCode::from_wire(&body.error),
            Err(_) if status == StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
            Err(_) if status.is_server_error() => ErrorCode::ServerError,
            Err(_) => ErrorCode::Unknown,
        };

        Err(ApiError::Server {
            status: status.as_u16(),
            code,
        })
    }

    /// GET with one extra immediate attempt on timeout.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        retry_with_predicate(
            self.timeout_retry.clone(),
            || self.request::<T, ()>(Method::GET, path, None),
            |e: &ApiError| matches!(e, ApiError::Timeout),
        )
        .await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        self.request(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn fetch_catalog(&self, venue: VenueId) -> Result<Vec<Experience>, ApiError> {
        self.get_json(&format!("venues/{venue}/catalog")).await
    }

    async fn fetch_calendar(
        &self,
        venue: VenueId,
        experience: ExperienceId,
        month: &str,
    ) -> Result<Vec<NaiveDate>, ApiError> {
        self.get_json(&format!(
            "venues/{venue}/experiences/{experience}/calendar?month={month}"
        ))
        .await
    }

    async fn fetch_availability(&self, query: &AvailabilityQuery) -> Result<Vec<Slot>, ApiError> {
        self.get_json(&format!(
            "availability?venue={}&experience={}&date={}&type={}&partySize={}",
            query.venue_id,
            query.experience_id,
            query.date,
            query.booking_kind.as_str(),
            query.party_size,
        ))
        .await
    }

    async fn create_hold(
        &self,
        request: &wire::CreateHoldRequest,
    ) -> Result<wire::CreateHoldResponse, ApiError> {
        self.post_json("holds", request).await
    }

    async fn release_hold(&self, hold_id: HoldId) -> Result<(), ApiError> {
        let url = format!("{}/holds/{hold_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Server {
                status: status.as_u16(),
                code: ErrorCode::Unknown,
            })
        }
    }

    async fn check_promo(&self, code: &str) -> Result<wire::PromoCheckResponse, ApiError> {
        self.post_json("promos/check", &serde_json::json!({ "code": code }))
            .await
    }

    async fn apply_promo(
        &self,
        hold_id: HoldId,
        code: &str,
    ) -> Result<PricingSnapshot, ApiError> {
        #[derive(serde::Deserialize)]
        struct ApplyPromoResponse {
            pricing: PricingSnapshot,
        }

        let response: ApplyPromoResponse = self
            .post_json(
                &format!("holds/{hold_id}/apply-promo"),
                &serde_json::json!({ "code": code }),
            )
            .await?;
        Ok(response.pricing)
    }

    async fn check_gift_card(&self, code: &str) -> Result<Money, ApiError> {
        #[derive(serde::Deserialize)]
        struct GiftCardCheckResponse {
            balance: Money,
        }

        let response: GiftCardCheckResponse = self
            .post_json("gift-cards/check", &serde_json::json!({ "code": code }))
            .await?;
        Ok(response.balance)
    }

    async fn redeem_gift_card(
        &self,
        request: &wire::RedeemGiftCardRequest,
    ) -> Result<wire::RedeemGiftCardResponse, ApiError> {
        self.post_json("gift-cards/redeem", request).await
    }

    async fn create_checkout(
        &self,
        request: &wire::CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ApiError> {
        self.post_json("checkout/create", request).await
    }

    async fn confirm_booking(
        &self,
        request: &wire::ConfirmBookingRequest,
    ) -> Result<wire::ConfirmBookingResponse, ApiError> {
        self.post_json("bookings/confirm", request).await
    }

    async fn booking_status(
        &self,
        hold_id: HoldId,
    ) -> Result<wire::BookingStatusResponse, ApiError> {
        self.get_json(&format!("bookings/{hold_id}")).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = FlowConfig {
            api_base_url: "https://api.example.com/v1/".to_owned(),
            ..FlowConfig::default()
        };
        let api = HttpBookingApi::new(&config).unwrap();
        assert_eq!(api.base_url, "https://api.example.com/v1");
    }
}
