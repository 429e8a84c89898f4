use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    CreateCheckoutSessionPaymentIntentData, CreateCheckoutSessionPaymentIntentDataTransferData,
    CreateCheckoutSessionSubscriptionData, CreateCheckoutSessionSubscriptionDataTransferData,
    Currency,
};
use tracing::error;
use ts_rs::TS;
use uuid::Uuid;

use crate::churches::{Church, DonationFrequency};
use crate::churches_repo::ChurchesRepository;
use crate::donations::{DonationKind, NewDonation};
use crate::donations_repo::DonationsRepository;
use crate::donors::NewDonor;
use crate::donors_repo::DonorsRepository;
use crate::web::AppState;

use super::{DataResponse, json_error, require_stripe};

/// Frontend bootstrap configuration
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigView {
    pub publishable_key: String,
}

/// Request body for a one-time donation
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct DonatePaymentRequest {
    pub church_id: Uuid,
    pub amount_cents: i32,
    pub email: String,
    pub name: Option<String>,
}

/// Request body for a recurring donation
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct DonateSubscriptionRequest {
    pub church_id: Uuid,
    pub amount_cents: i32,
    pub interval: String,
    pub email: String,
    pub name: Option<String>,
}

/// Response for checkout session creation
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// GET /payment/config
/// Publishable key for the donation frontend
pub async fn get_payment_config(State(state): State<AppState>) -> impl IntoResponse {
    match &state.stripe_config {
        Some(config) => Json(DataResponse {
            data: PaymentConfigView {
                publishable_key: config.public_key.clone(),
            },
        })
        .into_response(),
        None => json_error(StatusCode::SERVICE_UNAVAILABLE, "Stripe is not configured")
            .into_response(),
    }
}

/// Look up a church and require a charge-ready connected account.
async fn connected_church(
    state: &AppState,
    church_id: Uuid,
) -> Result<(Church, String), axum::response::Response> {
    let repo = ChurchesRepository::new(state.pool.clone());
    let church = match repo.get_by_id(church_id).await {
        Ok(Some(church)) => church,
        Ok(None) => {
            return Err(json_error(StatusCode::NOT_FOUND, "Church not found").into_response());
        }
        Err(e) => {
            error!(church_id = %church_id, error = %e, "Failed to get church");
            return Err(
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get church")
                    .into_response(),
            );
        }
    };

    if !church.is_stripe_connected {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Church has not connected a Stripe account",
        )
        .into_response());
    }

    let account_id = match church.stripe_account_id.clone() {
        Some(id) => id,
        None => {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Church has not connected a Stripe account",
            )
            .into_response());
        }
    };

    Ok((church, account_id))
}

/// POST /payment/donate/payment
/// Create a one-time donation Checkout session; funds are transferred to the
/// church's connected account as a destination charge
pub async fn donate_payment(
    State(state): State<AppState>,
    Json(request): Json<DonatePaymentRequest>,
) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let (church, account_id) = match connected_church(&state, request.church_id).await {
        Ok(found) => found,
        Err(response) => return response,
    };

    if !church.donation_config.allows_one_time() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "This church does not accept one-time donations",
        )
        .into_response();
    }
    if !church.donation_config.allows_amount(request.amount_cents) {
        return json_error(StatusCode::BAD_REQUEST, "Donation amount is not allowed")
            .into_response();
    }

    let donors_repo = DonorsRepository::new(state.pool.clone());
    let donor = match donors_repo
        .upsert(NewDonor {
            church_id: church.id,
            email: request.email.clone(),
            name: request.name.clone(),
        })
        .await
    {
        Ok(donor) => donor,
        Err(e) => {
            error!(church_id = %church.id, error = %e, "Failed to upsert donor");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record donor")
                .into_response();
        }
    };

    let success_url = format!(
        "{}/donate/{}/success?session_id={{CHECKOUT_SESSION_ID}}",
        stripe_config.frontend_url, church.id
    );
    let cancel_url = format!("{}/donate/{}/cancel", stripe_config.frontend_url, church.id);
    let product_name = format!("Donation to {}", church.org_name);

    let mut checkout_params = CreateCheckoutSession::new();
    checkout_params.success_url = Some(&success_url);
    checkout_params.cancel_url = Some(&cancel_url);
    checkout_params.customer_email = Some(&request.email);
    checkout_params.mode = Some(stripe::CheckoutSessionMode::Payment);
    checkout_params.line_items = Some(vec![CreateCheckoutSessionLineItems {
        price_data: Some(CreateCheckoutSessionLineItemsPriceData {
            currency: Currency::USD,
            product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                name: product_name,
                ..Default::default()
            }),
            unit_amount: Some(request.amount_cents as i64),
            ..Default::default()
        }),
        quantity: Some(1),
        ..Default::default()
    }]);
    checkout_params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
        transfer_data: Some(CreateCheckoutSessionPaymentIntentDataTransferData {
            destination: account_id.clone(),
            ..Default::default()
        }),
        ..Default::default()
    });

    let session = match CheckoutSession::create(&stripe_config.client, checkout_params).await {
        Ok(session) => session,
        Err(e) => {
            error!(church_id = %church.id, error = %e, "Failed to create checkout session");
            metrics::counter!("stripe.api.errors").increment(1);
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create checkout session",
            )
            .into_response();
        }
    };

    let payment_intent_id = session
        .payment_intent
        .as_ref()
        .map(|pi| pi.id().to_string());

    let donations_repo = DonationsRepository::new(state.pool.clone());
    let new_donation = NewDonation {
        church_id: church.id,
        donor_id: Some(donor.id),
        kind: DonationKind::OneTime,
        amount_cents: request.amount_cents,
        currency: "usd".to_string(),
        stripe_checkout_session_id: Some(session.id.to_string()),
        stripe_payment_intent_id: payment_intent_id,
    };
    if let Err(e) = donations_repo.create(new_donation).await {
        error!(church_id = %church.id, error = %e, "Failed to record donation");
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to record donation",
        )
        .into_response();
    }

    metrics::counter!("donations.checkout_created", "kind" => "one_time").increment(1);

    let checkout_url = session.url.unwrap_or_default();
    Json(DataResponse {
        data: CheckoutResponse { checkout_url },
    })
    .into_response()
}

/// POST /payment/donate/subscription
/// Create a recurring donation Checkout session with an inline recurring
/// price; the Subscription row is created when the provider reports it
pub async fn donate_subscription(
    State(state): State<AppState>,
    Json(request): Json<DonateSubscriptionRequest>,
) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let (church, account_id) = match connected_church(&state, request.church_id).await {
        Ok(found) => found,
        Err(response) => return response,
    };

    if !church.donation_config.allows_subscription() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "This church does not accept recurring donations",
        )
        .into_response();
    }

    let frequency = match DonationFrequency::parse(&request.interval) {
        Some(f) => f,
        None => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "Invalid interval. Must be: week, month, or year",
            )
            .into_response();
        }
    };
    if !church.donation_config.allows_frequency(frequency) {
        return json_error(
            StatusCode::BAD_REQUEST,
            "This church does not offer that donation frequency",
        )
        .into_response();
    }
    if !church.donation_config.allows_amount(request.amount_cents) {
        return json_error(StatusCode::BAD_REQUEST, "Donation amount is not allowed")
            .into_response();
    }

    let donors_repo = DonorsRepository::new(state.pool.clone());
    if let Err(e) = donors_repo
        .upsert(NewDonor {
            church_id: church.id,
            email: request.email.clone(),
            name: request.name.clone(),
        })
        .await
    {
        error!(church_id = %church.id, error = %e, "Failed to upsert donor");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record donor")
            .into_response();
    }

    let interval = match frequency {
        DonationFrequency::Week => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Week,
        DonationFrequency::Month => {
            CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month
        }
        DonationFrequency::Year => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
    };

    let success_url = format!(
        "{}/donate/{}/success?session_id={{CHECKOUT_SESSION_ID}}",
        stripe_config.frontend_url, church.id
    );
    let cancel_url = format!("{}/donate/{}/cancel", stripe_config.frontend_url, church.id);
    let product_name = format!("Recurring donation to {}", church.org_name);

    let mut checkout_params = CreateCheckoutSession::new();
    checkout_params.success_url = Some(&success_url);
    checkout_params.cancel_url = Some(&cancel_url);
    checkout_params.customer_email = Some(&request.email);
    checkout_params.mode = Some(stripe::CheckoutSessionMode::Subscription);
    checkout_params.line_items = Some(vec![CreateCheckoutSessionLineItems {
        price_data: Some(CreateCheckoutSessionLineItemsPriceData {
            currency: Currency::USD,
            product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                name: product_name,
                ..Default::default()
            }),
            unit_amount: Some(request.amount_cents as i64),
            recurring: Some(CreateCheckoutSessionLineItemsPriceDataRecurring {
                interval,
                ..Default::default()
            }),
            ..Default::default()
        }),
        quantity: Some(1),
        ..Default::default()
    }]);
    checkout_params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
        transfer_data: Some(CreateCheckoutSessionSubscriptionDataTransferData {
            destination: account_id.clone(),
            ..Default::default()
        }),
        ..Default::default()
    });

    let session = match CheckoutSession::create(&stripe_config.client, checkout_params).await {
        Ok(session) => session,
        Err(e) => {
            error!(church_id = %church.id, error = %e, "Failed to create checkout session");
            metrics::counter!("stripe.api.errors").increment(1);
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create checkout session",
            )
            .into_response();
        }
    };

    metrics::counter!("donations.checkout_created", "kind" => "recurring").increment(1);

    let checkout_url = session.url.unwrap_or_default();
    Json(DataResponse {
        data: CheckoutResponse { checkout_url },
    })
    .into_response()
}
