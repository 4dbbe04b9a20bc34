use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{checkout::CheckoutCustomData, subscription::PlanType},
};

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Hosted subscription checkout page.
    pub base_url: Url,
    pub monthly_plan_id: String,
    pub yearly_plan_id: String,
    pub return_url: Url,
    pub cancel_url: Url,
}

impl CheckoutConfig {
    fn plan_id(&self, plan_type: PlanType) -> &str {
        match plan_type {
            PlanType::Monthly => &self.monthly_plan_id,
            PlanType::Yearly => &self.yearly_plan_id,
        }
    }
}

#[derive(Clone)]
pub struct CheckoutUseCases {
    config: CheckoutConfig,
}

impl CheckoutUseCases {
    pub fn new(config: CheckoutConfig) -> Self {
        Self { config }
    }

    /// Hosted checkout URL for `user_id` buying `plan_type`. The custom payload
    /// comes back on the provider's webhooks and ties the payment to the user.
    #[instrument(skip(self))]
    pub fn build_checkout_url(&self, user_id: Uuid, plan_type: PlanType) -> AppResult<String> {
        let plan_id = self.config.plan_id(plan_type);
        if plan_id.trim().is_empty() {
            return Err(AppError::Internal(format!(
                "No PayPal plan configured for {} billing",
                plan_type
            )));
        }
        let custom_id = CheckoutCustomData { user_id, plan_type }.to_custom_id()?;

        let mut return_url = self.config.return_url.clone();
        return_url.query_pairs_mut().append_pair("success", "true");
        let mut cancel_url = self.config.cancel_url.clone();
        cancel_url.query_pairs_mut().append_pair("canceled", "true");

        let mut url = self.config.base_url.clone();
        url.query_pairs_mut()
            .append_pair("plan_id", plan_id)
            .append_pair("custom_id", &custom_id)
            .append_pair("return_url", return_url.as_str())
            .append_pair("cancel_url", cancel_url.as_str());
        Ok(url.into())
    }
}
