use async_trait::async_trait;

/// Pauses payouts on a connected account. Abstracted so the pipeline
/// can be exercised without touching the provider.
#[async_trait]
pub trait PayoutPauser: Send + Sync {
    async fn pause_payouts(&self, account_id: &str) -> anyhow::Result<()>;
}

/// Pauses via the Stripe API by switching the payout schedule to
/// manual, which stops automatic payouts without disabling the account.
pub struct StripePauser {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripePauser {
    pub fn new(api_base: &str, secret_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PayoutPauser for StripePauser {
    async fn pause_payouts(&self, account_id: &str) -> anyhow::Result<()> {
        let url = format!("{}/v1/accounts/{}", self.api_base, account_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[("settings[payouts][schedule][interval]", "manual")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("pause request for {account_id} failed: {status} {body}");
        }
        tracing::info!(account_id, "Paused payouts");
        Ok(())
    }
}
