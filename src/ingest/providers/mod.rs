pub mod file;
pub mod greenhouse;
pub mod lever;

use std::time::Duration;

/// Shared HTTP client for the ATS boards.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("job-lead-finder/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()?)
}

/// Raw payload origin: an in-memory fixture or a live endpoint.
pub(crate) enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl Mode {
    pub(crate) async fn body(&self, provider: &str) -> anyhow::Result<String> {
        use anyhow::Context;
        match self {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{provider} http get()"))?
                    .error_for_status()
                    .with_context(|| format!("{provider} non-2xx"))?;
                resp.text()
                    .await
                    .with_context(|| format!("{provider} http .text()"))
            }
        }
    }
}
