use crate::app_config::AppConfig;
use reqwest::Client;
use reqwest::header::{HeaderValue, InvalidHeaderValue};
use thiserror::Error;

/// Builds the client shared by both providers. Nominatim's usage policy rejects requests without an identifying
/// User-Agent.
pub fn new_client(config: &AppConfig) -> Result<Client, ClientError> {
    let user_agent = HeaderValue::from_str(config.nominatim().user_agent())?;

    Client::builder()
        .user_agent(user_agent)
        .timeout(config.nominatim().timeout())
        .build()
        .map_err(ClientError::Build)
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("unable to build the HTTP client: {0}")]
    Build(reqwest::Error),
    #[error("invalid user agent: {0}")]
    InvalidUserAgent(#[from] InvalidHeaderValue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfigBuilder;
    use mockito::Server;
    use std::io::Write;
    use std::time::Duration;
    use test_log::test;

    #[test(tokio::test)]
    async fn requests_carry_the_configured_user_agent() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .match_header("user-agent", "geocountry-test/1.0")
            .with_status(204)
            .create_async()
            .await;

        let client = new_client(&AppConfigBuilder::new().build())?;
        let response = client.get(format!("{}/status", server.url())).send().await?;

        mock.assert_async().await;
        assert_eq!(response.status(), 204);
        Ok(())
    }

    #[test(tokio::test)]
    async fn slow_responses_time_out() -> Result<(), ClientError> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/slow")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(500));
                w.write_all(b"too late")
            })
            .create_async()
            .await;

        let client = new_client(&AppConfigBuilder::new().nominatim_timeout(Duration::from_millis(100)).build())?;
        let error = match client.get(format!("{}/slow", server.url())).send().await {
            Ok(response) => response.text().await.expect_err("expected the body to time out"),
            Err(e) => e,
        };

        assert!(error.is_timeout(), "unexpected error: {:?}", error);
        Ok(())
    }

    #[test]
    fn rejects_a_user_agent_with_control_characters() {
        let config = AppConfigBuilder::new().nominatim_user_agent("geocountry\n1.0".to_string()).build();

        assert!(matches!(new_client(&config), Err(ClientError::InvalidUserAgent(_))));
    }
}
