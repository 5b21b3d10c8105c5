use metricprovider_helper::auth::{AuthError, AzureAdAuth, TokenSource};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_credentials() -> TokenSource {
    TokenSource::ClientCredentials {
        tenant_id: "contoso-tenant".to_string(),
        client_id: "app-id".to_string(),
        client_secret: "s3cr3t".to_string(),
    }
}

// ── Client credentials ──────────────────────────────────────────

#[tokio::test]
async fn client_credentials_token_is_returned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/contoso-tenant/oauth2/v2.0/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "ext_expires_in": 3599,
            "access_token": "eyJ.token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AzureAdAuth::new(client_credentials(), server.uri());
    let access = auth
        .acquire_token("https://org.api.crm4.dynamics.com")
        .await
        .unwrap();

    assert_eq!(access.token, "eyJ.token");
    assert_eq!(access.credentials.tenant_id, "contoso-tenant");
    assert_eq!(access.credentials.client_id, "app-id");
    assert_eq!(access.credentials.client_secret.as_deref(), Some("s3cr3t"));
}

#[tokio::test]
async fn each_acquisition_hits_the_token_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t" })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = AzureAdAuth::new(client_credentials(), server.uri());
    auth.acquire_token("https://a").await.unwrap();
    auth.acquire_token("https://a").await.unwrap();
}

#[tokio::test]
async fn non_ok_status_is_token_request_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_scope"}"#))
        .mount(&server)
        .await;

    let auth = AzureAdAuth::new(client_credentials(), server.uri());
    let err = auth.acquire_token("https://a").await.unwrap_err();

    match err {
        AuthError::TokenRequestFailed(message) => {
            assert!(message.contains("400"));
            assert!(message.contains("invalid_scope"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn success_other_than_200_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "access_token": "t" })))
        .mount(&server)
        .await;

    let auth = AzureAdAuth::new(client_credentials(), server.uri());
    assert!(matches!(
        auth.acquire_token("https://a").await,
        Err(AuthError::TokenRequestFailed(_))
    ));
}

#[tokio::test]
async fn body_without_access_token_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "Bearer" })))
        .mount(&server)
        .await;

    let auth = AzureAdAuth::new(client_credentials(), server.uri());
    assert!(matches!(
        auth.acquire_token("https://a").await,
        Err(AuthError::ParseError(_))
    ));
}

// ── Azure CLI ───────────────────────────────────────────────────

mod azure_cli {
    use super::*;
    use azure_core::auth::{AccessToken, TokenCredential};
    use azure_core::error::{Error, ErrorKind};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;

    /// Stands in for a signed-in `az` session
    #[derive(Debug, Default)]
    struct SessionCredential {
        token: Option<String>,
        scopes: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl TokenCredential for SessionCredential {
        async fn get_token(&self, scopes: &[&str]) -> azure_core::Result<AccessToken> {
            self.scopes
                .lock()
                .unwrap()
                .extend(scopes.iter().map(|s| s.to_string()));
            match &self.token {
                Some(token) => Ok(AccessToken::new(token.clone(), OffsetDateTime::now_utc())),
                None => Err(Error::message(
                    ErrorKind::Credential,
                    "Please run 'az login' to setup account.",
                )),
            }
        }

        async fn clear_cache(&self) -> azure_core::Result<()> {
            Ok(())
        }
    }

    fn session(token: Option<String>) -> Arc<SessionCredential> {
        Arc::new(SessionCredential {
            token,
            ..SessionCredential::default()
        })
    }

    fn auth_with(credential: Arc<SessionCredential>) -> AzureAdAuth {
        AzureAdAuth::new(
            TokenSource::AzureCli { credential },
            "https://login.microsoftonline.com",
        )
    }

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[tokio::test]
    async fn delegated_token_yields_tenant_and_app_from_claims() {
        let token = jwt(r#"{"iss":"https://sts.windows.net/TENANT123/","appid":"APP1"}"#);
        let auth = auth_with(session(Some(token.clone())));

        let access = auth
            .acquire_token("https://lake.dfs.core.windows.net/")
            .await
            .unwrap();

        assert_eq!(access.token, token);
        assert_eq!(access.credentials.tenant_id, "TENANT123");
        assert_eq!(access.credentials.client_id, "APP1");
        assert!(access.credentials.client_secret.is_none());
    }

    #[tokio::test]
    async fn delegated_scope_is_requested_from_the_session() {
        let credential = session(Some(jwt(r#"{"iss":"https://sts.windows.net/T/","appid":"A"}"#)));
        let auth = auth_with(credential.clone());

        auth.acquire_token("https://org.api.crm4.dynamics.com")
            .await
            .unwrap();
        auth.acquire_token("https://lake.dfs.core.windows.net/")
            .await
            .unwrap();

        assert_eq!(
            *credential.scopes.lock().unwrap(),
            vec![
                "https://org.api.crm4.dynamics.com/.default".to_string(),
                "https://lake.dfs.core.windows.net/.default".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failing_session_is_reported() {
        let auth = auth_with(session(None));
        let err = auth.acquire_token("https://a").await.unwrap_err();

        match err {
            AuthError::CliFailed(message) => assert!(message.contains("az login")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn opaque_session_token_is_parse_error() {
        let auth = auth_with(session(Some("opaque".to_string())));
        assert!(matches!(
            auth.acquire_token("https://a").await,
            Err(AuthError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn token_without_appid_is_missing_claim() {
        let auth = auth_with(session(Some(jwt(r#"{"iss":"https://sts.windows.net/T/"}"#))));
        assert!(matches!(
            auth.acquire_token("https://a").await,
            Err(AuthError::MissingClaim("appid"))
        ));
    }
}
