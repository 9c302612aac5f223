//! Tests for the auth module

use super::*;
use crate::error::Error;
use crate::types::JwtAlgorithm;
use base64::Engine;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let client = reqwest::Client::new();
    let req = client.get("https://example.com/api");

    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert!(built.headers().get("Authorization").is_none());
}

#[tokio::test]
async fn test_freshdesk_api_key_auth() {
    let auth = Authenticator::new(AuthConfig::freshdesk_api_key("my-api-key"));

    let client = reqwest::Client::new();
    let req = client.get("https://example.freshdesk.com/api/v2/time_entries");
    let req = auth.apply(req).await.unwrap();

    let built = req.build().unwrap();
    let auth_header = built
        .headers()
        .get("Authorization")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(auth_header.starts_with("Basic "));

    let encoded = auth_header.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "my-api-key:X");
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "ya29.token".to_string(),
    });

    let client = reqwest::Client::new();
    let req = client.get("https://bigquery.googleapis.com/bigquery/v2/projects");
    let req = auth.apply(req).await.unwrap();

    let built = req.build().unwrap();
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer ya29.token"
    );
}

#[tokio::test]
async fn test_metadata_server_token_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "metadata-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::MetadataServer {
        url: format!("{}/token", mock_server.uri()),
    });

    let client = reqwest::Client::new();
    for _ in 0..3 {
        let req = client.get("https://example.com/api");
        let built = auth.apply(req).await.unwrap().build().unwrap();
        assert_eq!(
            built.headers().get("Authorization").unwrap(),
            "Bearer metadata-token"
        );
    }
}

#[tokio::test]
async fn test_metadata_server_refetches_after_clear() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "metadata-token",
            "expires_in": 3599
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::MetadataServer {
        url: format!("{}/token", mock_server.uri()),
    });

    let client = reqwest::Client::new();
    auth.apply(client.get("https://example.com")).await.unwrap();
    auth.clear_cache().await;
    auth.apply(client.get("https://example.com")).await.unwrap();
}

#[tokio::test]
async fn test_metadata_server_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no service account"))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::MetadataServer {
        url: format!("{}/token", mock_server.uri()),
    });

    let client = reqwest::Client::new();
    let err = auth
        .apply(client.get("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_service_account_invalid_key() {
    let auth = Authenticator::new(AuthConfig::ServiceAccount {
        client_email: "loader@example.iam.gserviceaccount.com".to_string(),
        private_key: "not a pem key".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        scopes: vec![BIGQUERY_SCOPE.to_string()],
        algorithm: JwtAlgorithm::RS256,
        token_lifetime_seconds: 3600,
    });

    let client = reqwest::Client::new();
    let err = auth
        .apply(client.get("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JwtGeneration { .. }));
}

#[tokio::test]
async fn test_service_account_exchanges_signed_assertion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion=ey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sa-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::ServiceAccount {
        client_email: "loader@example.iam.gserviceaccount.com".to_string(),
        private_key: include_str!("testdata/service_account_key.pem").to_string(),
        token_uri: format!("{}/token", mock_server.uri()),
        scopes: vec![BIGQUERY_SCOPE.to_string()],
        algorithm: JwtAlgorithm::RS256,
        token_lifetime_seconds: 3600,
    });

    let client = reqwest::Client::new();
    for _ in 0..2 {
        let built = auth
            .apply(client.get("https://example.com"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            built.headers().get("Authorization").unwrap(),
            "Bearer sa-token"
        );
    }
}

#[tokio::test]
async fn test_service_account_rejected_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::ServiceAccount {
        client_email: "loader@example.iam.gserviceaccount.com".to_string(),
        private_key: include_str!("testdata/service_account_key.pem").to_string(),
        token_uri: format!("{}/token", mock_server.uri()),
        scopes: vec![BIGQUERY_SCOPE.to_string()],
        algorithm: JwtAlgorithm::RS256,
        token_lifetime_seconds: 3600,
    });

    let err = auth
        .apply(reqwest::Client::new().get("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JwtGeneration { .. }));
    assert!(err.to_string().contains("status 400: invalid_grant"));
}
