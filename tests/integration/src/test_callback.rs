//! Callback verification against a public key served over HTTP.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use ossgate_auth::{
        AuthError, CachedKeyResolver, CallbackVerifier, HttpKeyResolver, KeyResolver,
        verify_callback,
    };

    use tokio::net::TcpListener;

    use crate::{KEY_PATH, KeyServer, REDIRECT_PATH, init_tracing, signed_callback};

    fn resolver() -> HttpKeyResolver {
        HttpKeyResolver::new(["127.0.0.1"], Duration::from_secs(5)).expect("http client")
    }

    #[tokio::test]
    async fn test_should_verify_callback_with_fetched_key() {
        init_tracing();
        let server = KeyServer::spawn().await;

        let req = signed_callback(
            "/oss/callback",
            "bucket=b1&filename=uploads%2Fa.png&size=42",
            &server.key_url(),
        );
        let params = verify_callback(req, &resolver()).await.expect("verified");

        assert_eq!(params.get("bucket"), Some("b1"));
        assert_eq!(params.get("filename"), Some("uploads/a.png"));
        assert_eq!(params.get("size"), Some("42"));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_should_fetch_key_once_with_cache() {
        init_tracing();
        let server = KeyServer::spawn().await;
        let cached = CachedKeyResolver::new(resolver(), Duration::from_secs(60));

        for i in 0..3 {
            let body = format!("bucket=b1&seq={i}");
            let req = signed_callback("/oss/callback", &body, &server.key_url());
            assert!(verify_callback(req, &cached).await.is_ok());
        }

        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_should_share_verifier_across_tasks() {
        init_tracing();
        let server = KeyServer::spawn().await;
        let shared: Arc<dyn KeyResolver> =
            Arc::new(CachedKeyResolver::new(resolver(), Duration::from_secs(60)));
        let verifier = CallbackVerifier::new(shared);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let verifier = verifier.clone();
            let key_url = server.key_url();
            tasks.push(tokio::spawn(async move {
                let body = format!("bucket=b1&seq={i}");
                verifier
                    .verify(signed_callback("/oss/callback", &body, &key_url))
                    .await
            }));
        }

        for task in tasks {
            let params = task.await.expect("task").expect("verified");
            assert_eq!(params.get("bucket"), Some("b1"));
        }
        assert!(server.hits() >= 1);
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_key() {
        init_tracing();
        let server = KeyServer::spawn().await;

        let req = signed_callback("/oss/callback", "bucket=b1", &server.url("/missing.pem"));
        let err = verify_callback(req, &resolver()).await.unwrap_err();

        assert!(matches!(err, AuthError::PublicKeyFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_should_fail_on_unreachable_key_host() {
        init_tracing();
        let server = KeyServer::spawn().await;
        let url = server.key_url();
        drop(server);

        let resolver =
            HttpKeyResolver::new(["127.0.0.1"], Duration::from_secs(1)).expect("http client");
        let req = signed_callback("/oss/callback", "bucket=b1", &url);
        let err = verify_callback(req, &resolver).await.unwrap_err();

        assert!(matches!(err, AuthError::PublicKeyFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_should_time_out_on_silent_key_host() {
        init_tracing();
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("address");
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let resolver =
            HttpKeyResolver::new(["127.0.0.1"], Duration::from_secs(1)).expect("http client");
        let url = format!("http://{addr}{KEY_PATH}");
        let req = signed_callback("/oss/callback", "bucket=b1", &url);

        let started = Instant::now();
        let err = verify_callback(req, &resolver).await.unwrap_err();
        let elapsed = started.elapsed();
        silent.abort();

        assert!(matches!(err, AuthError::PublicKeyFetchFailed(_)));
        assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_should_not_follow_key_redirect() {
        init_tracing();
        let server = KeyServer::spawn().await;

        let req = signed_callback("/oss/callback", "bucket=b1", &server.url(REDIRECT_PATH));
        let err = verify_callback(req, &resolver()).await.unwrap_err();

        assert!(matches!(err, AuthError::PublicKeyFetchFailed(_)));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_should_fetch_key_without_query() {
        init_tracing();
        let server = KeyServer::spawn().await;
        let cached = CachedKeyResolver::new(resolver(), Duration::from_secs(60));

        for i in 0..5 {
            let url = format!("{}?x={i}", server.key_url());
            let req = signed_callback("/oss/callback", "bucket=b1", &url);
            assert!(verify_callback(req, &cached).await.is_ok());
        }

        assert_eq!(server.hits(), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_should_refuse_key_from_untrusted_host() {
        init_tracing();
        let server = KeyServer::spawn().await;
        let untrusted = server.key_url().replace("127.0.0.1", "localhost");

        let req = signed_callback("/oss/callback", "bucket=b1", &untrusted);
        let err = verify_callback(req, &resolver()).await.unwrap_err();

        assert!(matches!(err, AuthError::UntrustedPublicKeyUrl(_)));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn test_should_reject_tampered_callback() {
        init_tracing();
        let server = KeyServer::spawn().await;

        let signed = signed_callback("/oss/callback", "bucket=b1&size=42", &server.key_url());
        let (parts, _) = signed.into_parts();
        let tampered = http::Request::from_parts(
            parts,
            http_body_util::Full::new(bytes::Bytes::from_static(b"bucket=b1&size=43")),
        );

        let err = verify_callback(tampered, &resolver()).await.unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }
}
