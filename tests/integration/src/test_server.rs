//! Tests against a running `ossgate-server`.
//!
//! The server must be started with test credentials, e.g.
//! `OSS_ACCESS_KEY_ID=test OSS_ACCESS_KEY_SECRET=test ossgate-server`.

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::Value;

    use crate::{endpoint_url, http_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_healthy() -> Result<()> {
        let resp = http_client()
            .get(format!("{}/health", endpoint_url()))
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));

        let body: Value = resp.json().await?;
        assert_eq!(body["status"], "running");
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_issue_policy_token() -> Result<()> {
        let resp = http_client()
            .post(format!("{}/oss/policy", endpoint_url()))
            .json(&serde_json::json!({
                "prefix": "u/2024/",
                "maxSize": 1_048_576,
                "validitySecs": 30,
            }))
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let token: Value = resp.json().await?;
        for field in ["accessid", "signature", "policy", "callback", "host", "expire", "dir"] {
            assert!(token.get(field).is_some(), "missing {field}");
        }
        assert!(token["dir"].as_str().unwrap_or_default().ends_with("u/2024/"));

        let policy: Value = serde_json::from_slice(
            &BASE64.decode(token["policy"].as_str().unwrap_or_default())?,
        )?;
        assert_eq!(policy["conditions"][1][2], 1_048_576);

        let callback: Value = serde_json::from_slice(
            &BASE64.decode(token["callback"].as_str().unwrap_or_default())?,
        )?;
        assert_eq!(
            callback["callbackBodyType"],
            "application/x-www-form-urlencoded"
        );
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_traversal_prefix() -> Result<()> {
        let resp = http_client()
            .post(format!("{}/oss/policy", endpoint_url()))
            .json(&serde_json::json!({ "prefix": "../other/" }))
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unsigned_callback() -> Result<()> {
        let resp = http_client()
            .post(format!("{}/oss/callback", endpoint_url()))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("bucket=b1&filename=a.png")
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

        let body: Value = resp.json().await?;
        assert_eq!(body["Status"], "Error");
        assert_eq!(body["Message"], "signature verification failed");
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_callback_signed_with_untrusted_key() -> Result<()> {
        // 127.0.0.1 is not in the server's default key host allow-list.
        let server = crate::KeyServer::spawn().await;
        let req = crate::signed_callback("/oss/callback", "bucket=b1", &server.key_url());
        let (parts, _) = req.into_parts();

        let mut builder = http_client().post(format!("{}/oss/callback", endpoint_url()));
        for (name, value) in &parts.headers {
            builder = builder.header(name.as_str(), value.to_str()?);
        }
        let resp = builder.body("bucket=b1").send().await?;

        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
        assert_eq!(server.hits(), 0);
        Ok(())
    }
}
