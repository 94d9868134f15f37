//! REST gateway: connectivity precheck, bearer injection, idempotent retry
//! with exponential backoff, and error-shape normalization.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client as HttpClient, Method};
use serde_json::Value;

use crate::api::endpoints;
use crate::api::models::{
    self, Chat, ChatKind, LoginRequest, LoginResponse, Message, PresignedUpload, RegisterRequest,
    Workspace, WorkspaceMember,
};
use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};

const GENERIC_ERROR: &str = "Something went wrong! Please try again later.";

/// Retry schedule for idempotent requests. The default matches the backend
/// contract: 3 extra attempts at 1s, 2s, 4s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reduce the backend's nested error shapes to one display string.
///
/// Accepted shapes: a bare string, `{message}`, `{error}`, and
/// `{message: {message}}`. HTML bodies and anything else fall back to a
/// generic message.
pub fn extract_error_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return GENERIC_ERROR.to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match value {
            Value::String(s) if !s.contains('<') && !s.is_empty() => return s,
            Value::Object(map) => {
                match map.get("message") {
                    Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                    Some(Value::Object(inner)) => {
                        if let Some(Value::String(s)) = inner.get("message") {
                            if !s.is_empty() {
                                return s.clone();
                            }
                        }
                    }
                    _ => {}
                }
                if let Some(Value::String(s)) = map.get("error") {
                    if !s.is_empty() {
                        return s.clone();
                    }
                }
            }
            _ => {}
        }
        return GENERIC_ERROR.to_string();
    }
    // Plain-text body; HTML error pages get the generic fallback.
    if trimmed.contains('<') || trimmed.contains("DOCTYPE") {
        GENERIC_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Which token, if any, goes into the `Authorization` header.
enum Bearer<'a> {
    /// Session token from the [`Context`], when present.
    Session,
    /// An explicit token, e.g. the password-reset flow token.
    Token(&'a str),
    None,
}

pub struct ApiClient {
    http: HttpClient,
    config: Config,
    ctx: Context,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: Config, ctx: Context) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            ctx,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry schedule (tests shrink the base delay).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Raw HTTP access for requests that must bypass the gateway rules
    /// (the direct object-storage PUT).
    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        bearer: Bearer<'_>,
    ) -> Result<Value> {
        if !self.ctx.is_online() {
            warn!("offline, aborting {method} {path}");
            return Err(Error::Offline);
        }

        let url = self.config.api_url(path);
        let idempotent = is_idempotent(&method);
        let max_attempts = if idempotent { self.retry.retries + 1 } else { 1 };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut req = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(json) = body {
                req = req.json(json);
            }
            match bearer {
                Bearer::Session => {
                    if let Some(token) = self.ctx.token() {
                        req = req.bearer_auth(token);
                    }
                }
                Bearer::Token(t) => req = req.bearer_auth(t),
                Bearer::None => {}
            }

            let outcome = req.send().await;
            match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp.text().await?;
                        if text.trim().is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_str(&text).map_err(Error::from);
                    }
                    let transient = status.is_server_error();
                    if transient && idempotent && attempt < max_attempts {
                        let delay = self.retry.delay(attempt);
                        debug!(
                            "{method} {path} returned {status}, retry {attempt} in {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let text = resp.text().await.unwrap_or_default();
                    return Err(Error::Http {
                        status: status.as_u16(),
                        message: extract_error_message(&text),
                    });
                }
                Err(e) => {
                    if idempotent && attempt < max_attempts {
                        let delay = self.retry.delay(attempt);
                        debug!("{method} {path} failed ({e}), retry {attempt} in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(Error::Transport(e));
                }
            }
        }
    }

    // --- auth -------------------------------------------------------------

    /// Log in and store the credentials in the session state on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let raw = self
            .request(Method::POST, endpoints::AUTH_LOGIN, &[], Some(&body), Bearer::None)
            .await?;
        let resp: LoginResponse = models::decode_object(raw)?;
        self.ctx
            .set_credentials(resp.user.clone(), resp.access_token.clone());
        Ok(resp)
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<()> {
        let body = serde_json::to_value(req)?;
        self.request(
            Method::POST,
            endpoints::AUTH_REGISTER,
            &[],
            Some(&body),
            Bearer::None,
        )
        .await?;
        Ok(())
    }

    /// Log out server-side, then drop the local credentials either way.
    pub async fn logout(&self) -> Result<()> {
        let out = self
            .request(Method::POST, endpoints::AUTH_LOGOUT, &[], None, Bearer::Session)
            .await;
        self.ctx.clear_credentials();
        out.map(|_| ())
    }

    /// Start the password-reset flow. Returns the flow token the follow-up
    /// OTP verification must carry as its bearer.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        let body = serde_json::json!({ "email": email });
        let raw = self
            .request(
                Method::POST,
                endpoints::AUTH_FORGOT_PASSWORD,
                &[],
                Some(&body),
                Bearer::None,
            )
            .await?;
        Ok(flow_token(&raw))
    }

    /// Verify the reset OTP under the flow token; returns the replacement
    /// flow token used for the final reset call.
    pub async fn verify_otp_pass(&self, otp: &str, flow_token_in: &str) -> Result<Option<String>> {
        let body = serde_json::json!({ "otp": otp });
        let raw = self
            .request(
                Method::POST,
                endpoints::AUTH_VERIFY_OTP_PASS,
                &[],
                Some(&body),
                Bearer::Token(flow_token_in),
            )
            .await?;
        Ok(flow_token(&raw))
    }

    pub async fn reset_password(
        &self,
        new_password: &str,
        confirm_password: &str,
        flow_token_in: &str,
    ) -> Result<()> {
        let body = serde_json::json!({
            "newPassword": new_password,
            "confirmPassword": confirm_password,
        });
        self.request(
            Method::POST,
            endpoints::AUTH_RESET_PASSWORD,
            &[],
            Some(&body),
            Bearer::Token(flow_token_in),
        )
        .await?;
        Ok(())
    }

    pub async fn verify_email(&self, email: &str) -> Result<()> {
        let body = serde_json::json!({ "email": email });
        self.request(
            Method::POST,
            endpoints::AUTH_VERIFY_EMAIL,
            &[],
            Some(&body),
            Bearer::None,
        )
        .await?;
        Ok(())
    }

    pub async fn verify_otp(&self, otp: &str) -> Result<()> {
        let body = serde_json::json!({ "otp": otp });
        self.request(
            Method::POST,
            endpoints::AUTH_VERIFY_OTP,
            &[],
            Some(&body),
            Bearer::None,
        )
        .await?;
        Ok(())
    }

    // --- workspaces -------------------------------------------------------

    pub async fn workspaces(&self) -> Result<Vec<Workspace>> {
        let raw = self
            .request(Method::GET, endpoints::WORKSPACES, &[], None, Bearer::Session)
            .await?;
        models::decode_list(raw)
    }

    pub async fn workspace_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        let path = endpoints::workspace_members(workspace_id);
        let raw = self
            .request(Method::GET, &path, &[], None, Bearer::Session)
            .await?;
        models::decode_list(raw)
    }

    // --- chats ------------------------------------------------------------

    pub async fn chats(&self, workspace_id: &str) -> Result<Vec<Chat>> {
        let query = [("workspaceId", workspace_id.to_string())];
        let raw = self
            .request(Method::GET, endpoints::CHATS, &query, None, Bearer::Session)
            .await?;
        models::decode_list(raw)
    }

    /// Fetch one page of a chat's history. `cursor` of `None` is the initial
    /// load; see [`crate::cache::Cache::apply_messages`] for how the two
    /// cases land in the cache.
    pub async fn chat_messages(
        &self,
        workspace_id: &str,
        chat_id: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<Message>> {
        let path = endpoints::chat_messages(chat_id);
        let mut query = vec![
            ("workspaceId", workspace_id.to_string()),
            ("limit", self.config.page_size.to_string()),
        ];
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        let raw = self
            .request(Method::GET, &path, &query, None, Bearer::Session)
            .await?;
        models::decode_list(raw)
    }

    pub async fn create_chat(
        &self,
        workspace_id: &str,
        kind: ChatKind,
        participants: &[String],
        title: Option<&str>,
    ) -> Result<Chat> {
        let body = serde_json::json!({
            "workspaceId": workspace_id,
            "type": kind,
            "participants": participants,
            "title": title,
        });
        let raw = self
            .request(Method::POST, endpoints::CHATS, &[], Some(&body), Bearer::Session)
            .await?;
        models::decode_object(raw)
    }

    pub async fn mark_chat_read(&self, chat_id: &str) -> Result<()> {
        let path = endpoints::chat_read(chat_id);
        self.request(Method::POST, &path, &[], None, Bearer::Session)
            .await?;
        Ok(())
    }

    // --- uploads ----------------------------------------------------------

    /// Phase one of the upload flow: ask the backend for a presigned target.
    pub async fn presigned_url(&self, filename: &str, file_type: &str) -> Result<PresignedUpload> {
        let body = serde_json::json!({
            "filename": filename,
            "fileType": file_type,
        });
        let raw = self
            .request(
                Method::POST,
                endpoints::PRESIGNED_URL,
                &[],
                Some(&body),
                Bearer::Session,
            )
            .await?;
        models::decode_object(raw)
    }
}

/// The OTP flow endpoints return their continuation token either bare or
/// under a `data` wrapper.
fn flow_token(raw: &Value) -> Option<String> {
    raw.get("token")
        .or_else(|| raw.get("data").and_then(|d| d.get("token")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_shapes() {
        assert_eq!(extract_error_message(r#""bad creds""#), "bad creds");
        assert_eq!(extract_error_message(r#"{"message":"bad creds"}"#), "bad creds");
        assert_eq!(
            extract_error_message(r#"{"message":{"message":"bad creds","statusCode":401}}"#),
            "bad creds"
        );
        assert_eq!(extract_error_message(r#"{"error":"nope"}"#), "nope");
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(extract_error_message(""), GENERIC_ERROR);
        assert_eq!(extract_error_message("<!DOCTYPE html><html/>"), GENERIC_ERROR);
        assert_eq!(extract_error_message(r#"{"weird":true}"#), GENERIC_ERROR);
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn idempotent_methods() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::HEAD));
        assert!(is_idempotent(&Method::OPTIONS));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PUT));
        assert!(!is_idempotent(&Method::DELETE));
    }

    #[test]
    fn flow_token_shapes() {
        let bare = serde_json::json!({"token": "f1"});
        let wrapped = serde_json::json!({"data": {"token": "f2"}});
        assert_eq!(flow_token(&bare).as_deref(), Some("f1"));
        assert_eq!(flow_token(&wrapped).as_deref(), Some("f2"));
        assert_eq!(flow_token(&serde_json::json!({})), None);
    }
}
