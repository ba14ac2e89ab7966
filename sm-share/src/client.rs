//! Typed HTTP client for the secret-messages API.

use reqwest::{Client, RequestBuilder, StatusCode, multipart};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{
    Ack, AuthResponse, DeleteAccountReq, DeleteAccountResponse, EditMessageReq, PostMessageReq, SendFriendRequestReq,
    SignInReq, SignUpReq, UpdateProfileReq, UploadResponse,
};
use crate::error::{Result, ShareError};
use crate::model::{FriendRequestWithSender, FriendSummary, Message, MessageWithStatus, Profile};
use crate::validation::validate_credentials;

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = token;
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token().ok_or(ShareError::NotSignedIn)?;
        Ok(builder.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), message = %message, "API request failed");
            return Err(ShareError::Api { status: status.as_u16(), message });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn sign_up(&self, email: &str, password: &str, nickname: Option<String>) -> Result<AuthResponse> {
        validate_credentials(email, password)?;
        let req = SignUpReq { email: email.trim().to_string(), password: password.to_string(), nickname };
        let auth: AuthResponse = self.send(self.http.post(self.url("/auth/sign-up")).json(&req)).await?;
        self.set_token(Some(auth.token.clone()));
        Ok(auth)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        validate_credentials(email, password)?;
        let req = SignInReq { email: email.trim().to_string(), password: password.to_string() };
        let auth: AuthResponse = self.send(self.http.post(self.url("/auth/sign-in")).json(&req)).await?;
        self.set_token(Some(auth.token.clone()));
        Ok(auth)
    }

    /// Revokes the session server-side and forgets the token either way.
    pub async fn sign_out(&self) -> Result<()> {
        let result: Result<Ack> = self.send(self.authed(self.http.post(self.url("/auth/sign-out")))?).await;
        self.set_token(None);
        result.map(|_| ())
    }

    /// Deletes the account and signs out locally.
    pub async fn delete_account(&self, user_id: &str) -> Result<()> {
        let req = DeleteAccountReq { user_id: Some(user_id.to_string()) };
        let resp: DeleteAccountResponse =
            self.send(self.authed(self.http.post(self.url("/delete-account")).json(&req))?).await?;
        debug!(?resp, "account deleted");
        self.set_token(None);
        Ok(())
    }

    pub async fn me(&self) -> Result<Profile> {
        self.send(self.authed(self.http.get(self.url("/profiles/me")))?).await
    }

    pub async fn update_me(&self, req: &UpdateProfileReq) -> Result<Profile> {
        self.send(self.authed(self.http.put(self.url("/profiles/me")).json(req))?).await
    }

    pub async fn profile(&self, id: &str) -> Result<Profile> {
        let path = format!("/profiles/{}", urlencoding::encode(id));
        self.send(self.authed(self.http.get(self.url(&path)))?).await
    }

    /// Everyone except the viewer and the viewer's friends.
    pub async fn recommended_profiles(&self) -> Result<Vec<Profile>> {
        self.send(self.authed(self.http.get(self.url("/profiles/recommended")))?).await
    }

    pub async fn public_messages(&self) -> Result<Vec<MessageWithStatus>> {
        self.send(self.authed(self.http.get(self.url("/messages/public")))?).await
    }

    pub async fn user_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let path = format!("/messages/user/{}", urlencoding::encode(user_id));
        self.send(self.authed(self.http.get(self.url(&path)))?).await
    }

    pub async fn chat(&self, friend_id: &str) -> Result<Vec<Message>> {
        let path = format!("/messages/chat/{}", urlencoding::encode(friend_id));
        self.send(self.authed(self.http.get(self.url(&path)))?).await
    }

    pub async fn post_message(&self, req: &PostMessageReq) -> Result<Message> {
        self.send(self.authed(self.http.post(self.url("/messages")).json(req))?).await
    }

    pub async fn edit_message(&self, id: &str, content: &str) -> Result<Message> {
        let path = format!("/messages/{}", urlencoding::encode(id));
        let req = EditMessageReq { content: content.to_string() };
        self.send(self.authed(self.http.put(self.url(&path)).json(&req))?).await
    }

    pub async fn friends(&self) -> Result<Vec<FriendSummary>> {
        self.send(self.authed(self.http.get(self.url("/friends")))?).await
    }

    pub async fn friend_requests(&self) -> Result<Vec<FriendRequestWithSender>> {
        self.send(self.authed(self.http.get(self.url("/friend-requests")))?).await
    }

    pub async fn send_friend_request(&self, receiver_id: &str) -> Result<Ack> {
        let req = SendFriendRequestReq { receiver_id: receiver_id.to_string() };
        self.send(self.authed(self.http.post(self.url("/friend-requests")).json(&req))?).await
    }

    pub async fn accept_friend_request(&self, sender_id: &str) -> Result<Ack> {
        let path = format!("/friend-requests/{}/accept", urlencoding::encode(sender_id));
        self.send(self.authed(self.http.post(self.url(&path)))?).await
    }

    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>, content_type: &str) -> Result<UploadResponse> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);
        self.send(self.authed(self.http.post(self.url("/storage/message-images")).multipart(form))?).await
    }

    /// Uploads the image if any, then posts. The image URL of a failed upload is never posted.
    pub async fn post_with_image(
        &self,
        content: &str,
        image: Option<(String, Vec<u8>, String)>,
        receiver_id: Option<String>,
    ) -> Result<Message> {
        let image_url = match image {
            Some((name, bytes, content_type)) => Some(self.upload_image(&name, bytes, &content_type).await?.public_url),
            None => None,
        };
        self.post_message(&PostMessageReq { content: content.to_string(), image_url, receiver_id }).await
    }
}

/// Pulls the human-readable message out of an error body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}
