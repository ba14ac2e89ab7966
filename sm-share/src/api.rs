//! Request and response bodies of the HTTP API, shared by server and client.

use serde::{Deserialize, Serialize};

use crate::model::Profile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpReq {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageReq {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessageReq {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFriendRequestReq {
    pub receiver_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountReq {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteAccountResponse {
    pub fn ok() -> Self {
        Self { success: Some(true), error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: None, error: Some(message.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// `{"status": "ok", "message": ...}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { status: "ok".to_string(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_account_uses_camel_case_user_id() {
        let req: DeleteAccountReq = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert_eq!(req.user_id.as_deref(), Some("u1"));
        let missing: DeleteAccountReq = serde_json::from_str("{}").unwrap();
        assert!(missing.user_id.is_none());
    }

    #[test]
    fn delete_account_response_shapes() {
        assert_eq!(serde_json::to_string(&DeleteAccountResponse::ok()).unwrap(), r#"{"success":true}"#);
        assert_eq!(
            serde_json::to_string(&DeleteAccountResponse::failed("nope")).unwrap(),
            r#"{"error":"nope"}"#
        );
    }
}
