//! REST path constants, kept in parity with the backend surface.

pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_REGISTER: &str = "/auth/register";
pub const AUTH_LOGOUT: &str = "/auth/logout";
pub const AUTH_FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const AUTH_VERIFY_OTP_PASS: &str = "/auth/verify-otp-pass";
pub const AUTH_RESET_PASSWORD: &str = "/auth/reset-password";
pub const AUTH_VERIFY_EMAIL: &str = "/auth/verify-email";
pub const AUTH_VERIFY_OTP: &str = "/auth/verify-otp";

pub const WORKSPACES: &str = "/workspaces";

pub const CHATS: &str = "/v2/chats";

pub const PRESIGNED_URL: &str = "/s3/presignedurl";

pub fn workspace_members(workspace_id: &str) -> String {
    format!("/workspaces/{workspace_id}/members")
}

pub fn chat_messages(chat_id: &str) -> String {
    format!("/v2/chats/{chat_id}/messages")
}

pub fn chat_read(chat_id: &str) -> String {
    format!("/v2/chats/{chat_id}/read")
}
