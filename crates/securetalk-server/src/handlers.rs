//! Demonstration message handlers registered against the connection core.
//! These exist to exercise the reactor and worker pool end to end; a real
//! deployment registers its own application-specific handlers instead.

use std::sync::Arc;

use securetalk::auth::{AuthOutcome, CreateOutcome, CredentialStore};
use securetalk::net::{ClientId, Handler, MsgType};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ECHO: MsgType = 0x0007;
pub const LOGIN_REQUEST: MsgType = 0x0001;
pub const LOGIN_RESPONSE: MsgType = 0x0002;
pub const SIGNUP_REQUEST: MsgType = 0x0005;
pub const SIGNUP_RESPONSE: MsgType = 0x0006;
pub const DELAYED_ECHO: MsgType = 0x0010;

const DELAYED_ECHO_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    ok: bool,
    reason: Option<&'static str>,
}

#[derive(Serialize)]
struct SignupResponse {
    ok: bool,
    reason: Option<&'static str>,
}

fn reply_json<T: Serialize>(client_id: ClientId, msg_type: MsgType, value: &T) -> (ClientId, MsgType, Vec<u8>) {
    match serde_json::to_vec(value) {
        Ok(body) => (client_id, msg_type, body),
        Err(err) => {
            warn!(?err, "failed to serialize handler response");
            (client_id, msg_type, Vec::new())
        }
    }
}

/// Echoes the request body back verbatim.
pub fn echo() -> Handler {
    Arc::new(|client_id, body| (client_id, ECHO, body))
}

/// Same as [`echo`] but after a fixed delay, used to demonstrate that a slow
/// handler on one worker doesn't block the reactor or other connections.
pub fn delayed_echo() -> Handler {
    Arc::new(|client_id, body| {
        std::thread::sleep(DELAYED_ECHO_DELAY);
        (client_id, DELAYED_ECHO, body)
    })
}

pub fn login(store: Arc<CredentialStore>) -> Handler {
    Arc::new(move |client_id, body| {
        let response = match serde_json::from_slice::<Credentials>(&body) {
            Ok(credentials) => match store.authenticate(&credentials.username, &credentials.password) {
                Ok(AuthOutcome::Ok) => LoginResponse { ok: true, reason: None },
                Ok(AuthOutcome::NotFound) => LoginResponse { ok: false, reason: Some("no such user") },
                Ok(AuthOutcome::BadPassword) => LoginResponse { ok: false, reason: Some("wrong password") },
                Err(err) => {
                    warn!(?err, "credential store error during login");
                    LoginResponse { ok: false, reason: Some("internal error") }
                }
            },
            Err(_) => LoginResponse { ok: false, reason: Some("malformed request") },
        };
        reply_json(client_id, LOGIN_RESPONSE, &response)
    })
}

pub fn signup(store: Arc<CredentialStore>) -> Handler {
    Arc::new(move |client_id, body| {
        let response = match serde_json::from_slice::<Credentials>(&body) {
            Ok(credentials) => match store.create_user(&credentials.username, &credentials.password) {
                Ok(CreateOutcome::Created) => SignupResponse { ok: true, reason: None },
                Ok(CreateOutcome::AlreadyExists) => SignupResponse { ok: false, reason: Some("username taken") },
                Err(err) => {
                    warn!(?err, "credential store error during signup");
                    SignupResponse { ok: false, reason: Some("internal error") }
                }
            },
            Err(_) => SignupResponse { ok: false, reason: Some("malformed request") },
        };
        reply_json(client_id, SIGNUP_RESPONSE, &response)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_returns_body_unchanged() {
        let handler = echo();
        let client_id = ClientId::mint();
        let (_, msg_type, body) = handler(client_id, b"hello".to_vec());
        assert_eq!(msg_type, ECHO);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn signup_then_login_round_trip() {
        let store = Arc::new(CredentialStore::new());
        let signup = signup(store.clone());
        let login = login(store);
        let client_id = ClientId::mint();

        let request = serde_json::to_vec(&serde_json::json!({
            "username": "alice",
            "password": "hunter2",
        }))
        .unwrap();

        let (_, _, signup_body) = signup(client_id, request.clone());
        let signup_response: serde_json::Value = serde_json::from_slice(&signup_body).unwrap();
        assert_eq!(signup_response["ok"], true);

        let (_, _, login_body) = login(client_id, request);
        let login_response: serde_json::Value = serde_json::from_slice(&login_body).unwrap();
        assert_eq!(login_response["ok"], true);
    }

    #[test]
    fn login_with_malformed_body_reports_failure_without_panicking() {
        let store = Arc::new(CredentialStore::new());
        let handler = login(store);
        let client_id = ClientId::mint();
        let (_, _, body) = handler(client_id, b"not json".to_vec());
        let response: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(response["ok"], false);
    }
}
