//! HTTP client for pastes that live on a peer server.
//!
//! Peers expose the same raw, edit, delete and group endpoints this server
//! does. Edit and delete report failure through an `err` query parameter on
//! the redirect target, so redirects are never followed.

use crate::db::time_util::from_millis;
use crate::error::AppError;
use crate::models::paste::{split_remote, Paste, PasteEdit};
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Response, Url};

/// Response header carrying the publication date in epoch milliseconds.
pub const PUB_DATE_HEADER: &str = "x-paste-pubdate";
/// Response header carrying the last edit date in epoch milliseconds.
pub const EDIT_DATE_HEADER: &str = "x-paste-editdate";
/// Response header carrying the paste's group.
pub const GROUP_NAME_HEADER: &str = "x-paste-groupname";

/// Query parameter used to report failures on redirects.
pub const ERROR_PARAM: &str = "err";

/// Build `path?err=<message>` with the message form-encoded.
pub fn redirect_with_error(path: &str, message: &str) -> String {
    let mut scratch = match Url::parse("http://peer.invalid/") {
        Ok(url) => url,
        Err(_) => return path.to_string(),
    };
    scratch.query_pairs_mut().append_pair(ERROR_PARAM, message);
    format!("{}?{}", path, scratch.query().unwrap_or_default())
}

/// The `err` query parameter of `url`, if present and non-empty.
pub fn error_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == ERROR_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_millis(headers: &HeaderMap, name: &str) -> Option<f64> {
    header_text(headers, name).and_then(|value| value.parse::<f64>().ok())
}

fn unreachable(err: reqwest::Error) -> AppError {
    AppError::FederationUnreachable(err.to_string())
}

/// Strip a `:host` suffix naming `host` from a URL submitted for a peer.
fn local_part<'a>(url: &'a str, host: &str) -> &'a str {
    match split_remote(url) {
        Some((local, remote)) if remote == host => local,
        _ => url,
    }
}

/// Client for peer servers.
#[derive(Clone)]
pub struct FederationClient {
    http: Client,
    scheme: String,
}

impl FederationClient {
    /// Build a client that talks to peers over `scheme` (`http` or `https`).
    ///
    /// # Errors
    /// Returns an error when the TLS backend cannot be initialized.
    pub fn new(scheme: &str) -> Result<Self, AppError> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!("fedpaste/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                AppError::StorageMessage(format!("failed to build federation client: {}", err))
            })?;
        Ok(Self {
            http,
            scheme: scheme.to_string(),
        })
    }

    fn endpoint(&self, host: &str, path: &str) -> String {
        format!("{}://{}/api/{}", self.scheme, host, path)
    }

    /// Fetch `url` from `host` as a transient paste.
    ///
    /// # Returns
    /// `None` when the peer answers with a non-success status or anything
    /// other than `text/plain`.
    ///
    /// # Errors
    /// Returns [`AppError::FederationUnreachable`] on network failure.
    pub async fn fetch(&self, url: &str, host: &str) -> Result<Option<Paste>, AppError> {
        let endpoint = self.endpoint(host, &format!("raw/{}", url));
        tracing::debug!("Fetching {} from peer {}", url, host);
        let response = self.http.get(&endpoint).send().await.map_err(unreachable)?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let is_text = header_text(response.headers(), CONTENT_TYPE.as_str())
            .map(|value| value.to_ascii_lowercase().starts_with("text/plain"))
            .unwrap_or(false);
        if !is_text {
            return Ok(None);
        }

        let headers = response.headers().clone();
        let content = response.text().await.map_err(unreachable)?;
        let now = Utc::now();
        let pub_date = header_millis(&headers, PUB_DATE_HEADER)
            .map(from_millis)
            .unwrap_or(now);
        let edit_date = header_millis(&headers, EDIT_DATE_HEADER)
            .map(from_millis)
            .unwrap_or(pub_date);

        Ok(Some(Paste {
            custom_url: url.to_string(),
            content,
            pub_date,
            edit_date,
            group_name: header_text(&headers, GROUP_NAME_HEADER).unwrap_or_default(),
            host_server: Some(host.to_string()),
            ..Paste::default()
        }))
    }

    /// Forward an edit whose old URL lives on `host`.
    ///
    /// # Returns
    /// The new URL qualified with `host`.
    ///
    /// # Errors
    /// [`AppError::Remote`] carries the peer's rejection message;
    /// [`AppError::FederationUnreachable`] means the peer never answered.
    pub async fn edit(&self, host: &str, edit: &PasteEdit) -> Result<String, AppError> {
        let old_url = local_part(&edit.old_url, host);
        let new_url = local_part(&edit.new_url, host);
        let form = [
            ("OldURL", old_url),
            ("OldEditPassword", edit.old_edit_password.as_str()),
            ("OldContent", edit.old_content.as_str()),
            ("NewURL", new_url),
            ("NewEditPassword", edit.new_edit_password.as_str()),
            ("NewContent", edit.new_content.as_str()),
        ];
        tracing::debug!("Forwarding edit of {} to peer {}", old_url, host);
        let response = self
            .http
            .post(self.endpoint(host, "edit"))
            .form(&form)
            .send()
            .await
            .map_err(unreachable)?;
        check_peer_response(&response)?;
        let final_url = redirect_path(&response).unwrap_or_else(|| new_url.to_string());
        Ok(format!("{}:{}", final_url, host))
    }

    /// Forward a delete whose URL lives on `host`.
    ///
    /// # Errors
    /// Same contract as [`FederationClient::edit`].
    pub async fn delete(&self, host: &str, url: &str, password: &str) -> Result<(), AppError> {
        let url = local_part(url, host);
        tracing::debug!("Forwarding delete of {} to peer {}", url, host);
        let response = self
            .http
            .post(self.endpoint(host, "delete"))
            .form(&[("CustomURL", url), ("password", password)])
            .send()
            .await
            .map_err(unreachable)?;
        check_peer_response(&response)
    }

    /// Public members of `group` on `host`, qualified with the host.
    ///
    /// A peer answering with a non-success status yields an empty list.
    pub async fn list_group(&self, host: &str, group: &str) -> Result<Vec<Paste>, AppError> {
        let response = self
            .http
            .get(self.endpoint(host, &format!("group/{}", group)))
            .send()
            .await
            .map_err(unreachable)?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let mut pastes: Vec<Paste> = response.json().await.map_err(unreachable)?;
        for paste in &mut pastes {
            paste.host_server = Some(host.to_string());
            paste.views = 0;
        }
        Ok(pastes)
    }
}

/// Path of the redirect target without its leading slash.
///
/// Peers redirect a successful edit to the paste's final URL, which differs
/// from the submitted one for group members.
fn redirect_path(response: &Response) -> Option<String> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let target = response.url().join(location).ok()?;
    let path = target.path().trim_start_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

/// Translate a peer's edit/delete response into the local result contract.
///
/// The `err` parameter is read from the redirect `Location` first, then from
/// the final response URL.
fn check_peer_response(response: &Response) -> Result<(), AppError> {
    let redirect_target = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| response.url().join(location).ok());

    let message = redirect_target
        .as_ref()
        .and_then(error_param)
        .or_else(|| error_param(response.url()));
    if let Some(message) = message {
        return Err(AppError::Remote(message));
    }

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(AppError::Remote(format!("peer answered {}", status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_with_error_encodes_message() {
        assert_eq!(
            redirect_with_error("/demo", "wrong password & more"),
            "/demo?err=wrong+password+%26+more"
        );
        let parsed = Url::parse(&format!(
            "http://peer{}",
            redirect_with_error("/grp/demo", "not found")
        ))
        .expect("url");
        assert_eq!(error_param(&parsed).as_deref(), Some("not found"));
    }

    #[test]
    fn error_param_ignores_blank_and_other_keys() {
        let url = Url::parse("http://peer/demo?x=1&err=").expect("url");
        assert_eq!(error_param(&url), None);
        let url = Url::parse("http://peer/demo?error=nope").expect("url");
        assert_eq!(error_param(&url), None);
    }

    #[test]
    fn local_part_strips_only_matching_host() {
        assert_eq!(local_part("demo:peer:8080", "peer:8080"), "demo");
        assert_eq!(local_part("demo", "peer:8080"), "demo");
        assert_eq!(local_part("demo:other", "peer"), "demo:other");
    }

    #[tokio::test]
    async fn unreachable_peer_is_reported_as_connection_failure() {
        let client = FederationClient::new("http").expect("client");
        // Port 9 on loopback (discard) is closed in test environments.
        let err = client
            .fetch("demo", "127.0.0.1:9")
            .await
            .expect_err("closed port");
        assert!(matches!(err, AppError::FederationUnreachable(_)));
        assert_eq!(err.message(), "connection failed");
    }
}
