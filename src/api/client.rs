// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, sync::Arc};

use log::{debug, trace};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use super::{
    model::MessageResponse,
    transport::{Body, Request, Response, Transport},
};
use crate::{
    error::{self, Result},
    route::Navigator,
    session::SessionStore,
};

/// Responses that mean the server no longer accepts our bearer token.
const AUTHENTICATION_REJECTED: [u16; 2] = [401, 422];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

/// The only way the rest of the crate talks to the server.
///
/// Every request carries the current session's token, if any. When the
/// server refuses that token the session is ended and the user is sent to
/// the login screen before the error reaches the caller.
#[derive(Clone)]
pub(crate) struct ApiClient {
    transport: Arc<dyn Transport>,
    base: Url,
    store: SessionStore,
    navigator: Navigator,
}

impl ApiClient {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        mut base: Url,
        store: SessionStore,
        navigator: Navigator,
    ) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            transport,
            base,
            store,
            navigator,
        }
    }

    pub(crate) const fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) const fn store(&self) -> &SessionStore {
        &self.store
    }

    pub(crate) const fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base.join(path.trim_start_matches('/'))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.send(Method::GET, path, params, Body::Empty, Auth::Bearer)
            .await
    }

    pub(crate) async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = Body::Json(serde_json::to_value(body)?);
        self.send(Method::POST, path, &[], body, Auth::Bearer).await
    }

    pub(crate) async fn put<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = Body::Json(serde_json::to_value(body)?);
        self.send(Method::PUT, path, &[], body, Auth::Bearer).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, &[], Body::Empty, Auth::Bearer)
            .await
    }

    /// Send a single file as multipart form data under the field `file`.
    pub(crate) async fn upload<T: DeserializeOwned>(&self, path: &str, file: PathBuf) -> Result<T> {
        let body = Body::File {
            field: "file",
            path: file,
        };
        self.send(Method::POST, path, &[], body, Auth::Bearer).await
    }

    /// Post credentials. No token is attached, so a refusal here never ends
    /// the current session.
    pub(crate) async fn post_credentials<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = Body::Json(serde_json::to_value(body)?);
        self.send(Method::POST, path, &[], body, Auth::Anonymous)
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Body,
        auth: Auth,
    ) -> Result<T> {
        let url = self.url(path, params)?;
        let (bearer, generation) = match (auth, self.store.credentials()) {
            (Auth::Bearer, Some((token, generation))) => (Some(token), Some(generation)),
            (Auth::Bearer | Auth::Anonymous, _) => (None, None),
        };

        debug!("{} {}", method, url.path());
        let resp = self
            .transport
            .send(Request {
                method,
                url,
                bearer,
                body,
            })
            .await?;
        trace!("{} answered with status {}", path, resp.status);

        if resp.is_success() {
            return decode(path, &resp);
        }

        if let Some(generation) = generation {
            if AUTHENTICATION_REJECTED.contains(&resp.status) {
                if self.store.reject(generation).await {
                    let _ = self.navigator.redirect_to_login();
                }
                return Err(error::Api::AuthenticationRejected {
                    status: resp.status,
                }
                .into());
            }
        }

        let message = serde_json::from_slice::<MessageResponse>(&resp.body)
            .ok()
            .and_then(|body| body.message);
        Err(error::Api::Status {
            status: resp.status,
            message,
        }
        .into())
    }
}

fn decode<T: DeserializeOwned>(path: &str, resp: &Response) -> Result<T> {
    let body = if resp.body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        resp.body.as_slice()
    };
    serde_json::from_slice(body).map_err(|source| {
        error::Api::Schema {
            path: path.to_owned(),
            source,
        }
        .into()
    })
}


#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{testing::client, *};
    use crate::{
        api::{model::Health, transport::testing::Scripted},
        error::Error,
        profile::App,
        route::Location,
        session::{testing::user, Role, Session},
    };

    async fn logged_in_client(app: App) -> Result<(ApiClient, Scripted)> {
        let (client, transport) = client(app).await;
        client
            .store()
            .login(Session::new("abc123", user(1, "boss", Role::Manager))?)
            .await;
        Ok((client, transport))
    }

    #[tokio::test]
    async fn base_path_is_kept() -> Result<()> {
        let (client, _) = client(App::Manager).await;
        let client = ApiClient::new(
            client.transport.clone(),
            Url::parse("http://clubs.test/backend")?,
            client.store.clone(),
            client.navigator.clone(),
        );
        assert_eq!(
            client
                .url("/api/members", &[("page", "2".to_owned())])?
                .as_str(),
            "http://clubs.test/backend/api/members?page=2"
        );
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_token() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport.respond(Method::GET, "/api/public/clubs", 200, "[]").await;

        let _: Value = client.get("/api/public/clubs", &[]).await?;
        let recorded = transport.recorded().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].bearer, None);
        Ok(())
    }

    #[tokio::test]
    async fn no_token_is_sent_after_logout() -> Result<()> {
        let (client, transport) = logged_in_client(App::Manager).await?;
        transport.respond(Method::GET, "/api/health", 200, r#"{"status": "ok"}"#).await;

        let _: Value = client.get("/api/health", &[]).await?;
        assert!(client.store().logout().await);
        let _: Value = client.get("/api/health", &[]).await?;

        let recorded = transport.recorded().await;
        assert_eq!(recorded[0].bearer.as_deref(), Some("abc123"));
        assert_eq!(recorded[1].bearer, None);
        Ok(())
    }

    #[tokio::test]
    async fn empty_body_decodes_as_null() -> Result<()> {
        let (client, transport) = client(App::Manager).await;
        transport.respond(Method::DELETE, "/api/admin/users/3", 204, "").await;

        let body: Option<Value> = client.delete("/api/admin/users/3").await?;
        assert_eq!(body, None);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_rejections_log_out_and_redirect_once() -> Result<()> {
        let (client, transport) = logged_in_client(App::Manager).await?;
        client
            .navigator()
            .navigate(client.store(), Location::new("/monitoring"));
        for path in ["/api/overview", "/api/pcs", "/api/members"] {
            transport.respond(Method::GET, path, 401, "").await;
        }

        let (a, b, c) = tokio::join!(
            client.get::<Value>("/api/overview", &[]),
            client.get::<Value>("/api/pcs", &[]),
            client.get::<Value>("/api/members", &[]),
        );
        for result in [a, b, c] {
            assert!(result.is_err_and(|e| e.is_authentication_rejected()));
        }

        assert!(!client.store().is_authenticated());
        assert_eq!(client.navigator().redirects(), 1);
        assert_eq!(client.navigator().current().path(), "/login");
        assert_eq!(client.navigator().after_login(), Location::new("/monitoring"));
        Ok(())
    }

    #[tokio::test]
    async fn unprocessable_token_counts_as_rejection() -> Result<()> {
        let (client, transport) = logged_in_client(App::Manager).await?;
        transport.respond(Method::GET, "/api/overview", 422, "").await;

        let result = client.get::<Value>("/api/overview", &[]).await;
        assert!(matches!(
            result,
            Err(Error::Api(error::Api::AuthenticationRejected { status: 422 }))
        ));
        assert!(!client.store().is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_401_is_an_ordinary_failure() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(
                Method::POST,
                "/api/clients/login",
                401,
                r#"{"message": "Invalid credentials"}"#,
            )
            .await;

        let result = client
            .post::<_, Value>("/api/clients/login", &serde_json::json!({}))
            .await;
        match result {
            Err(Error::Api(api @ error::Api::Status { status: 401, .. })) => {
                assert_eq!(api.user_message(), "Invalid credentials");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(client.navigator().redirects(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn other_failures_keep_the_session() -> Result<()> {
        let (client, transport) = logged_in_client(App::Manager).await?;
        transport.respond(Method::GET, "/api/pcs", 500, "oops").await;

        let result = client.get::<Value>("/api/pcs", &[]).await;
        assert!(matches!(
            result,
            Err(Error::Api(error::Api::Status {
                status: 500,
                message: None
            }))
        ));
        assert!(client.store().is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_body_is_a_schema_error() -> Result<()> {
        let (client, transport) = logged_in_client(App::Manager).await?;
        transport
            .respond(Method::GET, "/api/health", 200, r#"{"unexpected": true}"#)
            .await;

        let result = client
            .get::<Health>("/api/health", &[])
            .await;
        assert!(
            matches!(result, Err(Error::Api(error::Api::Schema { ref path, .. })) if path == "/api/health")
        );
        Ok(())
    }
}
