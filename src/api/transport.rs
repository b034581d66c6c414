// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use reqwest::{header, multipart, Method};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use crate::{error::Result, metadata};

#[derive(Debug)]
pub(crate) enum Body {
    Empty,
    Json(serde_json::Value),
    File { field: &'static str, path: PathBuf },
}

#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) bearer: Option<SecretString>,
    pub(crate) body: Body,
}

#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

impl Response {
    pub(crate) const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Moves a request to the server and its response back. Status codes are
/// not interpreted here.
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn send(&self, req: Request) -> Result<Response>;
}

pub(crate) struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    const TIMEOUT: Duration = Duration::from_secs(15);

    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .user_agent(metadata::CLIENT_USER_AGENT.as_str())
                .timeout(Self::TIMEOUT)
                .build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: Request) -> Result<Response> {
        let mut builder = self
            .http
            .request(req.method, req.url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &req.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder = match req.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File { field, path } => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_owned());
                let bytes = tokio::fs::read(&path).await?;
                let part = multipart::Part::bytes(bytes).file_name(file_name);
                builder.multipart(multipart::Form::new().part(field, part))
            }
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(Response { status, body })
    }
}
