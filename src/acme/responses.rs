use crate::types;

/// Response envelope for every ACME endpoint. A handler resolves to either a
/// resource or a problem document; the envelope carries the protocol headers
/// RFC 8555 hangs on each reply (Replay-Nonce, Location, Link) so individual
/// handlers never touch raw response headers.
pub struct ACMEResponse<R> {
    result: Result<(R, rocket::http::Status), types::error::Error>,
    nonce: Option<String>,
    location: Option<String>,
    links: Vec<(String, String)>,
}

impl<R> ACMEResponse<R> {
    async fn assemble(
        result: Result<(R, rocket::http::Status), types::error::Error>,
        nonces: &super::replay::SharedNonces, base: &super::BaseUrl,
    ) -> Self {
        // a reply we cannot stamp a fresh nonce onto is not usable by the
        // client for its next signed request, so it degrades to a 500
        let (result, nonce) = match nonces.issue().await {
            Ok(nonce) => (result, Some(nonce)),
            Err(err) => (Err(err), None),
        };

        ACMEResponse {
            result,
            nonce,
            location: None,
            links: vec![(base.join(super::DIRECTORY_URI), "up".to_string())],
        }
    }

    pub async fn resource(
        resource: R, status: rocket::http::Status,
        nonces: &super::replay::SharedNonces, base: &super::BaseUrl,
    ) -> Self {
        Self::assemble(Ok((resource, status)), nonces, base).await
    }

    pub async fn problem(
        err: types::error::Error,
        nonces: &super::replay::SharedNonces, base: &super::BaseUrl,
    ) -> Self {
        Self::assemble(Err(err), nonces, base).await
    }

    /// Last-resort problem reply for when the nonce store or request context
    /// is unavailable; carries no nonce and no links.
    pub fn bare_problem(err: types::error::Error) -> Self {
        ACMEResponse {
            result: Err(err),
            nonce: None,
            location: None,
            links: vec![],
        }
    }

    pub fn with_location(mut self, url: String) -> Self {
        self.location = Some(url);
        self
    }

    pub fn with_link(mut self, url: String, relation: &str) -> Self {
        self.links.push((url, relation.to_string()));
        self
    }
}

impl<'r, R: rocket::response::Responder<'r, 'static>> rocket::response::Responder<'r, 'static> for ACMEResponse<R> {
    fn respond_to(self, request: &'r rocket::request::Request<'_>) -> rocket::response::Result<'static> {
        let mut response = match self.result {
            Ok((resource, status)) => {
                let mut response = resource.respond_to(request)?;
                response.set_status(status);
                response
            }
            Err(err) => {
                let status = rocket::http::Status::from_code(err.status)
                    .unwrap_or(rocket::http::Status::InternalServerError);
                let mut response = rocket::serde::json::Json(err).respond_to(request)?;
                response.set_status(status);
                response.set_raw_header("Content-Type", "application/problem+json");
                response
            }
        };

        if let Some(nonce) = self.nonce {
            response.set_raw_header("Replay-Nonce", nonce);
        }
        if let Some(location) = self.location {
            response.set_raw_header("Location", location);
        }
        for (url, relation) in self.links {
            response.adjoin_raw_header("Link", format!("<{}>; rel=\"{}\"", url, relation));
        }

        Ok(response)
    }
}
