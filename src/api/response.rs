//! API response helpers

use async_graphql::Response as GraphQLResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

/// Wrap a GraphQL response, HTTP headers set by resolvers are passed on
pub struct GraphQL(pub GraphQLResponse);

impl IntoResponse for GraphQL {
    fn into_response(self) -> Response {
        let Self(mut graphql_response) = self;

        let headers = std::mem::take(&mut graphql_response.http_headers);

        let mut response = Json(graphql_response).into_response();
        response.headers_mut().extend(headers);

        response
    }
}

/// Hold data for a request that never reached GraphQL
#[derive(Debug)]
pub struct Error {
    status_code: StatusCode,
    message: String,
    description: Option<String>,
}

impl Error {
    pub fn bad_request<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description<M>(self, description: M) -> Self
    where
        M: ToString,
    {
        Self {
            description: Some(description.to_string()),
            ..self
        }
    }
}

#[derive(Serialize)]
struct ErrorWrapper<D>
where
    D: Serialize,
{
    error: D,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<D>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status_code,
            Json(ErrorWrapper {
                error: self.message,
                description: self.description,
            }),
        )
            .into_response()
    }
}
