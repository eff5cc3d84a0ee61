//! All API endpoint setup
//!
//! A single GraphQL endpoint, authentication happens per field based on the session cookie.

use axum::Extension;
use axum::Router;
use axum::routing::post;
use axum_extra::extract::CookieJar;

pub use request::Form;
pub use response::Error;
pub use response::GraphQL;
pub use schema::NotesSchema;
pub use schema::build_schema;
pub use session::SESSION_COOKIE;
pub use session::SessionCookie;
pub use session::SessionKey;

mod request;
mod response;
mod schema;
mod session;

/// Get the Axum router for all API routes
pub fn router() -> Router {
    Router::new()
        .route("/graphql", post(graphql))
        .route("/graphql/", post(graphql))
}

/// Execute a GraphQL request with the session cookie of the client
async fn graphql(
    Extension(schema): Extension<NotesSchema>,
    jar: CookieJar,
    Form(request): Form<async_graphql::Request>,
) -> GraphQL {
    let request = request.data(SessionCookie::from_jar(&jar));

    GraphQL(schema.execute(request).await)
}
