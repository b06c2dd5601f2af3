use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{self, request, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::Mutex;
use threadline_api::{
    self as api, AuthToken, CommentId, CommentUpdate, Error as ApiError, NewComment, PostId,
    PostWithComments, Response,
};

use crate::MockServer;

type Mock = Arc<Mutex<MockServer>>;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(#[from] ApiError);

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::info!("returning error to client: {}", self.0);
        (
            self.0.status_code(),
            [(http::header::CONTENT_TYPE, "application/json")],
            self.0.contents(),
        )
            .into_response()
    }
}

/// Token of the `Authorization` header, if there is a well-formed one
pub struct MaybeAuth(pub Option<AuthToken>);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for MaybeAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<MaybeAuth, Error> {
        Ok(MaybeAuth(
            req.headers
                .get(http::header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(AuthToken::from_header),
        ))
    }
}

async fn get_post(
    State(mock): State<Mock>,
    Path(id): Path<String>,
) -> Result<Json<PostWithComments>, Error> {
    Ok(Json(mock.lock().get_post(&PostId(id))?))
}

async fn create_comment(
    MaybeAuth(tok): MaybeAuth,
    State(mock): State<Mock>,
    Json(data): Json<NewComment>,
) -> Result<(StatusCode, Json<Response<api::Comment>>), Error> {
    let c = mock.lock().create_comment(tok.as_ref(), data)?;
    Ok((StatusCode::CREATED, Json(Response::ok(c))))
}

async fn update_comment(
    MaybeAuth(tok): MaybeAuth,
    State(mock): State<Mock>,
    Path(id): Path<String>,
    Json(data): Json<CommentUpdate>,
) -> Result<Json<Response<api::Comment>>, Error> {
    let c = mock
        .lock()
        .update_comment(tok.as_ref(), &CommentId(id), data.content)?;
    Ok(Json(Response::ok(c)))
}

async fn delete_comment(
    MaybeAuth(tok): MaybeAuth,
    State(mock): State<Mock>,
    Path(id): Path<String>,
) -> Result<(), Error> {
    mock.lock().delete_comment(tok.as_ref(), &CommentId(id))?;
    Ok(())
}

pub fn router(mock: Mock) -> Router {
    Router::new()
        .route("/api/posts/:id", get(get_post))
        .route("/api/comments", post(create_comment))
        .route("/api/comments/:id", put(update_comment).delete(delete_comment))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(mock)
}

/// Serves `mock` on a free local port, returning where it listens
pub async fn serve(mock: Mock) -> anyhow::Result<SocketAddr> {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").context("binding mock server socket")?;
    listener
        .set_nonblocking(true)
        .context("setting mock server socket non-blocking")?;
    let addr = listener.local_addr().context("getting mock server address")?;
    let server = axum::Server::from_tcp(listener)
        .context("creating mock server")?
        .serve(router(mock).into_make_service());
    tracing::info!("mock server listening on {addr}");
    tokio::spawn(async move {
        if let Err(err) = server.await {
            tracing::error!(?err, "mock server stopped");
        }
    });
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use tower::ServiceExt;

    use super::*;

    macro_rules! do_tokio_test {
        ( $name:ident, $fn:expr ) => {
            #[test]
            fn $name() {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime");
                runtime.block_on($fn());
            }
        };
    }

    fn mock() -> (Mock, AuthToken) {
        let mut m = MockServer::new();
        m.add_post(PostId(String::from("42")), String::from("Hello world"));
        let tok = m.add_session();
        (Arc::new(Mutex::new(m)), tok)
    }

    async fn run(
        app: Router,
        method: &str,
        uri: &str,
        tok: Option<&AuthToken>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(tok) = tok {
            req = req.header(http::header::AUTHORIZATION, tok.header_value());
        }
        let req = req
            .body(Body::from(body.to_string()))
            .expect("building request");
        let resp = app.oneshot(req).await.expect("running request");
        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body())
            .await
            .expect("reading response body");
        let body = match body.is_empty() {
            true => serde_json::Value::Null,
            false => serde_json::from_slice(&body).expect("parsing response body"),
        };
        (status, body)
    }

    do_tokio_test!(create_uses_backend_wire_format, || async {
        let (m, tok) = mock();
        let (status, body) = run(
            router(m.clone()),
            "POST",
            "/api/comments",
            Some(&tok),
            serde_json::json!({
                "PostID": "42",
                "ParentID": null,
                "Author": "Alice",
                "Content": "hi",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["error"], serde_json::Value::Null);
        assert_eq!(body["body"]["postID"], "42");
        assert_eq!(body["body"]["author"], "Alice");

        let (status, body) = run(
            router(m),
            "GET",
            "/api/posts/42",
            None,
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comments"][0]["content"], "hi");
        assert_eq!(body["comments"][0]["childs"], serde_json::json!([]));
    });

    do_tokio_test!(errors_have_error_field, || async {
        let (m, tok) = mock();
        let (status, body) = run(
            router(m.clone()),
            "PUT",
            "/api/comments/3",
            Some(&tok),
            serde_json::json!({ "Content": "x" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "NO_SUCH_COMMENT");

        let (status, _) = run(
            router(m.clone()),
            "DELETE",
            "/api/comments/3",
            None,
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(m.lock().test_num_requests(), 2);
    });
}
