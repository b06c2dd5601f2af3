/// Envelope the backend wraps its answers in
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct Response<T> {
    pub error: Option<String>,
    pub body: Option<T>,
}

impl<T> Response<T> {
    pub fn ok(body: T) -> Response<T> {
        Response {
            error: None,
            body: Some(body),
        }
    }
}

/// A success payload, either wrapped in a [`Response`] envelope or bare
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Bare(T),
    Wrapped(Response<T>),
}

impl<T> Payload<T> {
    pub fn into_inner(self) -> Option<T> {
        match self {
            Payload::Wrapped(r) => r.body,
            Payload::Bare(t) => Some(t),
        }
    }
}
