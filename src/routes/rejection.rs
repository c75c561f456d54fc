use serde::Serialize;
use warp::reject;

use crate::analysis::Id;
use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    /// The body sent to the client. The message is chosen by the
    /// caller so that server errors can be masked.
    pub fn flatten(&self, message: String) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            error: message,
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) error: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Analyze { title: String, locale: String },
    List {},
    Profession { id: Id },
    Top {},
}

impl Context {
    pub fn analyze(title: String, locale: String) -> Context {
        Context::Analyze { title, locale }
    }

    pub fn list() -> Context {
        Context::List {}
    }

    pub fn profession(id: Id) -> Context {
        Context::Profession { id }
    }

    pub fn top() -> Context {
        Context::Top {}
    }
}
