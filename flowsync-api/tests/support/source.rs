#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use flowsync_api::backend::{FlowQuery, FlowSource};
use flowsync_core::{BackendError, Flow};

/// In-process [`FlowSource`] that replays scripted replies in order and
/// records every query it receives. Once the script is exhausted it returns
/// an empty flow list.
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<Vec<Flow>, BackendError>>>,
    queries: Mutex<Vec<FlowQuery>>,
}

impl ScriptedSource {
    pub fn replying(replies: Vec<Result<Vec<Flow>, BackendError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<FlowQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowSource for ScriptedSource {
    async fn fetch(&self, query: &FlowQuery) -> Result<Vec<Flow>, BackendError> {
        self.queries.lock().unwrap().push(query.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn transport_error() -> BackendError {
    BackendError::Transport {
        reason: "connection refused".to_string(),
    }
}
