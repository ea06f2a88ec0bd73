// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command router: `<verb> <path> [<arg>]` to one capability call.

use std::sync::Arc;

use gstd_proto::{split_word, Command, Response, ReturnCode, Verb};
use tracing::{debug, warn};

use crate::resource::{CapResult, ResourceNode};

/// Resolves paths against a root and invokes capabilities.
#[derive(Debug, Clone)]
pub struct Router {
    root: Arc<ResourceNode>,
}

impl Router {
    /// Router over `root`.
    pub fn new(root: Arc<ResourceNode>) -> Self {
        Self { root }
    }

    /// Root of the tree.
    pub fn root(&self) -> &Arc<ResourceNode> {
        &self.root
    }

    /// Parse and dispatch one command line. Always yields a response.
    pub fn execute(&self, line: &str) -> Response {
        match Command::parse(line) {
            Ok(cmd) => self.dispatch(cmd.verb, &cmd.path, cmd.arg.as_deref()),
            Err(err) => {
                warn!(%err, "rejected command");
                Response::error(err.return_code())
            }
        }
    }

    /// Dispatch an already parsed command.
    fn dispatch(&self, verb: Verb, path: &str, arg: Option<&str>) -> Response {
        let result = self.invoke(verb, path, arg.unwrap_or(""));
        let response = Response::from_result(result);
        if response.code == ReturnCode::Ok {
            debug!(%verb, %path, "ok");
        } else {
            debug!(%verb, %path, code = %response.code, "failed");
        }
        response
    }

    fn invoke(&self, verb: Verb, path: &str, arg: &str) -> CapResult {
        let node = self.root.resolve(path)?;
        match verb {
            Verb::Create => {
                let creator = node.creator().ok_or(ReturnCode::MethodNotAllowed)?;
                let (name, description) = split_word(arg);
                creator.create(&node, name, description)
            }
            Verb::Read => {
                let reader = node.reader().ok_or(ReturnCode::MethodNotAllowed)?;
                reader.read(&node)
            }
            Verb::Update => {
                let updater = node.updater().ok_or(ReturnCode::MethodNotAllowed)?;
                updater.update(&node, arg.trim())
            }
            Verb::Delete => {
                let deleter = node.deleter().ok_or(ReturnCode::MethodNotAllowed)?;
                let (name, _) = split_word(arg);
                deleter.delete(&node, name)
            }
        }
    }
}
