use std::time::Instant;

use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::models::VirtualNode;
use crate::navigation::{ResolveOptions, parse_path};
use crate::request_log::RequestContext;
use crate::session::NavigationSession;

use super::FacetNav;

const RESOLVE_OPERATION: &str = "navigation.resolve";

impl FacetNav {
    /// Resolves `path` under the navigation or mirror called `name`.
    pub fn resolve(
        &self,
        session: &mut NavigationSession,
        name: &str,
        path: &str,
    ) -> Result<VirtualNode> {
        self.resolve_with(session, name, path, ResolveOptions::default())
    }

    pub fn resolve_with(
        &self,
        session: &mut NavigationSession,
        name: &str,
        path: &str,
        options: ResolveOptions,
    ) -> Result<VirtualNode> {
        let context = RequestContext {
            request_id: Uuid::new_v4().to_string(),
            operation: RESOLVE_OPERATION,
            started: Instant::now(),
            session_id: Some(session.session_id().to_string()),
            target: Some(format!("{name}:{path}")),
        };

        let output = (|| -> Result<VirtualNode> {
            let root = self.registry.root(name)?;
            let segments = parse_path(path)?;
            session.resolve_with(&root, &segments, options)
        })();

        let cache = session.cache_stats();
        match output {
            Ok(node) => {
                let details = json!({
                    "navigation": name,
                    "path": path,
                    "generation": node.generation.0,
                    "kind": node.kind,
                    "count": node.count,
                    "children": node.children.len(),
                    "results": node.result_documents.len(),
                    "cache": cache,
                });
                if node.degraded {
                    self.request_log.log_warning(
                        &context,
                        "free-text query rejected; node degraded to empty",
                        Some(details),
                    );
                } else {
                    self.request_log.log_status(&context, Some(details));
                }
                Ok(node)
            }
            Err(err) => {
                self.request_log.log_error(
                    &context,
                    &err,
                    Some(json!({
                        "navigation": name,
                        "path": path,
                        "generation": session.generation().0,
                        "cache": cache,
                    })),
                );
                Err(err)
            }
        }
    }
}
