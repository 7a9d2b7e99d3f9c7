//! OSM API 0.6 transport over HTTP (JSON)
//!
//! `ureq` is blocking, so every request runs on tokio's blocking pool. A
//! dropped future abandons the request; its eventual response is discarded.

use super::wire::OsmDocument;
use super::{Fetched, TransferError, TransferResult, Transport, DEFAULT_MAX_BATCH_SIZE};
use crate::primitive::{Kind, Primitive, PrimitiveId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Client for an OSM API 0.6 compatible server
#[derive(Debug, Clone)]
pub struct OsmApiTransport {
    agent: ureq::Agent,
    base_url: String,
    max_batch_size: usize,
}

impl OsmApiTransport {
    /// `base_url` is the API root, e.g. `https://api.openstreetmap.org/api/0.6`
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(user_agent)
            .timeout(timeout)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// `GET {base}/ways.json?ways=1,2,3`
    fn multi_fetch_url(&self, kind: Kind, ids: &[i64]) -> String {
        let list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/{}.json?{}={}",
            self.base_url,
            kind.wire_plural(),
            kind.wire_plural(),
            list
        )
    }

    /// `GET {base}/way/10.json` or `GET {base}/way/10/full.json`
    fn object_url(&self, id: PrimitiveId, full: bool) -> String {
        let suffix = if full && id.kind() != Kind::Point {
            "/full"
        } else {
            ""
        };
        format!(
            "{}/{}/{}{}.json",
            self.base_url,
            id.kind().wire_name(),
            id.id(),
            suffix
        )
    }

    /// GET a document; `None` when the server answers 404 or 410
    async fn get_document(&self, url: String) -> TransferResult<Option<OsmDocument>> {
        let agent = self.agent.clone();
        let task = tokio::task::spawn_blocking(move || {
            tracing::debug!(%url, "GET");
            match agent.get(&url).call() {
                Ok(response) => {
                    let text = response
                        .into_string()
                        .map_err(|e| TransferError::Connection(e.to_string()))?;
                    OsmDocument::from_json(&text).map(Some)
                }
                Err(ureq::Error::Status(404 | 410, _)) => Ok(None),
                Err(ureq::Error::Status(status, _)) => Err(TransferError::Status { status, url }),
                Err(ureq::Error::Transport(transport)) => {
                    Err(TransferError::Connection(transport.to_string()))
                }
            }
        });
        task.await
            .map_err(|e| TransferError::Worker(e.to_string()))?
    }

    /// Multi-fetch one kind. The server answers 404 for the whole request
    /// when any id is absent, so that case falls back to one GET per id.
    async fn batch_get_kind(&self, kind: Kind, ids: &[i64]) -> TransferResult<Vec<Fetched>> {
        let url = self.multi_fetch_url(kind, ids);
        let Some(document) = self.get_document(url).await? else {
            tracing::debug!(%kind, count = ids.len(), "multi-fetch hit a missing id, fetching one by one");
            let mut answers = Vec::with_capacity(ids.len());
            for &id in ids {
                let id = PrimitiveId::new(kind, id);
                answers.push(match self.fetch_one(id).await? {
                    Some(primitive) => Fetched::Found(primitive),
                    None => Fetched::NotFound(id),
                });
            }
            return Ok(answers);
        };

        // Deleted elements are listed with `visible: false` and count as absent
        let mut found: HashMap<PrimitiveId, Primitive> = document
            .into_primitives()?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();
        Ok(ids
            .iter()
            .map(|&id| {
                let id = PrimitiveId::new(kind, id);
                match found.remove(&id) {
                    Some(primitive) => Fetched::Found(primitive),
                    None => Fetched::NotFound(id),
                }
            })
            .collect())
    }

    async fn fetch_one(&self, id: PrimitiveId) -> TransferResult<Option<Primitive>> {
        let Some(document) = self.get_document(self.object_url(id, false)).await? else {
            return Ok(None);
        };
        if document.deleted().any(|deleted| deleted == id) {
            return Ok(None);
        }
        let primitive = document
            .into_primitives()?
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| TransferError::Malformed(format!("response for {} lacks it", id)))?;
        Ok(Some(primitive))
    }
}

#[async_trait]
impl Transport for OsmApiTransport {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>> {
        let mut answers = Vec::with_capacity(ids.len());
        for kind in Kind::ALL {
            let of_kind: Vec<i64> = ids
                .iter()
                .filter(|id| id.kind() == kind)
                .map(PrimitiveId::id)
                .collect();
            if !of_kind.is_empty() {
                answers.extend(self.batch_get_kind(kind, &of_kind).await?);
            }
        }
        Ok(answers)
    }

    async fn single_get(
        &self,
        id: PrimitiveId,
        full: bool,
    ) -> TransferResult<Option<Vec<Primitive>>> {
        match self.get_document(self.object_url(id, full)).await? {
            Some(document) if document.deleted().any(|deleted| deleted == id) => Ok(None),
            Some(document) => Ok(Some(document.into_primitives()?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> OsmApiTransport {
        OsmApiTransport::new(
            "https://api.example.org/api/0.6/",
            "primfetch-test",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_multi_fetch_url() {
        assert_eq!(
            transport().multi_fetch_url(Kind::Line, &[1, 2, 3]),
            "https://api.example.org/api/0.6/ways.json?ways=1,2,3"
        );
    }

    #[test]
    fn test_object_urls() {
        let t = transport();
        assert_eq!(
            t.object_url(PrimitiveId::line(10), true),
            "https://api.example.org/api/0.6/way/10/full.json"
        );
        assert_eq!(
            t.object_url(PrimitiveId::relation(5), false),
            "https://api.example.org/api/0.6/relation/5.json"
        );
        // points have no full form
        assert_eq!(
            t.object_url(PrimitiveId::point(1), true),
            "https://api.example.org/api/0.6/node/1.json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let t = OsmApiTransport::new("http://127.0.0.1:9", "primfetch-test", Duration::from_secs(2));
        let err = t.single_get(PrimitiveId::point(1), false).await.unwrap_err();
        assert!(matches!(err, TransferError::Connection(_)));
    }
}
