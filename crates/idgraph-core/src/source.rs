//! The collaborator boundary: whatever talks to the identity provider.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::record::RawEntity;
use crate::{IdGraphError, IdGraphResult};

/// One page of raw entities.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawEntity>,
    pub next_cursor: Option<String>,
}

/// Authenticated, paginated access to a directory source.
///
/// Implementations report retrieval failures as
/// [`IdGraphError::SourceFetch`].
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Fetch one page of `entity_type`, starting at `cursor` when given.
    async fn fetch_entities(&self, entity_type: &str, cursor: Option<&str>) -> IdGraphResult<Page>;

    /// Fetch every entity related to `parent_id` through `relation`.
    async fn fetch_relationship_targets(
        &self,
        parent_id: &str,
        relation: &str,
    ) -> IdGraphResult<Vec<RawEntity>>;
}

/// Drive pagination of `entity_type` to completion.
///
/// A cursor handed back twice means the source is looping, which fails the
/// fetch instead of paging forever.
pub async fn fetch_all<S>(source: &S, entity_type: &str) -> IdGraphResult<Vec<RawEntity>>
where
    S: EntitySource + ?Sized,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = source.fetch_entities(entity_type, cursor.as_deref()).await?;
        pages += 1;
        records.extend(page.records);

        match page.next_cursor {
            Some(next) if !seen.insert(next.clone()) => {
                return Err(IdGraphError::source_fetch(
                    entity_type,
                    format!("pagination cursor repeated after page {pages}"),
                ));
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(entity_type, pages, records = records.len(), "Fetched all pages");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct PagedSource {
        pages: Vec<Vec<&'static str>>,
        stuck: bool,
    }

    /// Hands out cursors "0" -> "1" -> "0" ... with one record per page.
    struct CyclingSource;

    #[async_trait]
    impl EntitySource for CyclingSource {
        async fn fetch_entities(&self, _entity_type: &str, cursor: Option<&str>) -> IdGraphResult<Page> {
            let next = match cursor {
                Some("0") => "1",
                _ => "0",
            };
            Ok(Page {
                records: vec![json!({ "id": next }).as_object().cloned().unwrap()],
                next_cursor: Some(next.to_string()),
            })
        }

        async fn fetch_relationship_targets(&self, _: &str, _: &str) -> IdGraphResult<Vec<RawEntity>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl EntitySource for PagedSource {
        async fn fetch_entities(&self, _entity_type: &str, cursor: Option<&str>) -> IdGraphResult<Page> {
            let idx: usize = cursor.map_or(0, |c| c.parse().unwrap());
            let records = self.pages[idx]
                .iter()
                .map(|id| json!({ "id": id }).as_object().cloned().unwrap())
                .collect();
            let next_cursor = if self.stuck {
                Some(idx.to_string())
            } else if idx + 1 < self.pages.len() {
                Some((idx + 1).to_string())
            } else {
                None
            };
            Ok(Page { records, next_cursor })
        }

        async fn fetch_relationship_targets(&self, _: &str, _: &str) -> IdGraphResult<Vec<RawEntity>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_fetch_all_follows_cursors() {
        let source = PagedSource {
            pages: vec![vec!["a", "b"], vec!["c"], vec![]],
            stuck: false,
        };
        let records = fetch_all(&source, "users").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_stuck_cursor() {
        let source = PagedSource {
            pages: vec![vec!["a"], vec!["b"]],
            stuck: true,
        };
        // First page hands back "0" while the current cursor is None, second
        // request repeats "0".
        let err = fetch_all(&source, "users").await.unwrap_err();
        assert!(matches!(err, IdGraphError::SourceFetch { .. }));
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_cycling_cursor() {
        let err = fetch_all(&CyclingSource, "users").await.unwrap_err();
        match err {
            IdGraphError::SourceFetch { entity, message } => {
                assert_eq!(entity, "users");
                assert!(message.contains("repeated after page 3"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
