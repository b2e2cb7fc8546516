//! 引用追踪
//!
//! 每次检索只记录排名第一的来源：编号 = 当前来源数 + 1，来源文本截断为预览后追加到 citation_sources；
//! 检索回答中的局部编号 [1]..[9] 全部改写为该全局编号，使正文与 citation_sources 保持一致。

use std::sync::OnceLock;

use regex::Regex;

use crate::rag::RetrievalResponse;
use crate::session::SessionState;

/// 来源预览默认最大字符数
pub const DEFAULT_PREVIEW_CHARS: usize = 150;
const ELLIPSIS: &str = "...";

fn local_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[1-9]\]").expect("static citation marker pattern"))
}

/// 按字符截断，超长时追加省略号
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}{}", head, ELLIPSIS)
    } else {
        text.to_string()
    }
}

/// 把一次检索回答里的局部编号 [1]..[9] 统一改写为 [citation_number]
pub fn remap_inline_citations(response_text: &str, citation_number: usize) -> String {
    let replacement = format!("[{}]", citation_number);
    local_marker()
        .replace_all(response_text, replacement.as_str())
        .into_owned()
}

/// 引用追踪器：持有预览长度上限
#[derive(Debug, Clone)]
pub struct CitationTracker {
    preview_chars: usize,
}

impl Default for CitationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl CitationTracker {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// 记录一条来源，返回分配的引用编号（本纪元内从 1 开始递增）
    pub fn record_citation(&self, state: &mut SessionState, source_text: &str) -> usize {
        let number = state.citation_sources.len() + 1;
        state
            .citation_sources
            .push(truncate_preview(source_text, self.preview_chars));
        tracing::debug!(citation = number, "citation recorded");
        number
    }

    /// 处理一次检索结果：无来源时原样返回且不记录；否则记录首个来源并改写正文编号。
    /// 返回 (改写后的文本, 分配的编号)
    pub fn cite_response(
        &self,
        state: &mut SessionState,
        response: &RetrievalResponse,
    ) -> (String, Option<usize>) {
        match response.source_nodes.first() {
            None => (response.text.clone(), None),
            Some(top) => {
                let number = self.record_citation(state, &top.text);
                (remap_inline_citations(&response.text, number), Some(number))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::SourceNode;

    fn response(text: &str, sources: &[&str]) -> RetrievalResponse {
        RetrievalResponse {
            text: text.to_string(),
            source_nodes: sources
                .iter()
                .map(|s| SourceNode {
                    text: s.to_string(),
                    file_name: Some("codes.md".to_string()),
                    score: 0.9,
                })
                .collect(),
        }
    }

    #[test]
    fn test_citation_numbers_monotonic() {
        let tracker = CitationTracker::default();
        let mut state = SessionState::new();
        let numbers: Vec<usize> = (0..4)
            .map(|i| tracker.record_citation(&mut state, &format!("source {}", i)))
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(state.citation_sources.len(), 4);
    }

    #[test]
    fn test_remap_collapses_local_markers() {
        assert_eq!(remap_inline_citations("X [1] Y [2]", 5), "X [5] Y [5]");
    }

    #[test]
    fn test_remap_leaves_other_brackets() {
        assert_eq!(
            remap_inline_citations("a [10] b [0] c [x] d [9]", 3),
            "a [10] b [0] c [x] d [3]"
        );
    }

    #[test]
    fn test_preview_truncated_at_cap() {
        let tracker = CitationTracker::default();
        let mut state = SessionState::new();
        let long = "é".repeat(200);
        tracker.record_citation(&mut state, &long);
        let preview = &state.citation_sources[0];
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), DEFAULT_PREVIEW_CHARS + 3);

        tracker.record_citation(&mut state, "short");
        assert_eq!(state.citation_sources[1], "short");
    }

    #[test]
    fn test_cite_response_without_sources_is_untouched() {
        let tracker = CitationTracker::default();
        let mut state = SessionState::new();
        let (text, number) = tracker.cite_response(&mut state, &response("X [1]", &[]));
        assert_eq!(text, "X [1]");
        assert_eq!(number, None);
        assert!(state.citation_sources.is_empty());
    }

    #[test]
    fn test_cite_response_uses_running_counter() {
        let tracker = CitationTracker::default();
        let mut state = SessionState::new();
        tracker.cite_response(&mut state, &response("first [1]", &["a"]));
        let (text, number) =
            tracker.cite_response(&mut state, &response("Code T [1], code A [2]", &["b", "c"]));
        assert_eq!(number, Some(2));
        assert_eq!(text, "Code T [2], code A [2]");
        assert_eq!(state.citation_sources, vec!["a".to_string(), "b".to_string()]);
    }
}
