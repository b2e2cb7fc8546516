//! 带引用的回答合成提示词

/// 合成提示：{context_str} 为带编号的来源块，{query_str} 为问题
pub const CITATION_PROMPT: &str = r#"
Context information is below.
------------------
{context_str}
------------------
The context are multiple text chunks, each text chunk has its own citation_id at the beginning.
Use the citation_id for citation construction.

Answer the following query with citations:
------------------
{query_str}
------------------

## Citation format

[id]

Where:
- `id` is the `citation_id` provided in the context or previous response.

Example:
```
    The Technology industry uses code T [1].
    For manufacturing methods, Assembly uses code A [2].
    Material type for steel is 01 [3].
```

CRITICAL: Each piece of information MUST have its citation immediately after it, not at the end of the paragraph.

## Requirements:
1. ONLY cite sources that contain information you actually use in your response.
2. If a chunk doesn't contain relevant information for the query, do NOT cite it.
3. Make sure that the citation_id is correct with the context, don't mix up the citation_id with other information.
4. CRITICAL: Include in-line citations [id] immediately after each piece of information in your response text. Do NOT just list citations at the end.

Now, you answer the query with citations:
"#;

/// 拼入 Agent system prompt 的引用约束
pub const CITATION_SYSTEM_PROMPT: &str = "When using the query tool (RAG system), answer the user question using ONLY the response from the query tool. \
It's important to respect the citation information in the response. \
Don't mix up the citation_id, keep them at the correct fact. \
The query tool provides citations in the format [id] for each chunk of information. \
CRITICAL: You MUST include these in-line citations [id] in your actual response text, immediately after each piece of information you reference. \
Do NOT just list citations at the end - they must be embedded within your response text. \
EXAMPLE: Write 'The Technology industry uses code T [1]' not 'The Technology industry uses code T. Sources: [1]'. \
If the query tool returns no relevant information, respond with 'I cannot find information about this topic in the provided knowledge base.'";

pub fn render_citation_prompt(context_str: &str, query_str: &str) -> String {
    CITATION_PROMPT
        .replace("{context_str}", context_str)
        .replace("{query_str}", query_str)
}
