//! 会话状态：已生成的采购编码、当前引用纪元的来源预览、可选会话 ID
//!
//! 每个对话独占一份 SessionState；Agent 只能追加编码，用户可在界面上删除某条；
//! 引用来源只在重置时整体清空。字段只在 crate 内可写，外部通过访问器读取。

use serde::{Deserialize, Serialize};

/// 一条已保存的采购编码
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementCode {
    pub code: String,
    pub description: String,
}

/// 单个对话的可变状态
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub(crate) procurement_codes: Vec<ProcurementCode>,
    #[serde(default)]
    pub(crate) citation_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) conversation_id: Option<String>,
}

/// 状态变更后推送给 UI 的完整快照
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub snapshot: SessionState,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会话 ID 只在创建时设置一次
    pub fn with_conversation_id(id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn procurement_codes(&self) -> &[ProcurementCode] {
        &self.procurement_codes
    }

    /// 当前引用纪元的来源预览，下标 + 1 即引用编号
    pub fn citation_sources(&self) -> &[String] {
        &self.citation_sources
    }

    /// 保存编码：不校验格式、不去重，相同参数重复调用视为不同的生成事件
    pub fn save_code(
        &mut self,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> StateSnapshot {
        let entry = ProcurementCode {
            code: code.into(),
            description: description.into(),
        };
        tracing::info!(code = %entry.code, total = self.procurement_codes.len() + 1, "procurement code saved");
        self.procurement_codes.push(entry);
        self.snapshot()
    }

    /// 用户从列表中删除一条编码；下标越界时不做修改并返回 None
    pub fn remove_code(&mut self, index: usize) -> Option<StateSnapshot> {
        if index >= self.procurement_codes.len() {
            tracing::warn!(index, total = self.procurement_codes.len(), "remove_code index out of range");
            return None;
        }
        let removed = self.procurement_codes.remove(index);
        tracing::info!(code = %removed.code, index, "procurement code removed by user");
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            snapshot: self.clone(),
        }
    }

    /// 导出为纯文本，每行 `{code} - {description}`（对应前端的「Download Codes」）
    pub fn export_codes_text(&self) -> String {
        self.procurement_codes
            .iter()
            .map(|c| format!("{} - {}", c.code, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_code_appends_in_order() {
        let mut state = SessionState::new();
        state.save_code("CFR01067261", "Steel I-beam");
        let snap = state.save_code("CFR01067262", "Copper pipe");
        let expected = vec![
            ProcurementCode {
                code: "CFR01067261".into(),
                description: "Steel I-beam".into(),
            },
            ProcurementCode {
                code: "CFR01067262".into(),
                description: "Copper pipe".into(),
            },
        ];
        assert_eq!(state.procurement_codes, expected);
        assert_eq!(snap.snapshot.procurement_codes, expected);
    }

    #[test]
    fn test_save_code_no_dedup() {
        let mut state = SessionState::new();
        state.save_code("CFR01067261", "Steel I-beam");
        state.save_code("CFR01067261", "Steel I-beam");
        assert_eq!(state.procurement_codes.len(), 2);
        assert_eq!(state.procurement_codes[0], state.procurement_codes[1]);
    }

    #[test]
    fn test_remove_code_keeps_order_of_the_rest() {
        let mut state = SessionState::new();
        state.save_code("A1", "first");
        state.save_code("B2", "second");
        state.save_code("C3", "third");

        let snap = state.remove_code(1).unwrap();
        let codes: Vec<&str> = state.procurement_codes().iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "C3"]);
        assert_eq!(snap.snapshot, state);

        assert!(state.remove_code(2).is_none());
        assert_eq!(state.procurement_codes().len(), 2);
    }

    #[test]
    fn test_snapshot_serializes_ui_field_names() {
        let mut state = SessionState::with_conversation_id("c-1");
        state.save_code("A1", "thing");
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["snapshot"]["procurement_codes"][0]["code"], "A1");
        assert_eq!(json["snapshot"]["conversation_id"], "c-1");
        assert!(json["snapshot"]["citation_sources"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_export_codes_text() {
        let mut state = SessionState::new();
        assert_eq!(state.export_codes_text(), "");
        state.save_code("CFR01067261", "Steel I-beam");
        state.save_code("CFR01067262", "Copper pipe");
        assert_eq!(
            state.export_codes_text(),
            "CFR01067261 - Steel I-beam\nCFR01067262 - Copper pipe"
        );
    }
}
