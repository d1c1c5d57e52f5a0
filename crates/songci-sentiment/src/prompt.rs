//! Prompt template and reply parsing for the classification endpoint
//!
//! The model is asked for a bare JSON object with four fields. Replies may
//! still arrive wrapped in a Markdown code fence, which is stripped first.

use serde_json::Value;

use crate::client::ClassifyError;
use crate::model::{ClassificationResult, SentimentClass};

/// Marker appended to truncated texts
const TRUNCATION_MARKER: &str = "...";

/// Fields every reply must carry
pub const REQUIRED_FIELDS: [&str; 4] = ["sentiment_class", "sentiment_score", "keywords", "analysis"];

/// Keep at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Fixed instruction embedding the poem on its own lines.
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"作为中国古典文学专家，请分析以下宋词的情感倾向：
[宋词内容]
{text}

要求：
1. 情感分类：positive（积极）、negative（消极）或 neutral（中性），三选一
2. 情感强度：0.0（最弱）到1.0（最强）的浮点数
3. 情感关键词：提取1-3个最能体现情感的关键词
4. 简要分析：15字内说明判断依据

返回格式必须是纯JSON：
{{
    "sentiment_class": "positive|negative|neutral",
    "sentiment_score": 强度值,
    "keywords": ["关键词1", "关键词2"],
    "analysis": "简要分析"
}}"#
    )
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the end of the opening line
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse the assistant message into a complete result.
///
/// Any missing field, wrong type, unknown label or out-of-range score is an error.
pub fn parse_reply(content: &str) -> Result<ClassificationResult, ClassifyError> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Malformed(format!("reply is not JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ClassifyError::Malformed("reply is not a JSON object".to_string()))?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !obj.contains_key(**f)) {
        return Err(ClassifyError::MissingField(*missing));
    }

    let label = obj["sentiment_class"]
        .as_str()
        .ok_or_else(|| invalid("sentiment_class", "not a string"))?;
    let class = SentimentClass::from_model_label(label)
        .ok_or_else(|| invalid("sentiment_class", format!("unknown label {label:?}")))?;

    let score = score_value(&obj["sentiment_score"])
        .ok_or_else(|| invalid("sentiment_score", "not a number"))?;
    if !(0.0..=1.0).contains(&score) {
        return Err(invalid("sentiment_score", format!("{score} outside [0, 1]")));
    }

    let keywords = obj["keywords"]
        .as_array()
        .ok_or_else(|| invalid("keywords", "not an array"))?
        .iter()
        .map(|k| k.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid("keywords", "non-string entry"))?;

    let analysis = obj["analysis"]
        .as_str()
        .ok_or_else(|| invalid("analysis", "not a string"))?
        .trim();

    Ok(ClassificationResult::new(class, score, keywords, analysis))
}

/// Numbers, or numeric strings (some models quote the score)
fn score_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ClassifyError {
    ClassifyError::InvalidField {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{"sentiment_class": "negative", "sentiment_score": 0.7, "keywords": ["愁", "泪"], "analysis": "离愁别绪"}"#;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "明月几时有".repeat(100);
        let cut = truncate_chars(&text, 300);
        assert_eq!(cut.chars().count(), 303);
        assert!(cut.ends_with("..."));
        assert!(text.starts_with(cut.trim_end_matches("...")));
    }

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate_chars("晴", 300), "晴");
        assert_eq!(truncate_chars(&"字".repeat(300), 300), "字".repeat(300));
    }

    #[test]
    fn prompt_embeds_text_on_own_line() {
        let prompt = build_prompt("大江东去");
        assert!(prompt.contains("\n大江东去\n"));
        for field in REQUIRED_FIELDS {
            assert!(prompt.contains(field));
        }
    }

    #[test]
    fn strips_json_fence() {
        let fenced = format!("```json\n{REPLY}\n```");
        assert_eq!(strip_code_fence(&fenced), REPLY);
        let bare_fence = format!("```\n{REPLY}\n```\n");
        assert_eq!(strip_code_fence(&bare_fence), REPLY);
        assert_eq!(strip_code_fence(&format!("  {REPLY} ")), REPLY);
    }

    #[test]
    fn parses_complete_reply() {
        let r = parse_reply(REPLY).unwrap();
        assert_eq!(r.sentiment_class, SentimentClass::Negative);
        assert_eq!(r.sentiment_score, 0.7);
        assert_eq!(r.keywords, vec!["愁", "泪"]);
        assert_eq!(r.analysis, "离愁别绪");
    }

    #[test]
    fn parses_fenced_reply_with_chinese_label() {
        let reply = "```json\n{\"sentiment_class\": \"积极\", \"sentiment_score\": \"0.9\", \"keywords\": [\"春\"], \"analysis\": \"明快\"}\n```";
        let r = parse_reply(reply).unwrap();
        assert_eq!(r.sentiment_class, SentimentClass::Positive);
        assert_eq!(r.sentiment_score, 0.9);
    }

    #[test]
    fn reply_keywords_normalized() {
        let reply = r#"{"sentiment_class": "positive", "sentiment_score": 0.6, "keywords": [" 春,风 ", "", "花"], "analysis": "明快"}"#;
        let r = parse_reply(reply).unwrap();
        assert_eq!(r.keywords, vec!["春，风", "花"]);
    }

    #[test]
    fn missing_field_rejected() {
        let reply = r#"{"sentiment_class": "neutral", "sentiment_score": 0.1, "keywords": []}"#;
        assert!(matches!(
            parse_reply(reply),
            Err(ClassifyError::MissingField("analysis"))
        ));
    }

    #[test]
    fn bad_values_rejected() {
        let unknown = r#"{"sentiment_class": "joyful", "sentiment_score": 0.1, "keywords": [], "analysis": ""}"#;
        assert!(matches!(
            parse_reply(unknown),
            Err(ClassifyError::InvalidField { field: "sentiment_class", .. })
        ));
        let range = r#"{"sentiment_class": "neutral", "sentiment_score": 1.5, "keywords": [], "analysis": ""}"#;
        assert!(matches!(
            parse_reply(range),
            Err(ClassifyError::InvalidField { field: "sentiment_score", .. })
        ));
        let kw = r#"{"sentiment_class": "neutral", "sentiment_score": 0.2, "keywords": "风", "analysis": ""}"#;
        assert!(matches!(
            parse_reply(kw),
            Err(ClassifyError::InvalidField { field: "keywords", .. })
        ));
    }

    #[test]
    fn non_json_rejected() {
        assert!(matches!(
            parse_reply("I think it is positive."),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(parse_reply("[1, 2]"), Err(ClassifyError::Malformed(_))));
    }
}
