use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The fixed classification returned to the client: nine harassment
/// categories scored 0-100 plus one supportive free-text comment.
///
/// Field names follow the wire contract (Japanese keys); the struct rejects
/// unknown keys so a schema-violating model response fails deserialization
/// instead of being passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarassmentReport {
    #[serde(rename = "パワーハラスメント")]
    pub power: i64,
    #[serde(rename = "スメルハラスメント")]
    pub smell: i64,
    #[serde(rename = "カスタマーハラスメント")]
    pub customer: i64,
    #[serde(rename = "ハラスメントハラスメント")]
    pub harassment: i64,
    #[serde(rename = "マタニティハラスメント")]
    pub maternity: i64,
    #[serde(rename = "リモートハラスメント")]
    pub remote: i64,
    #[serde(rename = "テクノロジーハラスメント")]
    pub technology: i64,
    #[serde(rename = "セクシュアルハラスメント")]
    pub sexual: i64,
    #[serde(rename = "モラルハラスメント")]
    pub moral: i64,
    #[serde(rename = "総合コメント")]
    pub overall_comment: String,
}

impl HarassmentReport {
    /// Check every score is within 0..=100. Called after deserializing the
    /// model response; a violation is a permanent provider error.
    pub fn validate(&self) -> Result<(), String> {
        for (name, score) in self.scores() {
            if !(0..=100).contains(&score) {
                return Err(format!("score {} out of range: {}", name, score));
            }
        }
        Ok(())
    }

    pub fn scores(&self) -> [(&'static str, i64); 9] {
        [
            ("パワーハラスメント", self.power),
            ("スメルハラスメント", self.smell),
            ("カスタマーハラスメント", self.customer),
            ("ハラスメントハラスメント", self.harassment),
            ("マタニティハラスメント", self.maternity),
            ("リモートハラスメント", self.remote),
            ("テクノロジーハラスメント", self.technology),
            ("セクシュアルハラスメント", self.sexual),
            ("モラルハラスメント", self.moral),
        ]
    }

    /// JSON schema sent to Gemini for constrained decoding.
    pub fn response_schema() -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, _) in Self::default_template().scores() {
            properties.insert(name.to_string(), json!({ "type": "integer" }));
            required.push(Value::String(name.to_string()));
        }
        properties.insert("総合コメント".to_string(), json!({ "type": "string" }));
        required.push(Value::String("総合コメント".to_string()));

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }

    fn default_template() -> Self {
        Self {
            power: 0,
            smell: 0,
            customer: 0,
            harassment: 0,
            maternity: 0,
            remote: 0,
            technology: 0,
            sexual: 0,
            moral: 0,
            overall_comment: String::new(),
        }
    }
}
