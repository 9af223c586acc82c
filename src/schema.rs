//! JSON schemas for structured LM responses.
//!
//! Schemas are written for strict structured-output mode: every object lists
//! all of its properties as required and forbids additional ones.
use serde_json::{json, Value};

/// Named schema handed to a provider alongside the prompt.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

pub fn audit_schema() -> ResponseSchema {
    ResponseSchema {
        name: "audit_response",
        schema: json!({
            "type": "object",
            "properties": {
                "is_compliant": {
                    "type": "boolean",
                    "description": "True only if the content meets the criteria and follows the template structure."
                },
                "issues": {
                    "type": "array",
                    "items": issue_schema()
                }
            },
            "required": ["is_compliant", "issues"],
            "additionalProperties": false
        }),
    }
}

fn issue_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "severity": { "type": "string", "enum": ["High", "Medium", "Low"] },
            "issue_description": { "type": "string" },
            "recommendation": { "type": "string" },
            "fixable": {
                "type": "boolean",
                "description": "False whenever resolving the issue needs information the author has not written yet."
            }
        },
        "required": ["id", "severity", "issue_description", "recommendation", "fixable"],
        "additionalProperties": false
    })
}

pub fn fix_schema() -> ResponseSchema {
    ResponseSchema {
        name: "fix_response",
        schema: json!({
            "type": "object",
            "properties": {
                "fixed_content": { "type": "string" }
            },
            "required": ["fixed_content"],
            "additionalProperties": false
        }),
    }
}

pub fn consistency_schema() -> ResponseSchema {
    ResponseSchema {
        name: "consistency_response",
        schema: json!({
            "type": "object",
            "properties": {
                "is_consistent": { "type": "boolean" },
                "global_issues": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "related_sections": {
                                "type": "array",
                                "items": { "type": "string" },
                                "description": "Exact section titles involved in the conflict."
                            }
                        },
                        "required": ["id", "title", "description", "related_sections"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["is_consistent", "global_issues"],
            "additionalProperties": false
        }),
    }
}

pub fn ingest_schema() -> ResponseSchema {
    ResponseSchema {
        name: "charter_structure",
        schema: json!({
            "type": "object",
            "properties": {
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "guidance": { "type": "string" },
                            "required_format": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["title", "guidance", "required_format", "content"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["sections"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_strict(value: &Value) {
        if value.get("type").and_then(Value::as_str) == Some("object") {
            assert_eq!(value["additionalProperties"], Value::Bool(false));
            let props = value["properties"].as_object().expect("properties");
            let required: Vec<&str> = value["required"]
                .as_array()
                .expect("required")
                .iter()
                .filter_map(Value::as_str)
                .collect();
            for (key, child) in props {
                assert!(required.contains(&key.as_str()), "{key} not required");
                assert_strict(child);
            }
        }
        if let Some(items) = value.get("items") {
            assert_strict(items);
        }
    }

    #[test]
    fn all_schemas_are_strict() {
        for schema in [audit_schema(), fix_schema(), consistency_schema(), ingest_schema()] {
            assert_strict(&schema.schema);
        }
    }
}
