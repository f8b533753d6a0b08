use crate::domain::model::{Difficulty, Module, Roadmap};
use crate::utils::error::{Result, RoadmapError};
use serde_json::{Map, Value};

/// Upper bound on modules accepted from one completion.
pub const MAX_MODULES: usize = 20;

const REQUIRED_FIELDS: [&str; 5] = [
    "title",
    "description",
    "difficulty",
    "estimated_hours",
    "learning_objectives",
];

/// Decodes provider output into a [`Roadmap`].
///
/// Only the surrounding Markdown fence or prose is tolerated; every module
/// field is checked strictly and nothing is defaulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoadmapParser;

impl RoadmapParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_text: &str) -> Result<Roadmap> {
        let candidate = json_candidate(raw_text);

        let value: Value = serde_json::from_str(candidate).map_err(|e| {
            tracing::warn!("⚠️ Provider returned non-JSON output ({}): {}", e, raw_text);
            RoadmapError::ParseError {
                message: e.to_string(),
                raw: raw_text.to_string(),
            }
        })?;

        let root = value.as_object().ok_or_else(|| {
            RoadmapError::module_validation(None, "modules", "top-level value must be a JSON object")
        })?;

        let items = match root.get("modules") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(RoadmapError::module_validation(None, "modules", "must be a list"))
            }
            None => return Err(RoadmapError::module_validation(None, "modules", "is missing")),
        };

        if items.is_empty() {
            return Err(RoadmapError::module_validation(None, "modules", "must not be empty"));
        }
        if items.len() > MAX_MODULES {
            return Err(RoadmapError::module_validation(
                None,
                "modules",
                format!("has {} entries, at most {} are allowed", items.len(), MAX_MODULES),
            ));
        }

        let modules = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_module(index, item))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Parsed roadmap with {} modules", modules.len());
        Ok(Roadmap { modules })
    }
}

/// 取出要交給 JSON 解碼的文字。
///
/// 先去除 ```json 圍欄；若剩下的內容本身就以 `{` 或 `[` 開頭則原樣解碼，
/// 只有前後夾雜說明文字時才擷取最外層的 {...}。
pub(crate) fn json_candidate(raw: &str) -> &str {
    let unfenced = strip_fence(raw.trim());
    if unfenced.starts_with('{') || unfenced.starts_with('[') {
        return unfenced;
    }
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 圍欄第一行可能帶語言標記，例如 ```json
    let body = match rest.find('\n') {
        Some(newline) if !rest.starts_with(['{', '[']) => &rest[newline + 1..],
        _ => rest,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn parse_module(index: usize, item: &Value) -> Result<Module> {
    let obj = item.as_object().ok_or_else(|| {
        RoadmapError::module_validation(Some(index), "module", "must be a JSON object")
    })?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(RoadmapError::module_validation(Some(index), field, "is missing"));
        }
    }

    let title = string_field(index, obj, "title")?;
    if title.trim().is_empty() {
        return Err(RoadmapError::module_validation(Some(index), "title", "must not be empty"));
    }

    let description = string_field(index, obj, "description")?;

    let difficulty = string_field(index, obj, "difficulty")?
        .parse::<Difficulty>()
        .map_err(|reason| RoadmapError::module_validation(Some(index), "difficulty", reason))?;

    let estimated_hours = obj
        .get("estimated_hours")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            RoadmapError::module_validation(Some(index), "estimated_hours", "must be a number")
        })?;
    if !(estimated_hours.is_finite() && estimated_hours > 0.0) {
        return Err(RoadmapError::module_validation(
            Some(index),
            "estimated_hours",
            format!("must be positive, got {}", estimated_hours),
        ));
    }

    let learning_objectives = match obj.get("learning_objectives") {
        Some(Value::Array(values)) => values
            .iter()
            .enumerate()
            .map(|(position, value)| match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
                _ => Err(RoadmapError::module_validation(
                    Some(index),
                    "learning_objectives",
                    format!("entry {} must be a non-empty string", position),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(RoadmapError::module_validation(
                Some(index),
                "learning_objectives",
                "must be a list of strings",
            ))
        }
    };

    Ok(Module {
        title: title.to_string(),
        description: description.to_string(),
        difficulty,
        estimated_hours,
        learning_objectives,
    })
}

fn string_field<'a>(index: usize, obj: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| RoadmapError::module_validation(Some(index), field, "must be a string"))
}
