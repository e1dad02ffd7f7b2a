//! Preventive-maintenance template rewriting.
//!
//! Templates are `document` rows of kind `preventive_template` whose JSON
//! content embeds the owning asset as `"assetId"` (number or numeric string)
//! and usually `"assetName"`. That embedded id is not a foreign key, so the
//! finalizer has to patch it by hand when the asset goes away.

use serde_json::Value as JsonValue;

use tenon_core::Result;

/// Parse template content into a JSON object.
///
/// Errors for content that is not a JSON object; callers skip those rows.
pub fn parse_template(content: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(tenon_core::Error::Serialization(
            "template content is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// The asset id embedded in a parsed template, if any.
pub fn embedded_asset_id(template: &JsonValue) -> Option<i64> {
    match template.get("assetId")? {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Point a parsed template at another asset.
///
/// Keeps the original encoding of `assetId`: a string stays a string.
pub fn retarget_template(template: &mut JsonValue, asset_id: i64, asset_name: &str) {
    let Some(obj) = template.as_object_mut() else {
        return;
    };
    let id = match obj.get("assetId") {
        Some(JsonValue::String(_)) => JsonValue::String(asset_id.to_string()),
        _ => JsonValue::from(asset_id),
    };
    obj.insert("assetId".to_string(), id);
    obj.insert(
        "assetName".to_string(),
        JsonValue::String(asset_name.to_string()),
    );
}
