use serde_json::{Value, json};

/// Canonicalize the HTTP import source of every volume-provisioning template
/// embedded under `spec.dataVolumeTemplates`.
///
/// The only rewrite is expanding the bare-URL shorthand
/// `source: { http: "https://…" }` into the explicit object form
/// `source: { http: { url: "https://…" } }`. Already-explicit sources and
/// non-HTTP sources pass through untouched, as do documents without
/// templates. Pure, no I/O, idempotent; malformed documents are left for the
/// store's schema validation to reject.
pub fn normalize_data_volume_templates(doc: &mut Value) {
    let Some(templates) = doc
        .pointer_mut("/spec/dataVolumeTemplates")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for template in templates {
        normalize_http_source(template);
    }
}

fn normalize_http_source(template: &mut Value) {
    let Some(http) = template.pointer_mut("/spec/source/http") else {
        return;
    };

    if let Value::String(url) = http {
        let url = std::mem::take(url);
        *http = json!({ "url": url });
    }
}
