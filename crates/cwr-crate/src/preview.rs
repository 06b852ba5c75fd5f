use minijinja::{context, Environment};
use serde_json::Value;

use crate::entity::Entity;
use crate::model::RoCrate;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ name }}</title>
<script type="application/ld+json">{{ metadata }}</script>
</head>
<body>
<h1>{{ name }}</h1>
{% if description %}<p>{{ description }}</p>{% endif %}
<p>Crate identifier: <code>{{ root_id }}</code></p>
<table>
<thead><tr><th>Identifier</th><th>Type</th><th>Name</th></tr></thead>
<tbody>
{% for entity in entities %}<tr><td>{{ entity.id }}</td><td>{{ entity.types }}</td><td>{{ entity.name }}</td></tr>
{% endfor %}</tbody>
</table>
</body>
</html>
"#;

fn row(entity: &Entity) -> Value {
    serde_json::json!({
        "id": entity.id,
        "types": entity.types.join(", "),
        "name": entity.name().unwrap_or_default(),
    })
}

/// Render `ro-crate-preview.html` for a crate.
pub(crate) fn render(krate: &RoCrate) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);
    let root = krate.root();
    let entities: Vec<Value> = krate.entities().skip(1).map(row).collect();
    // Keep `</script>` inside string values from closing the block early.
    let metadata = krate.metadata_document().to_string().replace("</", "<\\/");
    env.render_str(
        TEMPLATE,
        context! {
            name => root.name().unwrap_or(root.id.as_str()),
            description => root.get("description").and_then(Value::as_str),
            root_id => root.id,
            entities => entities,
            metadata => minijinja::Value::from_safe_string(metadata),
        },
    )
}
