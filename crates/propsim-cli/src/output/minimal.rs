use serde_json::Value;

use super::{flatten, format_scalar};

/// Well-known headline fields, most specific first. Matched against the
/// flattened dotted path by suffix.
const PRIORITY_KEYS: [&str; 7] = [
    "deal_score.total",
    "winner",
    "win_probability_a",
    "monthly_payment",
    "summary.final_net_worth_after_tax_real",
    "difference",
    "coc_y2",
];

/// Print just the key answer value from the output.
///
/// Array results print one line per element.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(items) => {
            for item in items {
                println!("{}", headline(item));
            }
        }
        other => println!("{}", headline(other)),
    }
}

fn headline(value: &Value) -> String {
    if !value.is_object() {
        return format_scalar(value, usize::MAX);
    }

    let flat = flatten(value);
    for key in PRIORITY_KEYS {
        let hit = flat
            .iter()
            .find(|(k, v)| !v.is_null() && (k == key || k.ends_with(&format!(".{}", key))));
        if let Some((_, v)) = hit {
            return format_scalar(v, usize::MAX);
        }
    }

    match flat.first() {
        Some((k, v)) => format!("{}: {}", k, format_scalar(v, usize::MAX)),
        None => String::new(),
    }
}
