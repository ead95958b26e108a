use crate::error::QueryError;
use crate::response::ResultBody;
use rand::Rng;
use serde_json::{Map, Value};

pub fn to_objects(rows: Vec<Map<String, Value>>) -> ResultBody {
    let count = rows.len() as u64;
    ResultBody::Objects {
        data: rows.into_iter().map(Value::Object).collect(),
        count,
    }
}

/// Count-only view: no rows, `count` is the pre-limit total.
pub fn to_count(total: u64) -> ResultBody {
    ResultBody::Objects {
        data: Vec::new(),
        count: total,
    }
}

/// Positional rows following `columns`. Keys missing from a row are skipped.
pub fn to_datatable(rows: &[Map<String, Value>], columns: &[String]) -> ResultBody {
    let data: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .filter_map(|c| match row.get(c) {
                    Some(v) => Some(v.clone()),
                    None => {
                        tracing::warn!("{}", QueryError::KeyNotFound(c.clone()));
                        None
                    }
                })
                .collect()
        })
        .collect();
    ResultBody::Datatable {
        draw: 0,
        count: data.len() as u64,
        data,
    }
}

/// Chart view: `count` values feed `data`, every other field feeds `label`, one colour per row.
pub fn to_chart<R: Rng>(rows: &[Map<String, Value>], columns: &[String], rng: &mut R) -> ResultBody {
    let mut label = Vec::new();
    let mut data = Vec::new();
    let mut color = Vec::with_capacity(rows.len());
    for row in rows {
        color.push(random_color(rng));
        for c in columns {
            let Some(v) = row.get(c) else { continue };
            if c == "count" {
                data.push(v.clone());
            } else {
                label.push(v.clone());
            }
        }
    }
    ResultBody::Chart {
        count: rows.len() as u64,
        label,
        data,
        color,
    }
}

/// `rgb(r,g,b)` with a random hue, saturation in 0.3..0.8 and lightness in 0.4..0.6.
pub fn random_color<R: Rng>(rng: &mut R) -> String {
    let h: f64 = rng.gen();
    let s = 0.3 + rng.gen::<f64>() / 2.0;
    let l = 0.4 + rng.gen::<f64>() / 5.0;
    let (r, g, b) = hls_to_rgb(h, l, s);
    let channel = |x: f64| ((256.0 * x) as u32).min(255);
    format!("rgb({},{},{})", channel(r), channel(g), channel(b))
}

/// HLS → RGB, all components in 0..=1.
pub fn hls_to_rgb(h: f64, l: f64, s: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    (
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    )
}

fn hue_channel(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}
