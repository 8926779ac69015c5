//! Maps the renderer-agnostic `ChartModel` onto the plotly-style
//! trace/layout JSON the external charting library consumes.

use chart_model::{AxisAssignment, AxisSide, AxisSpec, ChartModel, SeriesKind};
use serde_json::{json, Map, Value};

const UP_COLOR: &str = "#00CC00";
const DOWN_COLOR: &str = "#CC0000";

/// The div the charting library draws into.
pub const CHART_TARGET: &str = "chart-window";

fn yaxis_ref(axis: AxisAssignment) -> &'static str {
    match axis {
        AxisAssignment::Volume => "y",
        AxisAssignment::Price => "y2",
    }
}

pub fn plotly_traces(model: &ChartModel) -> Value {
    let traces: Vec<Value> = model
        .series
        .iter()
        .map(|s| match &s.kind {
            SeriesKind::Candlestick {
                open,
                high,
                low,
                close,
            } => json!({
                "type": "candlestick",
                "x": s.x,
                "open": open,
                "high": high,
                "low": low,
                "close": close,
                "yaxis": yaxis_ref(s.axis),
                "name": s.name,
                "increasing": { "line": { "color": UP_COLOR } },
                "decreasing": { "line": { "color": DOWN_COLOR } },
            }),
            SeriesKind::Bars { y } => json!({
                "type": "bar",
                "x": s.x,
                "y": y,
                "yaxis": yaxis_ref(s.axis),
                "name": s.name,
            }),
            SeriesKind::Line { y } => json!({
                "type": "scatter",
                "x": s.x,
                "y": y,
                "yaxis": yaxis_ref(s.axis),
                "name": s.name,
            }),
        })
        .collect();
    Value::Array(traces)
}

fn axis_json(spec: &AxisSpec) -> Value {
    let mut axis = Map::new();
    axis.insert("title".into(), json!(spec.title));
    axis.insert("type".into(), json!("linear"));
    if let Some((lo, hi)) = spec.range {
        axis.insert("range".into(), json!([lo, hi]));
    }
    if spec.side == AxisSide::Right {
        axis.insert("side".into(), json!("right"));
    }
    if spec.overlay {
        axis.insert("overlaying".into(), json!("y1"));
    }
    Value::Object(axis)
}

pub fn plotly_layout(model: &ChartModel) -> Value {
    json!({
        "title": model.title,
        "xaxis": axis_json(&model.axes.time),
        "yaxis": axis_json(&model.axes.volume),
        "yaxis2": axis_json(&model.axes.price),
    })
}

#[cfg(target_arch = "wasm32")]
mod plotly {
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_namespace = Plotly, js_name = newPlot)]
        pub fn new_plot(target: &str, data: &JsValue, layout: &JsValue);
    }
}

/// Hand the shaped model to the charting library.
#[cfg(target_arch = "wasm32")]
pub fn render_chart(
    target: &str,
    model: &ChartModel,
) -> Result<(), wasm_bindgen::JsValue> {
    use wasm_bindgen::JsValue;

    let to_js = |value: &Value| -> Result<JsValue, JsValue> {
        let text =
            serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
        js_sys::JSON::parse(&text)
    };
    let traces = to_js(&plotly_traces(model))?;
    let layout = to_js(&plotly_layout(model))?;
    plotly::new_plot(target, &traces, &layout);
    Ok(())
}
