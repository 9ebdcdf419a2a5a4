use serde_json::{json, Value};
use std::path::Path;

use crate::services::{batches, config, pipeline, response, run_id, score};

mod command;
use command::Command;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn reply<T: serde::Serialize>(id: Value, result: crate::error::Result<T>) -> String {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(payload) => ok(id, payload),
            Err(e) => err(id, format!("failed to encode reply: {e}")),
        },
        Err(e) => err(id, e.to_string()),
    }
}

fn get_usize(payload: &Value, key: &str) -> Option<usize> {
    payload
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|n| usize::try_from(n).ok())
}

pub fn handle(input: &str) -> String {
    let req: Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => {
            return json!({
                "status": "error",
                "message": "invalid json"
            })
            .to_string();
        }
    };

    let id = get_id(&req);
    let payload = get_payload(&req);

    match Command::from(get_cmd(&req)) {
        Command::Ping => ok(id, json!({ "message": "ffsi-core alive" })),

        Command::RunId => {
            let source = payload.get("source_path").and_then(|v| v.as_str()).unwrap_or("");
            if source.is_empty() {
                return err(id, "payload.source_path is required");
            }
            ok(id, json!({ "run_id": run_id::run_id_for(Path::new(source)) }))
        }

        Command::PlanBatches => {
            let Some(item_count) = get_usize(payload, "item_count") else {
                return err(id, "payload.item_count is required");
            };
            let batch_size = get_usize(payload, "batch_size").unwrap_or(10);
            let plan = batches::define_batches(item_count, batch_size);
            ok(id, json!({ "plan": plan }))
        }

        Command::ScanBatches => reply(
            id,
            config::config_from_payload(payload).and_then(|cfg| pipeline::scan(&cfg)),
        ),

        Command::Score => {
            let Some(probabilities) = payload.get("probabilities") else {
                return err(id, "payload.probabilities is required");
            };
            let normalize = payload
                .get("normalize")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            match score::score_value(probabilities, normalize) {
                Ok(s) => ok(id, json!({ "score": s })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::ParseResponse => {
            let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
            ok(id, json!({ "response": response::parse_response(text) }))
        }

        Command::ClassifyRun => reply(
            id,
            config::config_from_payload(payload).and_then(|cfg| pipeline::run(&cfg)),
        ),

        Command::Consolidate => reply(
            id,
            config::config_from_payload(payload).and_then(|cfg| pipeline::consolidate_only(&cfg)),
        ),

        Command::Unknown => err(id, "unknown command"),
    }
}
