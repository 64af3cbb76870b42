use remat_analysis::canonicalize;
use remat_ir::{read_case, Common, Schedule};
use serde_json::{json, Value};

pub const GIB: u64 = 1 << 30;

/// Builds an operand record for a case file.
#[allow(dead_code)]
pub fn operand(id: u64, size: u64) -> Value {
    json!({"id": id, "size": size})
}

/// Builds a task record for a case file; `time` is in microseconds.
#[allow(dead_code)]
pub fn task(name: &str, ins: &[u64], outs: &[u64], time: f64) -> Value {
    json!({"name": name, "ins": ins, "outs": outs, "workspace": 0, "time": time})
}

/// Assembles a case file from record arrays.
#[allow(dead_code)]
pub fn case(data: Vec<Value>, code: Vec<Value>) -> String {
    json!({"data": data, "code": code}).to_string()
}

/// Loads and canonicalizes a case, panicking on any failure.
#[allow(dead_code)]
pub fn load(text: &str) -> (Common, Schedule) {
    let (operands, schedule) = read_case(text).expect("case should parse");
    canonicalize(operands, schedule).expect("case should canonicalize")
}

/// The `(name, ins, outs)` shape of a stream, with wire operand ids.
#[allow(dead_code)]
pub fn shape(common: &Common, schedule: &Schedule) -> Vec<(String, Vec<u64>, Vec<u64>)> {
    schedule
        .tasks
        .iter()
        .map(|t| {
            (
                t.name.clone(),
                t.ins.iter().map(|&h| common.operands[h].id).collect(),
                t.outs.iter().map(|&h| common.operands[h].id).collect(),
            )
        })
        .collect()
}
